//! Grade type
//!
//! Domain primitive for a course grade on the 4.0 scale.
//! Grades are validated at construction time so an out-of-range
//! value can never reach an enrollment row.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Maximum decimal places stored for a grade (NUMERIC(3,2))
const MAX_SCALE: u32 = 2;

/// Grade represents a validated grade point value.
///
/// # Invariants
/// - 0.00 <= value <= 4.00
/// - At most 2 decimal places
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use registrar::domain::Grade;
///
/// let grade = Grade::new(Decimal::new(350, 2)).unwrap();
/// assert_eq!(grade.value(), Decimal::new(35, 1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Grade(Decimal);

impl Grade {
    /// Highest grade on the scale
    pub const MAX: Decimal = Decimal::from_parts(4, 0, 0, false, 0);

    /// Create a new Grade with validation.
    ///
    /// # Errors
    /// - `DomainError::InvalidGrade` if the value is negative, above 4.0,
    ///   or carries more than 2 decimal places
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::InvalidGrade(format!("{} is negative", value)));
        }

        if value > Self::MAX {
            return Err(DomainError::InvalidGrade(format!(
                "{} exceeds {}",
                value,
                Self::MAX
            )));
        }

        let normalized = value.normalize();
        if normalized.scale() > MAX_SCALE {
            return Err(DomainError::InvalidGrade(format!(
                "{} has more than {} decimal places",
                value, MAX_SCALE
            )));
        }

        Ok(Self(normalized))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Grade {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| DomainError::InvalidGrade(format!("{}: {}", s, e)))?;
        Self::new(decimal)
    }
}

impl TryFrom<Decimal> for Grade {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Grade> for Decimal {
    fn from(grade: Grade) -> Self {
        grade.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_valid_grades() {
        assert_eq!(Grade::new(dec!(0)).unwrap().value(), dec!(0));
        assert_eq!(Grade::new(dec!(4.00)).unwrap().value(), dec!(4));
        assert_eq!(Grade::new(dec!(3.75)).unwrap().value(), dec!(3.75));
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(
            Grade::new(dec!(-0.5)),
            Err(DomainError::InvalidGrade(_))
        ));
        assert!(matches!(
            Grade::new(dec!(4.01)),
            Err(DomainError::InvalidGrade(_))
        ));
    }

    #[test]
    fn test_too_many_decimals() {
        assert!(Grade::new(dec!(3.333)).is_err());
        // Trailing zeros are not significant
        assert!(Grade::new(dec!(3.300)).is_ok());
    }

    #[test]
    fn test_parse_and_display() {
        let grade: Grade = " 3.5 ".parse().unwrap();
        assert_eq!(grade.to_string(), "3.50");
        assert!("abc".parse::<Grade>().is_err());
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let grade: Grade = serde_json::from_str("\"2.5\"").unwrap();
        assert_eq!(grade.value(), dec!(2.5));
        assert!(serde_json::from_str::<Grade>("\"7.0\"").is_err());
    }
}
