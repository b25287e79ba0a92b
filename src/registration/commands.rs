//! Command and result definitions
//!
//! Commands represent intentions to change enrollment state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Enrollment;

use super::RegistrationError;

// =========================================================================
// Commands
// =========================================================================

/// Enroll a student into a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterStudentCommand {
    pub student_id: Uuid,
    pub section_id: Uuid,
}

impl RegisterStudentCommand {
    pub fn new(student_id: Uuid, section_id: Uuid) -> Self {
        Self {
            student_id,
            section_id,
        }
    }
}

/// Move an active enrollment to DROPPED and free its seat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropEnrollmentCommand {
    pub enrollment_id: Uuid,
}

impl DropEnrollmentCommand {
    pub fn new(enrollment_id: Uuid) -> Self {
        Self { enrollment_id }
    }
}

/// Mark an enrollment COMPLETED with a grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteEnrollmentCommand {
    pub enrollment_id: Uuid,
    /// Unvalidated grade (validated by the engine)
    pub grade: Decimal,
}

impl CompleteEnrollmentCommand {
    pub fn new(enrollment_id: Uuid, grade: Decimal) -> Self {
        Self {
            enrollment_id,
            grade,
        }
    }
}

// =========================================================================
// Results
// =========================================================================

/// Result of a state-changing call whose business rules passed or failed.
///
/// Expected rejections are values, not errors; only storage faults are
/// returned through `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Accepted(T),
    Rejected(RegistrationError),
}

impl<T> Outcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    pub fn accepted(self) -> Option<T> {
        match self {
            Outcome::Accepted(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }
}

impl Outcome<Enrollment> {
    /// Flatten into the `{success, message}` envelope callers render
    pub fn to_response(&self) -> RegistrationResponse {
        match self {
            Outcome::Accepted(enrollment) => RegistrationResponse {
                success: true,
                message: String::new(),
                error_code: None,
                enrollment_id: Some(enrollment.id),
            },
            Outcome::Rejected(err) => RegistrationResponse {
                success: false,
                message: err.to_string(),
                error_code: Some(err.error_code().to_string()),
                enrollment_id: None,
            },
        }
    }
}

/// Wire shape of a registration or lifecycle result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_response_has_no_message() {
        let enrollment = Enrollment::enrolled(Uuid::new_v4(), Uuid::new_v4());
        let response = Outcome::Accepted(enrollment.clone()).to_response();

        assert!(response.success);
        assert_eq!(response.enrollment_id, Some(enrollment.id));

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("message").is_none());
        assert!(json.get("error_code").is_none());
    }

    #[test]
    fn test_rejected_response_carries_message() {
        let section_id = Uuid::new_v4();
        let outcome: Outcome<Enrollment> =
            Outcome::Rejected(RegistrationError::SectionFull(section_id));
        let response = outcome.to_response();

        assert!(!response.success);
        assert_eq!(response.message, "Section is full");
        assert_eq!(response.error_code.as_deref(), Some("section_full"));
        assert!(response.enrollment_id.is_none());
    }
}
