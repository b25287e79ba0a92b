//! Registration entities
//!
//! Rows of the five registration tables, decoded into validated types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{DomainError, Grade};

// =========================================================================
// Enumerations
// =========================================================================

/// Academic term of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Semester {
    Fall,
    Spring,
    Summer,
}

impl Semester {
    pub fn as_str(&self) -> &'static str {
        match self {
            Semester::Fall => "FALL",
            Semester::Spring => "SPRING",
            Semester::Summer => "SUMMER",
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Semester {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FALL" => Ok(Semester::Fall),
            "SPRING" => Ok(Semester::Spring),
            "SUMMER" => Ok(Semester::Summer),
            other => Err(DomainError::UnknownSemester(other.to_string())),
        }
    }
}

/// Lifecycle status of an enrollment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnrollmentStatus {
    Enrolled,
    Completed,
    Dropped,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolled => "ENROLLED",
            EnrollmentStatus::Completed => "COMPLETED",
            EnrollmentStatus::Dropped => "DROPPED",
        }
    }

    /// Active enrollments occupy a seat in their section
    pub fn is_active(&self) -> bool {
        matches!(self, EnrollmentStatus::Enrolled | EnrollmentStatus::Completed)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENROLLED" => Ok(EnrollmentStatus::Enrolled),
            "COMPLETED" => Ok(EnrollmentStatus::Completed),
            "DROPPED" => Ok(EnrollmentStatus::Dropped),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Course level (100 first year through 400 fourth year)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct CourseLevel(i32);

impl CourseLevel {
    pub const LEVELS: [i32; 4] = [100, 200, 300, 400];

    pub fn new(level: i32) -> Result<Self, DomainError> {
        if Self::LEVELS.contains(&level) {
            Ok(Self(level))
        } else {
            Err(DomainError::InvalidCourseLevel(level))
        }
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for CourseLevel {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CourseLevel> for i32 {
    fn from(level: CourseLevel) -> Self {
        level.0
    }
}

impl fmt::Display for CourseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =========================================================================
// Entities
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Student {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl Instructor {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub level: CourseLevel,
}

impl Course {
    pub fn new(title: impl Into<String>, level: CourseLevel) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            level,
        }
    }
}

/// One offering of a course with a seat capacity.
///
/// `available_seats` is a denormalized counter:
/// `available_seats == capacity - count(active enrollments)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: Uuid,
    pub course_id: Uuid,
    pub semester: Semester,
    pub year: i32,
    pub instructor_id: Option<Uuid>,
    pub capacity: i32,
    pub available_seats: i32,
}

impl Section {
    /// New section with every seat open
    pub fn new(
        course_id: Uuid,
        semester: Semester,
        year: i32,
        instructor_id: Option<Uuid>,
        capacity: i32,
    ) -> Result<Self, DomainError> {
        if capacity <= 0 {
            return Err(DomainError::InvalidCapacity(capacity));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            course_id,
            semester,
            year,
            instructor_id,
            capacity,
            available_seats: capacity,
        })
    }

    pub fn has_open_seat(&self) -> bool {
        self.available_seats > 0
    }

    /// Move the seat counter by `delta`, refusing to leave `[0, capacity]`.
    pub fn adjust_seats(&mut self, delta: i32) -> Result<i32, DomainError> {
        let next = self.available_seats + delta;
        if next < 0 || next > self.capacity {
            return Err(DomainError::InvariantViolation(format!(
                "section {} seats would become {} (capacity {})",
                self.id, next, self.capacity
            )));
        }
        self.available_seats = next;
        Ok(next)
    }

    /// Check the stored row against its own bounds
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.capacity <= 0 {
            return Err(DomainError::InvalidCapacity(self.capacity));
        }
        if self.available_seats < 0 || self.available_seats > self.capacity {
            return Err(DomainError::InvariantViolation(format!(
                "section {} has {} available seats for capacity {}",
                self.id, self.available_seats, self.capacity
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub section_id: Uuid,
    pub status: EnrollmentStatus,
    pub grade: Option<Grade>,
    pub created_at: DateTime<Utc>,
}

impl Enrollment {
    /// Fresh registration: ENROLLED, no grade, created now
    pub fn enrolled(student_id: Uuid, section_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            section_id,
            status: EnrollmentStatus::Enrolled,
            grade: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Grade is present if and only if the enrollment is COMPLETED
    pub fn validate(&self) -> Result<(), DomainError> {
        match (self.status, self.grade) {
            (EnrollmentStatus::Completed, None) => Err(DomainError::InvariantViolation(format!(
                "completed enrollment {} has no grade",
                self.id
            ))),
            (EnrollmentStatus::Enrolled | EnrollmentStatus::Dropped, Some(_)) => {
                Err(DomainError::InvariantViolation(format!(
                    "{} enrollment {} carries a grade",
                    self.status, self.id
                )))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_semester_round_trip_text() {
        assert_eq!("SPRING".parse::<Semester>().unwrap(), Semester::Spring);
        assert_eq!(Semester::Summer.as_str(), "SUMMER");
        assert!("WINTER".parse::<Semester>().is_err());
    }

    #[test]
    fn test_status_activity() {
        assert!(EnrollmentStatus::Enrolled.is_active());
        assert!(EnrollmentStatus::Completed.is_active());
        assert!(!EnrollmentStatus::Dropped.is_active());
        assert_eq!(
            serde_json::to_string(&EnrollmentStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
    }

    #[test]
    fn test_course_level_set() {
        assert_eq!(CourseLevel::new(300).unwrap().value(), 300);
        assert_eq!(CourseLevel::new(250), Err(DomainError::InvalidCourseLevel(250)));
        assert!(serde_json::from_str::<CourseLevel>("500").is_err());
    }

    #[test]
    fn test_section_requires_positive_capacity() {
        let course = Uuid::new_v4();
        assert!(Section::new(course, Semester::Fall, 2025, None, 0).is_err());

        let section = Section::new(course, Semester::Fall, 2025, None, 30).unwrap();
        assert_eq!(section.available_seats, 30);
        assert!(section.has_open_seat());
    }

    #[test]
    fn test_adjust_seats_bounds() {
        let mut section = Section::new(Uuid::new_v4(), Semester::Fall, 2025, None, 1).unwrap();
        assert_eq!(section.adjust_seats(-1).unwrap(), 0);
        assert!(!section.has_open_seat());
        assert!(section.adjust_seats(-1).is_err());
        assert_eq!(section.available_seats, 0);
        assert_eq!(section.adjust_seats(1).unwrap(), 1);
        assert!(section.adjust_seats(1).is_err());
    }

    #[test]
    fn test_enrollment_grade_invariant() {
        let mut enrollment = Enrollment::enrolled(Uuid::new_v4(), Uuid::new_v4());
        assert!(enrollment.validate().is_ok());

        enrollment.grade = Some(Grade::new(dec!(3.0)).unwrap());
        assert!(enrollment.validate().is_err());

        enrollment.status = EnrollmentStatus::Completed;
        assert!(enrollment.validate().is_ok());

        enrollment.grade = None;
        assert!(enrollment.validate().is_err());
    }
}
