//! Registration rejections
//!
//! Business-rule outcomes the caller must be shown. None of these are
//! faults; infrastructure failures travel separately as `StoreError`.

use uuid::Uuid;

use crate::domain::EnrollmentStatus;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Student not found")]
    StudentNotFound(Uuid),

    #[error("Section not found")]
    SectionNotFound(Uuid),

    #[error("Student already registered for this section")]
    DuplicateEnrollment { student_id: Uuid, section_id: Uuid },

    #[error("Section is full")]
    SectionFull(Uuid),

    #[error("Enrollment not found")]
    EnrollmentNotFound(Uuid),

    #[error("Enrollment is {status} and cannot change")]
    EnrollmentNotActive {
        enrollment_id: Uuid,
        status: EnrollmentStatus,
    },

    #[error("Invalid grade: {0}")]
    InvalidGrade(String),
}

impl RegistrationError {
    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            RegistrationError::StudentNotFound(_) => "student_not_found",
            RegistrationError::SectionNotFound(_) => "section_not_found",
            RegistrationError::DuplicateEnrollment { .. } => "duplicate_enrollment",
            RegistrationError::SectionFull(_) => "section_full",
            RegistrationError::EnrollmentNotFound(_) => "enrollment_not_found",
            RegistrationError::EnrollmentNotActive { .. } => "enrollment_not_active",
            RegistrationError::InvalidGrade(_) => "invalid_grade",
        }
    }
}
