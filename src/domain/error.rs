//! Domain Error Types
//!
//! Value validation errors that don't depend on infrastructure.

use thiserror::Error;

/// Errors raised while constructing domain values.
///
/// These come from decoding stored rows or request payloads into the
/// validated types of this module. They never describe a registration
/// outcome; those live in `registration::RegistrationError`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Grade outside the 0.0 - 4.0 scale or too precise
    #[error("Invalid grade: {0}")]
    InvalidGrade(String),

    /// Course level not in the fixed level set
    #[error("Invalid course level: {0}")]
    InvalidCourseLevel(i32),

    /// Section capacity must be positive
    #[error("Invalid capacity: {0}")]
    InvalidCapacity(i32),

    /// Unknown semester text
    #[error("Unknown semester: {0}")]
    UnknownSemester(String),

    /// Unknown enrollment status text
    #[error("Unknown enrollment status: {0}")]
    UnknownStatus(String),

    /// Stored row violates an entity invariant
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}
