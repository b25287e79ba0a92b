//! Domain module
//!
//! Registration entities and validated value types.

pub mod error;
pub mod grade;
pub mod models;

pub use error::DomainError;
pub use grade::Grade;
pub use models::{
    Course, CourseLevel, Enrollment, EnrollmentStatus, Instructor, Section, Semester, Student,
};
