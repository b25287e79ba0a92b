//! Registrar Library
//!
//! Course registration engine and academic record service. Re-exports
//! modules for the server binary, tooling and integration tests.

pub mod api;
pub mod domain;
pub mod jobs;
pub mod registration;
pub mod store;
pub mod transcript;

pub mod config;
pub mod db;
mod error;

pub use config::{Config, LogFormat};
pub use domain::{DomainError, Enrollment, EnrollmentStatus, Grade, Section};
pub use error::{AppError, AppResult, ErrorResponse};
pub use registration::{Outcome, RegistrationEngine, RegistrationError, RetryPolicy};
pub use store::{MemoryRecordStore, PgRecordStore, RecordStore, StoreError};
pub use transcript::AcademicRecordService;
