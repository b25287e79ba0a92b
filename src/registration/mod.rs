//! Registration module
//!
//! The write side: enrollment creation and lifecycle transitions.

mod commands;
mod engine;
mod error;

pub use commands::*;
pub use engine::{RegistrationEngine, RetryPolicy};
pub use error::RegistrationError;
