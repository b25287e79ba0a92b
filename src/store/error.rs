//! Record Store Errors
//!
//! Error types for record store operations.

use crate::domain::DomainError;

/// Result alias for record store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// PostgreSQL SQLSTATE for serialization_failure
const SERIALIZATION_FAILURE: &str = "40001";
/// PostgreSQL SQLSTATE for deadlock_detected
const DEADLOCK_DETECTED: &str = "40P01";
/// PostgreSQL SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Errors that can occur in the record store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A concurrent transaction won the race for the same rows
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Stored data does not decode into valid domain values
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// The store cannot serve requests
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// Check if this error is a lost race
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            match db_err.code().as_deref() {
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                    return StoreError::Conflict(db_err.message().to_string());
                }
                Some(UNIQUE_VIOLATION) => {
                    let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                    return StoreError::UniqueViolation(constraint);
                }
                _ => {}
            }
        }
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_retryable() {
        let conflict = StoreError::Conflict("section row busy".to_string());
        assert!(conflict.is_conflict());
        assert!(conflict.is_retryable());

        let corrupt = StoreError::Corrupt("bad status".to_string());
        assert!(!corrupt.is_retryable());
    }

    #[test]
    fn test_pool_timeout_maps_to_unavailable() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_domain_error_maps_to_corrupt() {
        let err: StoreError = DomainError::UnknownStatus("PENDING".to_string()).into();
        assert!(err.to_string().contains("PENDING"));
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
