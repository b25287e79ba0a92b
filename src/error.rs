//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Student not found: {0}")]
    StudentNotFound(String),

    #[error("Section not found: {0}")]
    SectionNotFound(String),

    // Server errors (5xx)
    #[error("Storage fault: {0}")]
    Store(#[from] StoreError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            // 404 Not Found
            AppError::StudentNotFound(id) => {
                (StatusCode::NOT_FOUND, "student_not_found", Some(id.clone()))
            }
            AppError::SectionNotFound(id) => {
                (StatusCode::NOT_FOUND, "section_not_found", Some(id.clone()))
            }

            // 503 Service Unavailable: the request may be repeated as is
            AppError::Store(e) => {
                tracing::error!("Storage fault: {:?}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "storage_fault", None)
            }
        };

        // Storage details stay in the log
        let error = match &self {
            AppError::Store(_) => "Storage temporarily unavailable".to_string(),
            AppError::InvalidRequest(_) => "Invalid request".to_string(),
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_fault_maps_to_503() {
        let response = AppError::Store(StoreError::Unavailable("down".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AppError::StudentNotFound("abc".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_request_maps_to_400() {
        let response = AppError::InvalidRequest("bad uuid".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
