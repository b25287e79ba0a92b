//! API module
//!
//! HTTP API endpoints and middleware.

pub mod extract;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Router};
use tower_http::trace::TraceLayer;

use crate::registration::RegistrationEngine;
use crate::store::RecordStore;
use crate::transcript::AcademicRecordService;

pub use routes::create_router;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub engine: RegistrationEngine,
    pub records: AcademicRecordService,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, engine: RegistrationEngine) -> Self {
        let records = AcademicRecordService::new(store.clone());
        Self {
            store,
            engine,
            records,
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let api_router = create_router().layer(axum::middleware::from_fn(
        middleware::logging_middleware,
    ));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.store.health_check().await {
        Ok(true) => (StatusCode::OK, "OK"),
        Ok(false) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE")
        }
    }
}
