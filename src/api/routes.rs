//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::registration::{
    CompleteEnrollmentCommand, DropEnrollmentCommand, RegisterStudentCommand,
    RegistrationResponse,
};
use crate::store::{SectionListing, SectionSeats};
use crate::transcript::{AcademicRecord, EnrollmentFeedRow, TranscriptRow};

use super::extract::{ApiJson, ApiPath, ApiQuery};

use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

/// Registration request. The `p_`-prefixed names are accepted for callers
/// written against the stored-procedure interface.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(alias = "p_student_id")]
    pub student_id: Uuid,
    #[serde(alias = "p_section_id")]
    pub section_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub grade: Decimal,
}

/// Registration feed paging
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_feed_limit")]
    pub limit: usize,
}

fn default_feed_limit() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct GpaResponse {
    pub student_id: Uuid,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub gpa: Option<Decimal>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Enrollment lifecycle
        .route("/registrations", post(register_student))
        .route("/enrollments", get(get_recent_enrollments))
        .route("/enrollments/:enrollment_id/drop", post(drop_enrollment))
        .route("/enrollments/:enrollment_id/complete", post(complete_enrollment))
        // Academic record
        .route("/students/:student_id/transcript", get(get_transcript))
        .route("/students/:student_id/gpa", get(get_gpa))
        .route("/students/:student_id/record", get(get_record))
        // Sections
        .route("/sections/available", get(get_available_sections))
        .route("/sections/:section_id/seats", get(get_section_seats))
        // Legacy endpoint for compatibility
        .route("/rpc/sp_register_student", post(register_student))
}

// =========================================================================
// POST /registrations
// =========================================================================

/// Enroll a student. Rejections are reported in the body with status 200.
async fn register_student(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> AppResult<Json<RegistrationResponse>> {
    let command = RegisterStudentCommand::new(request.student_id, request.section_id);
    let outcome = state.engine.register_student(command).await?;

    Ok(Json(outcome.to_response()))
}

// =========================================================================
// GET /enrollments
// =========================================================================

/// Registration feed: newest enrollments of every student, any status
async fn get_recent_enrollments(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FeedQuery>,
) -> AppResult<Json<Vec<EnrollmentFeedRow>>> {
    let rows = state.records.recent_enrollments(query.limit).await?;
    Ok(Json(rows))
}

// =========================================================================
// POST /enrollments/:enrollment_id/drop
// =========================================================================

async fn drop_enrollment(
    State(state): State<AppState>,
    ApiPath(enrollment_id): ApiPath<Uuid>,
) -> AppResult<Json<RegistrationResponse>> {
    let outcome = state
        .engine
        .drop_enrollment(DropEnrollmentCommand::new(enrollment_id))
        .await?;

    Ok(Json(outcome.to_response()))
}

// =========================================================================
// POST /enrollments/:enrollment_id/complete
// =========================================================================

async fn complete_enrollment(
    State(state): State<AppState>,
    ApiPath(enrollment_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<CompleteRequest>,
) -> AppResult<Json<RegistrationResponse>> {
    let outcome = state
        .engine
        .complete_enrollment(CompleteEnrollmentCommand::new(enrollment_id, request.grade))
        .await?;

    Ok(Json(outcome.to_response()))
}

// =========================================================================
// GET /students/:student_id/...
// =========================================================================

/// Transcript, most recent first. Unknown students get an empty list.
async fn get_transcript(
    State(state): State<AppState>,
    ApiPath(student_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<TranscriptRow>>> {
    let rows = state.records.build_transcript(student_id).await?;
    Ok(Json(rows))
}

async fn get_gpa(
    State(state): State<AppState>,
    ApiPath(student_id): ApiPath<Uuid>,
) -> AppResult<Json<GpaResponse>> {
    let gpa = state.records.compute_gpa(student_id).await?;
    Ok(Json(GpaResponse { student_id, gpa }))
}

async fn get_record(
    State(state): State<AppState>,
    ApiPath(student_id): ApiPath<Uuid>,
) -> AppResult<Json<AcademicRecord>> {
    state
        .records
        .academic_record(student_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::StudentNotFound(student_id.to_string()))
}

// =========================================================================
// GET /sections/...
// =========================================================================

async fn get_available_sections(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<SectionListing>>> {
    let sections = state.records.available_sections().await?;
    Ok(Json(sections))
}

async fn get_section_seats(
    State(state): State<AppState>,
    ApiPath(section_id): ApiPath<Uuid>,
) -> AppResult<Json<SectionSeats>> {
    state
        .records
        .section_seats(section_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::SectionNotFound(section_id.to_string()))
}
