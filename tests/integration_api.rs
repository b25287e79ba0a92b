//! API Integration Tests

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use registrar::api::{self, AppState};

mod common;
use common::Campus;

fn app(campus: &Campus) -> Router {
    api::build_router(AppState::new(campus.shared(), campus.engine()))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let req = match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let campus = Campus::new();
    let app = app(&campus);

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    campus.store.set_healthy(false);
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_registration_lifecycle_e2e() {
    let campus = Campus::new();
    let app = app(&campus);
    let section = campus.section(1);
    let alice = campus.student("Alice");
    let bob = campus.student("Bob");

    // 1. Alice takes the only seat
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/registrations",
        Some(json!({"student_id": alice, "section_id": section})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body.get("message").is_none());
    let enrollment_id: Uuid = serde_json::from_value(body["enrollment_id"].clone()).unwrap();

    // 2. Bob is turned away with a readable message
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/registrations",
        Some(json!({"student_id": bob, "section_id": section})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Section is full");
    assert_eq!(body["error_code"], "section_full");

    // 3. Alice drops
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/enrollments/{}/drop", enrollment_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // 4. Bob registers through the legacy call shape
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/rpc/sp_register_student",
        Some(json!({"p_student_id": bob, "p_section_id": section})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let bob_enrollment = body["enrollment_id"].as_str().unwrap().to_string();

    // 5. Bob is graded
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/enrollments/{}/complete", bob_enrollment),
        Some(json!({"grade": 3.5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // 6. Seat counts match the rows
    let (status, body) = send(&app, "GET", &format!("/api/v1/sections/{}/seats", section), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available_seats"], 0);
    assert_eq!(body["active_enrollments"], 1);

    // 7. Bob's GPA is a JSON number
    let (status, body) = send(&app, "GET", &format!("/api/v1/students/{}/gpa", bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["gpa"].as_f64(), Some(3.5));

    // 8. Alice's transcript still shows the dropped enrollment
    let (status, body) = send(&app, "GET", &format!("/api/v1/students/{}/transcript", alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "DROPPED");
    assert!(rows[0]["grade"].is_null());
    assert_eq!(rows[0]["course_title"], "Algorithms");
}

#[tokio::test]
async fn test_duplicate_registration_is_a_rejection() {
    let campus = Campus::new();
    let app = app(&campus);
    let section = campus.section(3);
    let alice = campus.student("Alice");
    let body = json!({"student_id": alice, "section_id": section});

    let (_, first) = send(&app, "POST", "/api/v1/registrations", Some(body.clone())).await;
    assert_eq!(first["success"], true);

    let (status, second) = send(&app, "POST", "/api/v1/registrations", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["success"], false);
    assert_eq!(second["error_code"], "duplicate_enrollment");
    assert_eq!(campus.available_seats(section), 2);
}

#[tokio::test]
async fn test_invalid_grade_is_a_rejection() {
    let campus = Campus::new();
    let app = app(&campus);
    let section = campus.section(3);
    let alice = campus.student("Alice");

    let (_, body) = send(
        &app,
        "POST",
        "/api/v1/registrations",
        Some(json!({"student_id": alice, "section_id": section})),
    )
    .await;
    let enrollment_id = body["enrollment_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/enrollments/{}/complete", enrollment_id),
        Some(json!({"grade": 4.5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "invalid_grade");
}

#[tokio::test]
async fn test_student_without_coursework() {
    let campus = Campus::new();
    let app = app(&campus);
    let alice = campus.student("Alice");

    let (status, body) = send(&app, "GET", &format!("/api/v1/students/{}/gpa", alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["gpa"].is_null());

    let (status, body) = send(&app, "GET", &format!("/api/v1/students/{}/transcript", alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = send(&app, "GET", &format!("/api/v1/students/{}/record", alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["student_name"], "Alice Tester");
    assert!(body["gpa"].is_null());
    assert_eq!(body["completed_courses"], 0);
}

#[tokio::test]
async fn test_not_found_responses() {
    let campus = Campus::new();
    let app = app(&campus);
    let ghost = Uuid::new_v4();

    let (status, body) = send(&app, "GET", &format!("/api/v1/students/{}/record", ghost), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "student_not_found");

    let (status, body) = send(&app, "GET", &format!("/api/v1/sections/{}/seats", ghost), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "section_not_found");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/registrations",
        Some(json!({"student_id": ghost, "section_id": ghost})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error_code"], "student_not_found");
}

#[tokio::test]
async fn test_storage_fault_returns_503() {
    let campus = Campus::new();
    let app = app(&campus);
    let section = campus.section(3);
    let alice = campus.student("Alice");

    campus.store.set_healthy(false);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/registrations",
        Some(json!({"student_id": alice, "section_id": section})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error_code"], "storage_fault");

    let (status, _) = send(&app, "GET", &format!("/api/v1/students/{}/gpa", alice), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_available_sections_listing() {
    let campus = Campus::new();
    let app = app(&campus);
    let open = campus.section(2);
    let full = campus.section(1);
    let alice = campus.student("Alice");

    send(
        &app,
        "POST",
        "/api/v1/registrations",
        Some(json!({"student_id": alice, "section_id": full})),
    )
    .await;

    let (status, body) = send(&app, "GET", "/api/v1/sections/available", None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["section_id"], open.to_string());
    assert_eq!(listed[0]["instructor_name"], "Dr. Knuth");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let campus = Campus::new();
    let app = app(&campus);

    let req = Request::builder()
        .uri("/api/v1/sections/available")
        .header("x-request-id", "trace-42")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-42");
}

#[tokio::test]
async fn test_malformed_input_is_invalid_request() {
    let campus = Campus::new();
    let app = app(&campus);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/registrations",
        Some(json!({"student_id": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_request");
    assert_eq!(body["error"], "Invalid request");

    let (status, body) = send(&app, "GET", "/api/v1/students/nope/gpa", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_request");

    let (status, body) = send(&app, "GET", "/api/v1/enrollments?limit=lots", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_request");
}

#[tokio::test]
async fn test_registration_feed() {
    let campus = Campus::new();
    let app = app(&campus);
    let section = campus.section(2);
    let alice = campus.student("Alice");
    let bob = campus.student("Bob");

    let (_, body) = send(
        &app,
        "POST",
        "/api/v1/registrations",
        Some(json!({"student_id": alice, "section_id": section})),
    )
    .await;
    let alice_enrollment = body["enrollment_id"].as_str().unwrap().to_string();
    send(
        &app,
        "POST",
        &format!("/api/v1/enrollments/{}/complete", alice_enrollment),
        Some(json!({"grade": 4.0})),
    )
    .await;
    send(
        &app,
        "POST",
        "/api/v1/registrations",
        Some(json!({"student_id": bob, "section_id": section})),
    )
    .await;

    let (status, body) = send(&app, "GET", "/api/v1/enrollments", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row["course_title"], "Algorithms");
        assert_eq!(row["semester"], "FALL");
        assert_eq!(row["year"], 2025);
    }
    let alice_row = rows
        .iter()
        .find(|row| row["enrollment_id"] == alice_enrollment.as_str())
        .unwrap();
    assert_eq!(alice_row["first_name"], "Alice");
    assert_eq!(alice_row["status"], "COMPLETED");
    assert_eq!(alice_row["grade"].as_f64(), Some(4.0));

    let (status, body) = send(&app, "GET", "/api/v1/enrollments?limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}
