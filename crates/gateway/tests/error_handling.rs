//! Tests for the error-to-response mapping.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;

use iris_comfy::BackendError;
use iris_core::CoreError;
use iris_gateway::error::AppError;

async fn status_and_code(error: AppError) -> (StatusCode, String, String) {
    let response = error.into_response();
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("JSON body");
    (
        status,
        json["code"].as_str().expect("code field").to_string(),
        json["error"].as_str().expect("error field").to_string(),
    )
}

// ---------------------------------------------------------------------------
// Test: unknown template maps to 404 NOT_FOUND
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_template_maps_to_not_found() {
    let error = AppError::Core(CoreError::NotFound {
        what: "workflow template",
        name: "portrait".to_string(),
    });

    let (status, code, message) = status_and_code(error).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(code, "NOT_FOUND");
    assert!(message.contains("portrait"));
}

// ---------------------------------------------------------------------------
// Test: unreachable backend maps to 502 BACKEND_UNAVAILABLE
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_backend_maps_to_bad_gateway() {
    let error = AppError::Backend(BackendError::Unavailable("connection refused".into()));

    let (status, code, _) = status_and_code(error).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(code, "BACKEND_UNAVAILABLE");
}

// ---------------------------------------------------------------------------
// Test: backend rejection maps to 422 and carries the backend's body
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backend_rejection_maps_to_unprocessable() {
    let error = AppError::Backend(BackendError::Rejected {
        status: 400,
        body: "invalid prompt graph".into(),
    });

    let (status, code, message) = status_and_code(error).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(code, "BACKEND_REJECTED");
    assert!(message.contains("invalid prompt graph"));
}

// ---------------------------------------------------------------------------
// Test: poll budget exhaustion maps to 504 TIMEOUT
// ---------------------------------------------------------------------------

#[tokio::test]
async fn poll_timeout_maps_to_gateway_timeout() {
    let error = AppError::Backend(BackendError::Timeout { attempts: 60 });

    let (status, code, _) = status_and_code(error).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(code, "TIMEOUT");
}

// ---------------------------------------------------------------------------
// Test: generation failure maps to 502 GENERATION_FAILED
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generation_failure_maps_to_bad_gateway() {
    let error = AppError::Backend(BackendError::Failed("out of memory".into()));

    let (status, code, message) = status_and_code(error).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(code, "GENERATION_FAILED");
    assert!(message.contains("out of memory"));
}

// ---------------------------------------------------------------------------
// Test: internal errors never leak their message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn internal_error_message_is_sanitized() {
    let error = AppError::Internal("secret connection string".into());

    let (status, code, message) = status_and_code(error).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(code, "INTERNAL_ERROR");
    assert!(
        !message.contains("secret"),
        "internal detail leaked: {message}"
    );
}

// ---------------------------------------------------------------------------
// Test: malformed backend responses are reported without the raw detail
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_backend_response_is_sanitized() {
    let error = AppError::Backend(BackendError::Malformed("expected value at line 1".into()));

    let (status, code, message) = status_and_code(error).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(code, "BAD_BACKEND_RESPONSE");
    assert!(!message.contains("line 1"), "raw detail leaked: {message}");
}

// ---------------------------------------------------------------------------
// Test: missing artifact maps to 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_artifact_maps_to_not_found() {
    let error = AppError::Backend(BackendError::ArtifactNotFound {
        filename: "out.png".into(),
    });

    let (status, code, message) = status_and_code(error).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(code, "NOT_FOUND");
    assert!(message.contains("out.png"));
}
