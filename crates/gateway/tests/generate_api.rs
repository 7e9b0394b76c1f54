//! Integration tests for the synchronous generation endpoints, run
//! against a stub backend.

mod common;

use axum::extract::Query;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use serde_json::json;

use common::{assert_error_code, body_json, post_json};

const IMAGE_BYTES: &[u8] = b"PNGDATA";

/// Stub backend that accepts one job and reports it finished with a
/// single output image and a realized seed of 42.
fn happy_backend() -> Router {
    Router::new()
        .route(
            "/prompt",
            post(|| async { Json(json!({"prompt_id": "job-1", "number": 1})) }),
        )
        .route(
            "/history/{id}",
            get(|| async {
                Json(json!({
                    "job-1": {
                        "prompt": [1, "job-1", {"3": {"inputs": {"seed": 42}}}],
                        "outputs": {
                            "9": {"images": [
                                {"filename": "img.png", "subfolder": "", "type": "output"}
                            ]}
                        },
                        "status": {"status_str": "success", "completed": true}
                    }
                }))
            }),
        )
        .route(
            "/view",
            get(|Query(q): Query<std::collections::HashMap<String, String>>| async move {
                if q.get("filename").map(String::as_str) == Some("img.png") {
                    ([(header::CONTENT_TYPE, "image/png")], IMAGE_BYTES).into_response()
                } else {
                    StatusCode::NOT_FOUND.into_response()
                }
            }),
        )
}

/// Stub backend whose history never shows the job.
fn stuck_backend() -> Router {
    Router::new()
        .route(
            "/prompt",
            post(|| async { Json(json!({"prompt_id": "job-1", "number": 1})) }),
        )
        .route("/history/{id}", get(|| async { Json(json!({})) }))
}

// ---------------------------------------------------------------------------
// Test: POST /api/generate-image returns artifacts and the realized seed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generate_image_returns_artifacts_and_seed() {
    let api_url = common::serve_stub(happy_backend()).await;
    let dir = tempfile::tempdir().unwrap();
    common::write_default_template(dir.path());
    let app = common::build_test_app(dir.path(), &api_url);

    let response = post_json(
        app,
        "/api/generate-image",
        json!({"prompt_text": "a cat", "seed": 7}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["job_id"], "job-1");
    // The seed reported back comes from the backend's history entry.
    assert_eq!(body["seed"], 42);
    assert_eq!(body["artifacts"][0]["filename"], "img.png");
    assert_eq!(body["artifacts"][0]["type"], "output");
}

// ---------------------------------------------------------------------------
// Test: request validation failures are 400s before any backend call
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generate_image_rejects_invalid_request() {
    let dir = tempfile::tempdir().unwrap();
    common::write_default_template(dir.path());
    // Unreachable backend: validation must fail before it is contacted.
    let app = common::build_test_app(dir.path(), "http://127.0.0.1:9");

    let response = post_json(app, "/api/generate-image", json!({"prompt_text": ""})).await;

    assert_error_code(response, StatusCode::BAD_REQUEST, "BAD_REQUEST").await;
}

// ---------------------------------------------------------------------------
// Test: naming an unknown workflow template is a 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generate_image_unknown_workflow_is_404() {
    let dir = tempfile::tempdir().unwrap();
    common::write_default_template(dir.path());
    let app = common::build_test_app(dir.path(), "http://127.0.0.1:9");

    let response = post_json(
        app,
        "/api/generate-image",
        json!({"prompt_text": "a cat", "workflow_name": "missing"}),
    )
    .await;

    assert_error_code(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;
}

// ---------------------------------------------------------------------------
// Test: a job that never reaches history exhausts the poll budget
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generate_image_times_out_when_job_never_finishes() {
    let api_url = common::serve_stub(stuck_backend()).await;
    let dir = tempfile::tempdir().unwrap();
    common::write_default_template(dir.path());
    let app = common::build_test_app(dir.path(), &api_url);

    let response = post_json(app, "/api/generate-image", json!({"prompt_text": "a cat"})).await;

    assert_error_code(response, StatusCode::GATEWAY_TIMEOUT, "TIMEOUT").await;
}

// ---------------------------------------------------------------------------
// Test: unreachable backend surfaces as 502
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generate_image_with_dead_backend_is_502() {
    let dir = tempfile::tempdir().unwrap();
    common::write_default_template(dir.path());
    let app = common::build_test_app(dir.path(), "http://127.0.0.1:9");

    let response = post_json(app, "/api/generate-image", json!({"prompt_text": "a cat"})).await;

    assert_error_code(response, StatusCode::BAD_GATEWAY, "BACKEND_UNAVAILABLE").await;
}

// ---------------------------------------------------------------------------
// Test: POST /sdapi/v1/txt2img returns base64-encoded images
// ---------------------------------------------------------------------------

#[tokio::test]
async fn txt2img_returns_base64_images() {
    let api_url = common::serve_stub(happy_backend()).await;
    let dir = tempfile::tempdir().unwrap();
    common::write_default_template(dir.path());
    let app = common::build_test_app(dir.path(), &api_url);

    let response = post_json(
        app,
        "/sdapi/v1/txt2img",
        json!({"prompt": "a cat", "steps": 4}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let expected = base64::engine::general_purpose::STANDARD.encode(IMAGE_BYTES);
    assert_eq!(body["images"][0], expected);

    let info: serde_json::Value =
        serde_json::from_str(body["info"].as_str().expect("info string")).unwrap();
    assert_eq!(info["seed"], 42);
    assert_eq!(info["job_id"], "job-1");
}

// ---------------------------------------------------------------------------
// Test: txt2img treats non-positive seeds as "randomize"
// ---------------------------------------------------------------------------

#[tokio::test]
async fn txt2img_accepts_randomize_seed_sentinel() {
    let api_url = common::serve_stub(happy_backend()).await;
    let dir = tempfile::tempdir().unwrap();
    common::write_default_template(dir.path());
    let app = common::build_test_app(dir.path(), &api_url);

    let response = post_json(
        app,
        "/sdapi/v1/txt2img",
        json!({"prompt": "a cat", "seed": -1}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Test: GET /api/image streams the artifact bytes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn image_endpoint_streams_artifact_bytes() {
    use http_body_util::BodyExt;

    let api_url = common::serve_stub(happy_backend()).await;
    let dir = tempfile::tempdir().unwrap();
    common::write_default_template(dir.path());
    let app = common::build_test_app(dir.path(), &api_url);

    let response = common::get(app, "/api/image?filename=img.png").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), IMAGE_BYTES);
}

// ---------------------------------------------------------------------------
// Test: GET /api/image for a missing artifact is a 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn image_endpoint_missing_artifact_is_404() {
    let api_url = common::serve_stub(happy_backend()).await;
    let dir = tempfile::tempdir().unwrap();
    common::write_default_template(dir.path());
    let app = common::build_test_app(dir.path(), &api_url);

    let response = common::get(app, "/api/image?filename=nope.png").await;

    assert_error_code(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;
}

// ---------------------------------------------------------------------------
// Test: GET /api/history/{job_id} passes the backend entry through
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_endpoint_passes_backend_json_through() {
    let api_url = common::serve_stub(happy_backend()).await;
    let dir = tempfile::tempdir().unwrap();
    common::write_default_template(dir.path());
    let app = common::build_test_app(dir.path(), &api_url);

    let response = common::get(app, "/api/history/job-1").await;

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["job-1"]["status"]["status_str"], "success");
    assert_eq!(
        body["job-1"]["outputs"]["9"]["images"][0]["filename"],
        "img.png"
    );
}
