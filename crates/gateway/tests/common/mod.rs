//! Shared helpers for gateway integration tests.
//!
//! Builds the real application router against stub backends so tests
//! exercise the same route table and middleware stack production uses.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use iris_comfy::{ComfyApi, ComfyClient};
use iris_core::workflow::TemplateStore;

use iris_gateway::config::ServerConfig;
use iris_gateway::registry::SessionRegistry;
use iris_gateway::router::build_app_router;
use iris_gateway::state::AppState;

/// Build a test `ServerConfig` with safe defaults and a short poll
/// budget so timeout paths finish quickly.
pub fn test_config(workflow_dir: &Path, api_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        comfy_api_url: api_url.to_string(),
        comfy_ws_url: api_url.replace("http://", "ws://"),
        workflow_dir: workflow_dir.to_path_buf(),
        poll_max_attempts: 3,
        poll_interval: Duration::from_millis(5),
    }
}

/// A workflow template with the usual encoder/sampler slot layout.
pub fn template_json() -> &'static str {
    r#"{
        "slots": {
            "prompt": {"node": "6", "input": "text"},
            "seed":   {"node": "3", "input": "seed"},
            "steps":  {"node": "3", "input": "steps"}
        },
        "graph": {
            "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "placeholder"}},
            "3": {"class_type": "KSampler", "inputs": {"seed": 0, "steps": 20}},
            "9": {"class_type": "SaveImage", "inputs": {"images": ["8", 0]}}
        }
    }"#
}

/// Write the default workflow template into `dir`.
pub fn write_default_template(dir: &Path) {
    std::fs::write(dir.join("default.json"), template_json()).expect("write template");
}

/// Build the full application router pointed at `api_url`, loading
/// templates from `workflow_dir`.
pub fn build_test_app(workflow_dir: &Path, api_url: &str) -> Router {
    build_test_app_with_registry(workflow_dir, api_url).0
}

/// Like [`build_test_app`], but hands back the session registry so
/// tests can observe session lifecycle from the outside.
pub fn build_test_app_with_registry(
    workflow_dir: &Path,
    api_url: &str,
) -> (Router, Arc<SessionRegistry>) {
    let config = test_config(workflow_dir, api_url);
    let templates = TemplateStore::load(workflow_dir).expect("load templates");
    let registry = Arc::new(SessionRegistry::new());

    let state = AppState {
        config: Arc::new(config.clone()),
        templates: Arc::new(templates),
        backend: Arc::new(ComfyApi::new(config.comfy_api_url.clone())),
        backend_events: Arc::new(ComfyClient::new(config.comfy_ws_url.clone())),
        registry: Arc::clone(&registry),
    };

    (build_app_router(state, &config), registry)
}

/// Start a stub backend server on an ephemeral port and return its
/// base URL.
pub async fn serve_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub backend");
    let addr = listener.local_addr().expect("stub backend addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub backend");
    });
    format!("http://{addr}")
}

/// Issue a GET request against the app.
pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("build request"),
    )
    .await
    .expect("send request")
}

/// Issue a POST request with a JSON body against the app.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("build request"),
    )
    .await
    .expect("send request")
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

/// Assert a JSON error body carries the expected machine-readable code.
pub async fn assert_error_code(response: Response, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code, "unexpected error body: {json}");
    assert!(json["error"].is_string());
}
