use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
}

/// Backend status response payload.
#[derive(Serialize)]
pub struct StatusResponse {
    /// `connected` when the backend answers its status probe.
    pub backend: &'static str,
    /// The backend HTTP base URL this gateway targets.
    pub backend_url: String,
    /// Number of live relay sessions.
    pub active_sessions: usize,
    /// Names of the loaded workflow templates.
    pub workflows: Vec<String>,
}

/// GET /health -- liveness only; never touches the backend.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/status -- probes backend reachability.
async fn backend_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let reachable = state.backend.ping().await;

    Json(StatusResponse {
        backend: if reachable { "connected" } else { "disconnected" },
        backend_url: state.backend.api_url().to_string(),
        active_sessions: state.registry.connection_count().await,
        workflows: state
            .templates
            .names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

/// Mount the health check at root level (NOT under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Mount the backend status probe (under `/api`).
pub fn status_router() -> Router<AppState> {
    Router::new().route("/status", get(backend_status))
}
