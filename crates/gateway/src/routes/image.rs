//! Artifact retrieval and history passthrough.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde::Deserialize;

use iris_core::progress::ArtifactRef;

use crate::error::AppResult;
use crate::state::AppState;

/// Query parameters identifying one artifact on the backend.
#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Backend folder kind; generated outputs live in `output`.
    #[serde(default = "default_folder_type")]
    pub folder_type: String,
}

fn default_folder_type() -> String {
    "output".to_string()
}

/// GET /api/image -- stream one artifact's bytes to the client.
async fn fetch_image(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> AppResult<Response> {
    let artifact = ArtifactRef {
        filename: query.filename,
        subfolder: query.subfolder,
        kind: query.folder_type,
    };

    let bytes = state.backend.view(&artifact).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/png")],
        bytes,
    )
        .into_response())
}

/// GET /api/history/{job_id} -- backend history entry, passed through
/// verbatim so clients can inspect outputs and status themselves.
async fn fetch_history(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let history = state.backend.get_history(&job_id).await?;
    Ok(Json(history))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/image", get(fetch_image))
        .route("/history/{job_id}", get(fetch_history))
}
