//! Synchronous generation endpoints.
//!
//! Both endpoints submit a job and block until the backend's history
//! reports outputs, bounded by the configured poll budget. The relay
//! in [`crate::relay`] is the streaming alternative; these exist for
//! clients that want plain request/response.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::post, Json, Router};
use base64::Engine;
use serde::{Deserialize, Serialize};
use validator::Validate;

use iris_core::progress::ArtifactRef;
use iris_core::types::JobRequest;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Response for `POST /api/generate-image`.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub job_id: String,
    /// The seed actually submitted (randomized when absent from the
    /// request).
    pub seed: u64,
    pub artifacts: Vec<ArtifactRef>,
}

/// Request body in the common txt2img wire shape.
#[derive(Debug, Deserialize)]
pub struct Txt2ImgRequest {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub steps: Option<u32>,
    #[serde(default)]
    pub cfg_scale: Option<f32>,
}

/// Response in the common txt2img wire shape: base64-encoded images
/// plus an info string carrying the realized seed.
#[derive(Debug, Serialize)]
pub struct Txt2ImgResponse {
    pub images: Vec<String>,
    pub info: String,
}

/// Submit one job and wait for its outputs.
///
/// Shared by both endpoints so seed handling and the poll budget stay
/// identical across wire shapes.
async fn run_generation(state: &AppState, request: &JobRequest) -> AppResult<GenerateResponse> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let template = state.templates.get(request.workflow_name())?;
    let seed = request.seed_or_random();
    let graph = template.apply(request, seed)?;

    // Each synchronous job gets a throwaway client id; nothing listens
    // on the event stream for it.
    let client_id = uuid::Uuid::new_v4().to_string();
    let accepted = state.backend.submit_workflow(&graph, &client_id).await?;

    tracing::info!(
        job_id = %accepted.prompt_id,
        seed,
        workflow = request.workflow_name(),
        "Job submitted (synchronous)",
    );

    let entry = state
        .backend
        .wait_for_outputs(
            &accepted.prompt_id,
            state.config.poll_max_attempts,
            state.config.poll_interval,
        )
        .await?;

    Ok(GenerateResponse {
        job_id: accepted.prompt_id,
        seed: entry.seed.unwrap_or(seed),
        artifacts: entry.artifacts,
    })
}

/// POST /api/generate-image -- native request shape, artifact refs out.
async fn generate_image(
    State(state): State<AppState>,
    Json(request): Json<JobRequest>,
) -> AppResult<(StatusCode, Json<GenerateResponse>)> {
    let response = run_generation(&state, &request).await?;
    Ok((StatusCode::OK, Json(response)))
}

/// POST /sdapi/v1/txt2img -- txt2img-compatible shape, base64 images out.
async fn txt2img(
    State(state): State<AppState>,
    Json(body): Json<Txt2ImgRequest>,
) -> AppResult<Json<Txt2ImgResponse>> {
    let request = JobRequest {
        prompt_text: body.prompt,
        negative_prompt_text: body.negative_prompt,
        workflow_name: None,
        // This wire shape uses -1 for "randomize".
        seed: body.seed.filter(|s| *s > 0).map(|s| s as u64),
        width: body.width,
        height: body.height,
        step_count: body.steps,
        guidance_scale: body.cfg_scale,
    };

    let outcome = run_generation(&state, &request).await?;

    let mut images = Vec::with_capacity(outcome.artifacts.len());
    for artifact in &outcome.artifacts {
        let bytes = state.backend.view(artifact).await?;
        images.push(base64::engine::general_purpose::STANDARD.encode(bytes));
    }

    let info = serde_json::json!({
        "seed": outcome.seed,
        "job_id": outcome.job_id,
    })
    .to_string();

    Ok(Json(Txt2ImgResponse { images, info }))
}

/// Mount the native generation endpoint (under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/generate-image", post(generate_image))
}

/// Mount the txt2img-compatible endpoint (root-level, NOT under `/api`).
pub fn compat_router() -> Router<AppState> {
    Router::new().route("/sdapi/v1/txt2img", post(txt2img))
}
