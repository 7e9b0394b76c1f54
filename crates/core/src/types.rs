//! Job request and handle types.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;
use validator::Validate;

/// Template used when a request does not name one.
pub const DEFAULT_WORKFLOW: &str = "default";

/// Largest seed value accepted by the generation backend.
pub const MAX_SEED: u64 = u32::MAX as u64;

/// A client's request to generate an image.
///
/// Optional fields that are absent leave the workflow template's own
/// defaults untouched. A missing seed is replaced by a random one at
/// submission time, never before (see [`JobRequest::seed_or_random`]).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct JobRequest {
    #[validate(length(min = 1, max = 4096))]
    pub prompt_text: String,

    #[serde(default)]
    pub negative_prompt_text: Option<String>,

    /// Name of the workflow template to instantiate.
    #[serde(default)]
    pub workflow_name: Option<String>,

    #[serde(default)]
    #[validate(range(min = 1, max = 4_294_967_295u64))]
    pub seed: Option<u64>,

    #[serde(default)]
    #[validate(range(min = 64, max = 4096))]
    pub width: Option<u32>,

    #[serde(default)]
    #[validate(range(min = 64, max = 4096))]
    pub height: Option<u32>,

    #[serde(default)]
    #[validate(range(min = 1, max = 150))]
    pub step_count: Option<u32>,

    #[serde(default)]
    #[validate(range(min = 0.0, max = 30.0))]
    pub guidance_scale: Option<f32>,
}

impl JobRequest {
    /// The template name to use, falling back to [`DEFAULT_WORKFLOW`].
    pub fn workflow_name(&self) -> &str {
        self.workflow_name.as_deref().unwrap_or(DEFAULT_WORKFLOW)
    }

    /// The seed to submit: the requested one, or a fresh uniformly
    /// random value in `[1, 2^32 - 1]`.
    pub fn seed_or_random(&self) -> u64 {
        self.seed.unwrap_or_else(random_seed)
    }
}

/// Draw a uniformly random seed in `[1, 2^32 - 1]`.
pub fn random_seed() -> u64 {
    rand::rng().random_range(1..=MAX_SEED)
}

/// Identifies one submitted job. Immutable after creation; the join
/// key between the client-facing relay and backend polling.
#[derive(Debug, Clone)]
pub struct JobHandle {
    /// Backend-assigned job identifier (opaque).
    pub job_id: String,
    /// The client this job belongs to.
    pub client_id: String,
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            client_id: client_id.into(),
            submitted_at: Utc::now(),
        }
    }
}
