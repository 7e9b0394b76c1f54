//! REST client for the backend HTTP endpoints.
//!
//! Wraps job submission, history polling, and artifact retrieval over
//! [`reqwest`]. Polling is side-effect-free and safe to repeat; the
//! bounded [`ComfyApi::wait_for_outputs`] loop is the synchronous
//! request/response path's only waiting primitive.

use std::time::Duration;

use serde::Deserialize;

use iris_core::progress::ArtifactRef;

use crate::history::{self, HistoryEntry};

/// HTTP client for a single backend instance.
pub struct ComfyApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response from the backend's `/prompt` endpoint after queuing a job.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Backend-assigned identifier for the queued job.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: i64,
}

/// Errors from the backend transport layer.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached at all.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend reported the job itself as invalid.
    #[error("backend rejected the job ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The referenced artifact does not exist on the backend.
    #[error("artifact not found: {filename}")]
    ArtifactNotFound { filename: String },

    /// The poll budget ran out before the job showed up in history.
    #[error("job did not complete within {attempts} poll attempts")]
    Timeout { attempts: u32 },

    /// The backend reported a generation error for the job.
    #[error("generation failed: {0}")]
    Failed(String),

    /// The backend answered with something unparsable.
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

/// Result of one history poll for a job id.
#[derive(Debug)]
pub enum JobStatus {
    /// Not yet visible in history (queued or still executing).
    Pending,
    /// Finished with outputs.
    Done(HistoryEntry),
    /// Finished with a recorded error.
    Failed { message: String },
}

impl ComfyApi {
    /// Create a client for the backend at `api_url`
    /// (e.g. `http://127.0.0.1:8188`).
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Base HTTP URL this client talks to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a concrete job graph for execution.
    ///
    /// `POST /prompt` with the graph and the client id the backend
    /// should address progress events to.
    pub async fn submit_workflow(
        &self,
        graph: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, BackendError> {
        let body = serde_json::json!({
            "prompt": graph,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<SubmitResponse>()
            .await
            .map_err(|e| BackendError::Malformed(format!("submit response: {e}")))
    }

    /// Fetch the raw history JSON for a job (`GET /history/{id}`).
    pub async fn get_history(&self, job_id: &str) -> Result<serde_json::Value, BackendError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, job_id))
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(format!("history response: {e}")))
    }

    /// Query the job's state by id. Repeatable; no side effects.
    pub async fn poll(&self, job_id: &str) -> Result<JobStatus, BackendError> {
        let history = self.get_history(job_id).await?;

        let Some(raw) = history::find_entry(&history, job_id) else {
            return Ok(JobStatus::Pending);
        };

        let entry = history::parse_entry(raw);
        if let Some(message) = entry.error {
            return Ok(JobStatus::Failed { message });
        }
        if entry.artifacts.is_empty() {
            // Visible but not finished yet.
            return Ok(JobStatus::Pending);
        }
        Ok(JobStatus::Done(entry))
    }

    /// Poll until the job finishes, with a fixed attempt budget and a
    /// fixed delay per attempt.
    pub async fn wait_for_outputs(
        &self,
        job_id: &str,
        attempts: u32,
        delay: Duration,
    ) -> Result<HistoryEntry, BackendError> {
        for attempt in 1..=attempts {
            match self.poll(job_id).await? {
                JobStatus::Done(entry) => return Ok(entry),
                JobStatus::Failed { message } => return Err(BackendError::Failed(message)),
                JobStatus::Pending => {
                    tracing::debug!(job_id, attempt, attempts, "Job not finished, waiting");
                }
            }
            tokio::time::sleep(delay).await;
        }
        Err(BackendError::Timeout { attempts })
    }

    /// Fetch a generated image's raw bytes (`GET /view?...`).
    pub async fn view(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, BackendError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", artifact.filename.as_str()),
                ("subfolder", artifact.subfolder.as_str()),
                ("type", artifact.kind.as_str()),
            ])
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::ArtifactNotFound {
                filename: artifact.filename.clone(),
            });
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(unavailable)?;
        Ok(bytes.to_vec())
    }

    /// Cheap reachability probe for the status endpoint.
    pub async fn ping(&self) -> bool {
        self.client
            .get(format!("{}/system_stats", self.api_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

fn unavailable(e: reqwest::Error) -> BackendError {
    BackendError::Unavailable(e.to_string())
}
