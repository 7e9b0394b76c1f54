//! Client-facing progress vocabulary.
//!
//! The generation backend has its own WebSocket message schema; the
//! relay translates it into these events so the client protocol stays
//! decoupled from the backend implementation.

use serde::{Deserialize, Serialize};

/// Reference to a generated image held by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Backend folder kind, e.g. `output` or `temp`.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "output".to_string()
}

/// One observable state change of a tracked job.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The job is waiting in the backend queue.
    Queued { queue_remaining: u32 },

    /// A node is executing, optionally with step-level progress.
    Executing {
        node: Option<String>,
        step: Option<u32>,
        total_steps: Option<u32>,
    },

    /// An intermediate preview image.
    Preview { payload: Vec<u8> },

    /// The job finished; artifacts and the realized seed come from the
    /// backend's history entry.
    Completed {
        artifacts: Vec<ArtifactRef>,
        seed: Option<u64>,
    },

    /// The backend reported a generation error.
    Failed { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_ref_deserializes_backend_image_json() {
        let json = r#"{"filename":"img_00001_.png","subfolder":"batch","type":"output"}"#;
        let artifact: ArtifactRef = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.filename, "img_00001_.png");
        assert_eq!(artifact.subfolder, "batch");
        assert_eq!(artifact.kind, "output");
    }

    #[test]
    fn artifact_ref_defaults_subfolder_and_kind() {
        let json = r#"{"filename":"out.png"}"#;
        let artifact: ArtifactRef = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.subfolder, "");
        assert_eq!(artifact.kind, "output");
    }
}
