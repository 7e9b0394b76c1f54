//! Native backend message types and parsers.
//!
//! The backend pushes JSON messages over WebSocket with the shape
//! `{"type": "<kind>", "data": {...}}`, plus raw binary frames for
//! preview images. This module deserializes the text frames into a
//! typed [`ComfyMessage`] and splits the binary frame header.

use serde::Deserialize;

/// All known backend WebSocket message types.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ComfyMessage {
    /// Queue status broadcast.
    #[serde(rename = "status")]
    Status(StatusData),

    /// A job has started executing.
    #[serde(rename = "execution_start")]
    ExecutionStart(ExecutionStartData),

    /// Nodes skipped because their outputs were cached.
    #[serde(rename = "execution_cached")]
    ExecutionCached(ExecutionCachedData),

    /// A node is executing. `node: None` means the job is finished --
    /// the backend emits no dedicated terminal message.
    #[serde(rename = "executing")]
    Executing(ExecutingData),

    /// Step-level progress inside a long-running node.
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// A node finished and produced output.
    #[serde(rename = "executed")]
    Executed(ExecutedData),

    /// The job failed.
    #[serde(rename = "execution_error")]
    ExecutionError(ExecutionErrorData),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    pub status: QueueStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueStatus {
    pub exec_info: ExecInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecInfo {
    pub queue_remaining: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionStartData {
    pub prompt_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionCachedData {
    pub prompt_id: String,
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    pub node: Option<String>,
    pub prompt_id: String,
}

/// Step progress. Older backend builds omit `prompt_id` and `node`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    pub value: u32,
    pub max: u32,
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutedData {
    pub node: String,
    /// Raw node output (image references etc.).
    pub output: serde_json::Value,
    pub prompt_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionErrorData {
    pub prompt_id: String,
    #[serde(default)]
    pub node_id: Option<String>,
    pub exception_message: String,
    #[serde(default)]
    pub exception_type: Option<String>,
}

/// Parse one text frame. `Err` covers malformed JSON and unknown
/// `type` values; callers log and skip those.
pub fn parse_message(text: &str) -> Result<ComfyMessage, serde_json::Error> {
    serde_json::from_str(text)
}

/// Binary frame event type for preview images.
const BINARY_PREVIEW_IMAGE: u32 = 1;

/// Split a binary frame into its preview payload.
///
/// Binary frames carry an 8-byte header: a big-endian `u32` event type
/// followed by a big-endian `u32` image format. Returns the encoded
/// image bytes for preview frames, `None` for anything else.
pub fn preview_payload(frame: &[u8]) -> Option<&[u8]> {
    if frame.len() < 8 {
        return None;
    }
    let event = u32::from_be_bytes(frame[0..4].try_into().ok()?);
    if event != BINARY_PREVIEW_IMAGE {
        return None;
    }
    Some(&frame[8..])
}
