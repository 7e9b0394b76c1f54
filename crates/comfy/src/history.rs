//! Parsing of backend history entries.
//!
//! `GET /history/{id}` returns a map keyed by job id. Each entry
//! carries the submitted prompt, a status block, and per-node outputs
//! with image references. This module extracts the parts the gateway
//! cares about: artifact references, the realized seed, and any
//! recorded error.

use iris_core::progress::ArtifactRef;

/// The digested form of one history entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryEntry {
    /// Every image reference found across the entry's node outputs.
    pub artifacts: Vec<ArtifactRef>,
    /// Seed the backend actually ran with, when recoverable from the
    /// recorded prompt.
    pub seed: Option<u64>,
    /// Error message when the entry records a failed run.
    pub error: Option<String>,
}

/// Look up the entry for one job id in a history response.
pub fn find_entry<'a>(
    history: &'a serde_json::Value,
    job_id: &str,
) -> Option<&'a serde_json::Value> {
    history.get(job_id)
}

/// Digest a single history entry.
pub fn parse_entry(entry: &serde_json::Value) -> HistoryEntry {
    HistoryEntry {
        artifacts: extract_artifacts(entry),
        seed: extract_seed(entry),
        error: extract_error(entry),
    }
}

/// Collect image references from every node output, in node order.
fn extract_artifacts(entry: &serde_json::Value) -> Vec<ArtifactRef> {
    let Some(outputs) = entry.get("outputs").and_then(|o| o.as_object()) else {
        return Vec::new();
    };

    let mut artifacts = Vec::new();
    for node_output in outputs.values() {
        let Some(images) = node_output.get("images").and_then(|i| i.as_array()) else {
            continue;
        };
        for image in images {
            match serde_json::from_value::<ArtifactRef>(image.clone()) {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => tracing::warn!(error = %e, "Skipping unparsable image reference"),
            }
        }
    }
    artifacts
}

/// Recover the seed from the recorded prompt.
///
/// The entry stores the submitted prompt as an array whose third
/// element is the node graph; the seed is whatever `seed` input a node
/// carries. The first match wins -- the gateway only ever substitutes
/// one seed slot per job.
fn extract_seed(entry: &serde_json::Value) -> Option<u64> {
    let graph = entry.get("prompt")?.get(2)?.as_object()?;
    graph
        .values()
        .find_map(|node| node.get("inputs")?.get("seed")?.as_u64())
}

/// Pull an error message out of the entry, if any.
///
/// Failed runs carry `status.status_str == "error"` with the exception
/// message buried in the status message list; some backend builds also
/// put a top-level `error` string on the entry.
fn extract_error(entry: &serde_json::Value) -> Option<String> {
    if let Some(message) = entry.get("error").and_then(|e| e.as_str()) {
        return Some(message.to_string());
    }

    let status = entry.get("status")?;
    if status.get("status_str")?.as_str()? != "error" {
        return None;
    }

    let detail = status
        .get("messages")
        .and_then(|m| m.as_array())
        .and_then(|messages| {
            messages.iter().find_map(|m| {
                let kind = m.get(0)?.as_str()?;
                if kind != "execution_error" {
                    return None;
                }
                m.get(1)?.get("exception_message")?.as_str().map(String::from)
            })
        });

    Some(detail.unwrap_or_else(|| "execution error".to_string()))
}
