/// Domain-level errors shared across the workspace.
///
/// Backend transport failures (connection refused, rejected jobs,
/// poll timeouts) have their own enum in `iris-comfy`; this covers
/// everything that can go wrong before a job reaches the backend.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A named resource (workflow template, artifact) does not exist.
    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    /// A resource or request body could not be parsed into the
    /// expected structure.
    #[error("malformed {0}")]
    Malformed(String),
}
