//! Client for a ComfyUI-style image-generation backend.
//!
//! Provides the REST surface (job submission, history polling,
//! artifact retrieval), a per-client WebSocket event stream, typed
//! parsing of the backend's native message vocabulary, and the
//! translator that turns native messages into client-facing
//! [`iris_core::progress::ProgressEvent`]s.

pub mod api;
pub mod client;
pub mod events;
pub mod history;
pub mod messages;

pub use api::{BackendError, ComfyApi, JobStatus};
pub use client::{BackendFrame, ComfyClient, ComfySocket};
