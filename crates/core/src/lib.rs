//! Core domain types for the iris image-generation gateway.
//!
//! Holds the error taxonomy, job request/handle types, the
//! client-facing progress vocabulary, and the workflow template store.
//! Everything backend-specific (the ComfyUI wire protocol) lives in
//! `iris-comfy`; everything HTTP-specific lives in `iris-gateway`.

pub mod error;
pub mod progress;
pub mod types;
pub mod workflow;

pub use error::CoreError;
