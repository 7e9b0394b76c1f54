//! Iris gateway server library.
//!
//! Exposes the building blocks (config, state, error handling, the
//! connection registry, the progress relay, and routes) so the binary
//! entrypoint and integration tests share the same construction.

pub mod config;
pub mod error;
pub mod registry;
pub mod relay;
pub mod router;
pub mod routes;
pub mod state;
