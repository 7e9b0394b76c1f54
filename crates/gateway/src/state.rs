use std::sync::Arc;

use iris_comfy::{ComfyApi, ComfyClient};
use iris_core::workflow::TemplateStore;

use crate::config::ServerConfig;
use crate::registry::SessionRegistry;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheaply cloneable; the backend handles are explicit injected
/// capabilities rather than process globals, so tests can point them
/// at stub servers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Workflow templates, loaded once at startup.
    pub templates: Arc<TemplateStore>,
    /// Backend REST client (submission, polling, artifacts).
    pub backend: Arc<ComfyApi>,
    /// Backend WebSocket client (per-client event streams).
    pub backend_events: Arc<ComfyClient>,
    /// Live relay sessions, at most one per client id.
    pub registry: Arc<SessionRegistry>,
}
