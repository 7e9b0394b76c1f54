use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development against a
/// backend on the default port. Override via environment variables in
/// production.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120` -- the
    /// synchronous generation path sits inside this budget).
    pub request_timeout_secs: u64,
    /// Backend HTTP base URL (default: `http://127.0.0.1:8188`).
    pub comfy_api_url: String,
    /// Backend WebSocket base URL (default: `ws://127.0.0.1:8188`).
    pub comfy_ws_url: String,
    /// Directory holding workflow template documents.
    pub workflow_dir: PathBuf,
    /// Maximum history poll attempts on the synchronous path.
    pub poll_max_attempts: u32,
    /// Delay between poll attempts.
    pub poll_interval: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `120`                      |
    /// | `COMFY_API_URL`        | `http://127.0.0.1:8188`    |
    /// | `COMFY_WS_URL`         | `ws://127.0.0.1:8188`      |
    /// | `WORKFLOW_DIR`         | `./workflows`              |
    /// | `POLL_MAX_ATTEMPTS`    | `60`                       |
    /// | `POLL_INTERVAL_MS`     | `1000`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let comfy_api_url =
            std::env::var("COMFY_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8188".into());

        let comfy_ws_url =
            std::env::var("COMFY_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:8188".into());

        let workflow_dir: PathBuf = std::env::var("WORKFLOW_DIR")
            .unwrap_or_else(|_| "./workflows".into())
            .into();

        let poll_max_attempts: u32 = std::env::var("POLL_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("POLL_MAX_ATTEMPTS must be a valid u32");

        let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("POLL_INTERVAL_MS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            comfy_api_url,
            comfy_ws_url,
            workflow_dir,
            poll_max_attempts,
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }
}
