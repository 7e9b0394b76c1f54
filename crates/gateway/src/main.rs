use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iris_comfy::{ComfyApi, ComfyClient};
use iris_core::workflow::TemplateStore;

use iris_gateway::config::ServerConfig;
use iris_gateway::registry::{start_heartbeat, SessionRegistry};
use iris_gateway::router::build_app_router;
use iris_gateway::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iris_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Workflow templates ---
    let templates =
        TemplateStore::load(&config.workflow_dir).expect("Failed to load workflow templates");
    if templates.is_empty() {
        tracing::warn!(dir = %config.workflow_dir.display(), "No workflow templates found");
    }

    // --- Backend clients ---
    let backend = Arc::new(ComfyApi::new(config.comfy_api_url.clone()));
    let backend_events = Arc::new(ComfyClient::new(config.comfy_ws_url.clone()));
    tracing::info!(api_url = %config.comfy_api_url, "Backend clients created");

    // --- Session registry + heartbeat ---
    let registry = Arc::new(SessionRegistry::new());
    let heartbeat_handle = start_heartbeat(Arc::clone(&registry));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        templates: Arc::new(templates),
        backend,
        backend_events,
        registry: Arc::clone(&registry),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let session_count = registry.connection_count().await;
    tracing::info!(session_count, "Closing remaining relay sessions");
    registry.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
