//! HTTP route modules.

pub mod generate;
pub mod health;
pub mod image;

use axum::Router;

use crate::state::AppState;

/// Routes mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::status_router())
        .merge(generate::router())
        .merge(image::router())
}
