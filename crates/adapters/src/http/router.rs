use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use super::domains_handler;
use super::health_handler;
use super::metrics_handler;
use super::refresh_handler;
use super::state::AppState;
use super::status_handler;

/// Build the ops API router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler::health))
        .route("/status", get(status_handler::status))
        .route("/domains", get(domains_handler::list_domains))
        .route("/domain/{name}", get(domains_handler::get_domain))
        .route("/refresh", post(refresh_handler::refresh))
        .route("/metrics", get(metrics_handler::metrics))
        .route("/metrics/reset", get(metrics_handler::metrics_reset))
        .with_state(state)
}
