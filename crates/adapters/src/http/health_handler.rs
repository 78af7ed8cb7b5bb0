use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use utoipa::ToSchema;

use super::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// `"ok"` or `"unhealthy"`.
    #[schema(value_type = String)]
    pub status: &'static str,
}

/// Health probe — 200 while the monitor loop is alive and the state
/// directory is writable, 503 otherwise.
#[utoipa::path(
    get, path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Monitor is healthy", body = HealthResponse),
        (status = 503, description = "Monitor loop dead or state not writable", body = HealthResponse),
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.handle.is_healthy().await {
        (StatusCode::OK, Json(HealthResponse { status: "ok" }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
            }),
        )
    }
}
