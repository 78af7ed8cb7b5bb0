use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use utoipa::ToSchema;

use super::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct RefreshResponse {
    /// `"queued"` when this request triggered a refresh, `"pending"` when
    /// one was already waiting.
    #[schema(value_type = String)]
    pub status: &'static str,
}

/// Force a domain-list fetch and reschedule every domain to now + jitter.
#[utoipa::path(
    post, path = "/refresh",
    tag = "Monitor",
    responses(
        (status = 202, description = "Refresh queued", body = RefreshResponse),
        (status = 200, description = "A refresh was already pending", body = RefreshResponse),
    )
)]
pub async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.handle.trigger_refresh() {
        (StatusCode::ACCEPTED, Json(RefreshResponse { status: "queued" }))
    } else {
        (StatusCode::OK, Json(RefreshResponse { status: "pending" }))
    }
}
