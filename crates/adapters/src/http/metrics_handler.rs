use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::header;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::state::AppState;

/// Content-Type for `OpenMetrics` text exposition format.
const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    /// Substring filter on metric family lines.
    pub filter: Option<String>,
}

/// Serves Prometheus metrics in `OpenMetrics` text format. `?filter=` keeps
/// only the lines containing the given substring (the EOF marker stays).
#[utoipa::path(
    get, path = "/metrics",
    tag = "Observability",
    params(("filter" = Option<String>, Query, description = "Substring filter on metric lines")),
    responses(
        (status = 200, description = "OpenMetrics text exposition", content_type = "application/openmetrics-text"),
    )
)]
pub async fn metrics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MetricsQuery>,
) -> ([(header::HeaderName, &'static str); 1], String) {
    let body = state.metrics.encode();
    let body = match query.filter {
        Some(ref filter) if !filter.is_empty() => filter_lines(&body, filter),
        _ => body,
    };
    ([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body)
}

#[derive(Serialize, ToSchema)]
pub struct ResetResponse {
    /// Always `"reset"`.
    #[schema(value_type = String)]
    pub status: &'static str,
}

/// Zero all counters. Gauges repopulate on the next monitor tick.
#[utoipa::path(
    get, path = "/metrics/reset",
    tag = "Observability",
    responses(
        (status = 200, description = "Counters zeroed", body = ResetResponse),
    )
)]
pub async fn metrics_reset(State(state): State<Arc<AppState>>) -> Json<ResetResponse> {
    state.metrics.reset();
    Json(ResetResponse { status: "reset" })
}

fn filter_lines(body: &str, filter: &str) -> String {
    let mut out: String = body
        .lines()
        .filter(|line| line.contains(filter) || line.starts_with("# EOF"))
        .map(|line| format!("{line}\n"))
        .collect();
    if !out.ends_with("# EOF\n") {
        out.push_str("# EOF\n");
    }
    out
}
