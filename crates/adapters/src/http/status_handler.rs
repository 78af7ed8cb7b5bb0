use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use utoipa::ToSchema;

use super::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct WorkerStats {
    /// Configured worker pool size.
    pub pool_size: usize,
    /// Workers currently executing a check.
    pub busy: usize,
    /// Domains claimed for checking (dispatch through completion).
    pub in_flight: usize,
}

#[derive(Serialize, ToSchema)]
pub struct DomainStats {
    pub total: usize,
    pub priority: usize,
    /// Domain counts keyed by last verdict.
    pub by_verdict: BTreeMap<String, usize>,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub instance_id: String,
    #[schema(value_type = String)]
    pub version: &'static str,
    pub uptime_secs: u64,
    pub workers: WorkerStats,
    pub domains: DomainStats,
}

/// Operational status: uptime, verdict distribution, worker pool load.
#[utoipa::path(
    get, path = "/status",
    tag = "Monitor",
    responses(
        (status = 200, description = "Monitor status", body = StatusResponse),
    )
)]
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshot = state.handle.status().await;
    Json(StatusResponse {
        instance_id: snapshot.instance_id,
        version: state.version,
        uptime_secs: snapshot.uptime_secs,
        workers: WorkerStats {
            pool_size: snapshot.workers,
            busy: snapshot.busy_workers,
            in_flight: snapshot.in_flight,
        },
        domains: DomainStats {
            total: snapshot.domains_total,
            priority: snapshot.domains_priority,
            by_verdict: snapshot
                .counts_by_verdict
                .into_iter()
                .map(|(status, count)| (status.to_string(), count))
                .collect(),
        },
    })
}
