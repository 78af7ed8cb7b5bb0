use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use domain::common::entity::DomainName;
use domain::registry::entity::MonitoredDomain;
use serde::Serialize;
use utoipa::ToSchema;

use super::error::ApiError;
use super::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct DomainSummary {
    pub domain: String,
    pub priority: bool,
    /// Last pipeline verdict, snake_case.
    #[schema(value_type = String)]
    pub last_verdict: &'static str,
    pub last_confidence: f64,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub next_check_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct DomainDetail {
    #[serde(flatten)]
    pub summary: DomainSummary,
    pub consecutive_failures: u32,
    #[schema(value_type = Option<String>)]
    pub last_reported_status: Option<&'static str>,
    pub in_flight: bool,
}

fn summary(domain: &MonitoredDomain) -> DomainSummary {
    DomainSummary {
        domain: domain.name.to_string(),
        priority: domain.priority,
        last_verdict: domain.last_verdict.as_str(),
        last_confidence: domain.last_confidence,
        last_checked_at: domain.last_checked_at,
        next_check_at: domain.next_check_at,
    }
}

/// All monitored domains with their last verdict and timing.
#[utoipa::path(
    get, path = "/domains",
    tag = "Monitor",
    responses(
        (status = 200, description = "Monitored domains", body = [DomainSummary]),
    )
)]
pub async fn list_domains(State(state): State<Arc<AppState>>) -> Json<Vec<DomainSummary>> {
    let domains = state.handle.domains().await;
    Json(domains.iter().map(summary).collect())
}

/// Detailed record for one domain, 404 when it is not monitored.
#[utoipa::path(
    get, path = "/domain/{name}",
    tag = "Monitor",
    params(("name" = String, Path, description = "Domain name")),
    responses(
        (status = 200, description = "Domain record", body = DomainDetail),
        (status = 400, description = "Not a valid domain name"),
        (status = 404, description = "Domain is not monitored"),
    )
)]
pub async fn get_domain(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<DomainDetail>, ApiError> {
    let name = DomainName::parse(&name).map_err(|e| ApiError::BadRequest {
        code: "INVALID_DOMAIN",
        message: e.to_string(),
    })?;

    let domain = state
        .handle
        .domain(&name)
        .await
        .ok_or_else(|| ApiError::NotFound {
            code: "DOMAIN_NOT_FOUND",
            message: format!("domain '{name}' is not monitored"),
        })?;

    Ok(Json(DomainDetail {
        summary: summary(&domain),
        consecutive_failures: domain.consecutive_failures,
        last_reported_status: domain.last_reported_status.map(|s| s.as_str()),
        in_flight: domain.in_flight,
    }))
}
