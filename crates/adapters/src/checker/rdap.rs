use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use chrono::Utc;
use domain::common::entity::DomainName;
use domain::common::error::MonitorError;
use domain::probe::entity::{CheckOutcome, CheckResult, CheckerKind};
use ports::secondary::checker::Checker;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

/// IANA bootstrap registry mapping TLDs to RDAP service bases.
const IANA_BOOTSTRAP_URL: &str = "https://data.iana.org/rdap/dns.json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A cached TLD miss is trusted for this long before the bootstrap
/// registry is re-fetched. Bounds the refetch rate for genuinely unknown
/// TLDs while still picking up newly delegated RDAP services.
const BOOTSTRAP_MISS_TTL: Duration = Duration::from_secs(300);

/// TLD → service base URL, loaded lazily from the bootstrap registry.
#[derive(Debug, Default)]
struct BootstrapCache {
    services: Option<HashMap<String, String>>,
    fetched_at: Option<Instant>,
}

/// Layer-2 RDAP oracle.
///
/// Resolves the TLD's RDAP base via the IANA bootstrap registry (cached in
/// process, re-fetched on a stale miss), then queries
/// `GET <base>/domain/<name>`. RDAP's contract is crisp: 404 means the
/// registry has no such object, 200 returns the registration with
/// registrar and event dates.
pub struct RdapChecker {
    client: reqwest::Client,
    bootstrap_url: String,
    cache: RwLock<BootstrapCache>,
}

impl RdapChecker {
    pub fn new() -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("domainwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MonitorError::Fatal(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            client,
            bootstrap_url: IANA_BOOTSTRAP_URL.to_string(),
            cache: RwLock::new(BootstrapCache::default()),
        })
    }

    /// Point the bootstrap fetch somewhere else (tests, mirrors).
    #[must_use]
    pub fn with_bootstrap_url(mut self, url: impl Into<String>) -> Self {
        self.bootstrap_url = url.into();
        self
    }

    /// RDAP base for a TLD.
    ///
    /// The bootstrap registry is fetched on first use and re-fetched when a
    /// TLD misses against a cache older than [`BOOTSTRAP_MISS_TTL`]; a miss
    /// against a fresh cache is answered from the cache so unknown TLDs
    /// cannot trigger a refetch per probe.
    async fn service_base(&self, tld: &str) -> Result<Option<String>, MonitorError> {
        {
            let cache = self.cache.read().await;
            if let Some(ref map) = cache.services {
                if let Some(base) = map.get(tld) {
                    return Ok(Some(base.clone()));
                }
                if cache
                    .fetched_at
                    .is_some_and(|at| at.elapsed() < BOOTSTRAP_MISS_TTL)
                {
                    return Ok(None);
                }
            }
        }

        let map = self.fetch_bootstrap().await?;
        let base = map.get(tld).cloned();
        *self.cache.write().await = BootstrapCache {
            services: Some(map),
            fetched_at: Some(Instant::now()),
        };
        Ok(base)
    }

    async fn fetch_bootstrap(&self) -> Result<HashMap<String, String>, MonitorError> {
        let response = self
            .client
            .get(&self.bootstrap_url)
            .send()
            .await
            .map_err(|e| MonitorError::Network(format!("bootstrap fetch failed: {e}")))?;
        if !response.status().is_success() {
            return Err(MonitorError::RemoteFailure(format!(
                "bootstrap registry returned HTTP {}",
                response.status()
            )));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MonitorError::Protocol(format!("bootstrap parse failed: {e}")))?;

        let map = parse_bootstrap(&body)?;
        debug!(tlds = map.len(), "RDAP bootstrap registry loaded");
        Ok(map)
    }

    async fn probe(&self, domain: &DomainName, budget: Duration) -> CheckResult {
        let started_at = Utc::now();
        let finish = |outcome: CheckOutcome, details: serde_json::Value| {
            let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
            CheckResult::new(CheckerKind::Rdap, outcome, started_at)
                .with_details(details)
                .with_duration_ms(duration_ms)
        };

        let base = match tokio::time::timeout(budget, self.service_base(domain.tld())).await {
            Ok(Ok(Some(base))) => base,
            Ok(Ok(None)) => {
                return finish(
                    CheckOutcome::Inconclusive,
                    json!({ "reason": "no_rdap_service_for_tld", "tld": domain.tld() }),
                );
            }
            Ok(Err(e)) => {
                return finish(CheckOutcome::Inconclusive, json!({ "reason": e.to_string() }));
            }
            Err(_) => {
                return finish(CheckOutcome::Inconclusive, json!({ "reason": "timeout" }));
            }
        };

        let url = format!("{}domain/{}", ensure_trailing_slash(&base), domain);
        let response = match tokio::time::timeout(budget, self.client.get(&url).send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return finish(CheckOutcome::Inconclusive, json!({ "reason": e.to_string() }));
            }
            Err(_) => {
                return finish(CheckOutcome::Inconclusive, json!({ "reason": "timeout" }));
            }
        };

        let status = response.status();
        if status.as_u16() == 404 {
            return finish(CheckOutcome::Unregistered, json!({ "status": 404 }));
        }
        if status.as_u16() == 429 || status.is_server_error() {
            return finish(
                CheckOutcome::Inconclusive,
                json!({ "status": status.as_u16(), "reason": "retryable_upstream_status" }),
            );
        }
        if !status.is_success() {
            return finish(
                CheckOutcome::Error,
                json!({ "status": status.as_u16(), "reason": "unexpected_status" }),
            );
        }

        match tokio::time::timeout(budget, response.json::<serde_json::Value>()).await {
            Ok(Ok(body)) => {
                let mut details = extract_registration_details(&body);
                details["status"] = json!(200);
                finish(CheckOutcome::Registered, details)
            }
            Ok(Err(e)) => finish(
                CheckOutcome::Inconclusive,
                json!({ "reason": format!("body parse failed: {e}") }),
            ),
            Err(_) => finish(CheckOutcome::Inconclusive, json!({ "reason": "timeout" })),
        }
    }
}

impl Checker for RdapChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Rdap
    }

    fn check<'a>(
        &'a self,
        domain: &'a DomainName,
        budget: Duration,
    ) -> Pin<Box<dyn Future<Output = CheckResult> + Send + 'a>> {
        Box::pin(self.probe(domain, budget))
    }
}

fn ensure_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

/// Parse the IANA bootstrap document: `services` is an array of
/// `[[tld, ...], [base_url, ...]]` pairs.
fn parse_bootstrap(body: &serde_json::Value) -> Result<HashMap<String, String>, MonitorError> {
    let services = body
        .get("services")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| {
            MonitorError::Protocol("bootstrap document has no 'services' array".to_string())
        })?;

    let mut map = HashMap::new();
    for service in services {
        let Some(pair) = service.as_array() else { continue };
        let (Some(tlds), Some(urls)) = (
            pair.first().and_then(serde_json::Value::as_array),
            pair.get(1).and_then(serde_json::Value::as_array),
        ) else {
            continue;
        };
        // Prefer an https base when the registry lists several.
        let base = urls
            .iter()
            .filter_map(serde_json::Value::as_str)
            .find(|u| u.starts_with("https://"))
            .or_else(|| urls.iter().filter_map(serde_json::Value::as_str).next());
        let Some(base) = base else { continue };
        for tld in tlds.iter().filter_map(serde_json::Value::as_str) {
            map.insert(tld.to_ascii_lowercase(), base.to_string());
        }
    }
    Ok(map)
}

/// Pull registrar and lifecycle events out of an RDAP domain object.
fn extract_registration_details(body: &serde_json::Value) -> serde_json::Value {
    let mut details = serde_json::Map::new();

    if let Some(ldh) = body.get("ldhName").and_then(serde_json::Value::as_str) {
        details.insert("ldh_name".to_string(), json!(ldh.to_ascii_lowercase()));
    }

    // Registrar: the entity with the "registrar" role; its name sits in the
    // vcard "fn" entry.
    if let Some(entities) = body.get("entities").and_then(serde_json::Value::as_array) {
        for entity in entities {
            let is_registrar = entity
                .get("roles")
                .and_then(serde_json::Value::as_array)
                .is_some_and(|roles| roles.iter().any(|r| r.as_str() == Some("registrar")));
            if !is_registrar {
                continue;
            }
            if let Some(items) = entity
                .get("vcardArray")
                .and_then(|v| v.get(1))
                .and_then(serde_json::Value::as_array)
            {
                for item in items {
                    let entry = item.as_array();
                    if entry
                        .and_then(|e| e.first())
                        .and_then(serde_json::Value::as_str)
                        == Some("fn")
                    {
                        if let Some(name) =
                            entry.and_then(|e| e.get(3)).and_then(serde_json::Value::as_str)
                        {
                            details.insert("registrar".to_string(), json!(name));
                        }
                    }
                }
            }
        }
    }

    if let Some(events) = body.get("events").and_then(serde_json::Value::as_array) {
        for event in events {
            let (Some(action), Some(date)) = (
                event.get("eventAction").and_then(serde_json::Value::as_str),
                event.get("eventDate").and_then(serde_json::Value::as_str),
            ) else {
                continue;
            };
            match action {
                "registration" => {
                    details.insert("created".to_string(), json!(date));
                }
                "expiration" => {
                    details.insert("expires".to_string(), json!(date));
                }
                _ => {}
            }
        }
    }

    serde_json::Value::Object(details)
}
