use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use std::sync::Arc;

use application::ratelimit_gate::RateLimiter;
use domain::common::entity::DomainName;
use domain::common::error::MonitorError;
use domain::registry::entity::DomainEntry;
use ports::secondary::list_source::DomainListSource;
use serde::Deserialize;
use tracing::warn;

/// One entry as the list API serves it: either a full object or a bare
/// domain string (which defaults to non-priority).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Full {
        domain: String,
        #[serde(default)]
        priority: bool,
    },
    Bare(String),
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    domains: Vec<RawEntry>,
}

/// Fetches the monitored-domain list from the remote list API.
///
/// Entries that fail domain-name validation are skipped with a warning
/// (partial success); a failed fetch or unparseable body is an error and
/// leaves the registry untouched upstream.
pub struct HttpListSource {
    client: reqwest::Client,
    url: String,
    auth_token: String,
    timeout: Duration,
    limiter: Arc<RateLimiter>,
}

impl HttpListSource {
    pub fn new(
        url: String,
        auth_token: String,
        timeout: Duration,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("domainwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MonitorError::Fatal(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            client,
            url,
            auth_token,
            timeout,
            limiter,
        })
    }

    async fn do_fetch(&self) -> Result<Vec<DomainEntry>, MonitorError> {
        self.limiter.acquire_one("list_api", self.timeout).await?;
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.auth_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| MonitorError::Network(format!("list fetch failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(MonitorError::Auth(format!(
                "list API rejected credentials with HTTP {status}"
            )));
        }
        if !status.is_success() {
            return Err(MonitorError::RemoteFailure(format!(
                "list API returned HTTP {status}"
            )));
        }

        let body: ListResponse = response
            .json()
            .await
            .map_err(|e| MonitorError::Protocol(format!("list response parse failed: {e}")))?;

        Ok(parse_entries(body.domains))
    }
}

impl DomainListSource for HttpListSource {
    fn fetch<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DomainEntry>, MonitorError>> + Send + 'a>> {
        Box::pin(self.do_fetch())
    }
}

fn parse_entries(raw: Vec<RawEntry>) -> Vec<DomainEntry> {
    let mut entries = Vec::with_capacity(raw.len());
    for item in raw {
        let (raw_name, priority) = match item {
            RawEntry::Full { domain, priority } => (domain, priority),
            RawEntry::Bare(domain) => (domain, false),
        };
        match DomainName::parse(&raw_name) {
            Ok(name) => entries.push(DomainEntry { name, priority }),
            Err(e) => {
                warn!(raw = %raw_name, error = %e, "skipping invalid list entry");
            }
        }
    }
    entries
}
