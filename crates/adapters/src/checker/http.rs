use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;
use domain::common::entity::DomainName;
use domain::common::error::MonitorError;
use domain::probe::entity::{CheckOutcome, CheckResult, CheckerKind};
use ports::secondary::checker::Checker;
use serde_json::json;

/// Per-request ceiling; the caller's budget can only shrink it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// What one scheme's HEAD attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SchemeAttempt {
    /// The server answered with any HTTP status.
    Answered(u16),
    /// Connect, TLS, resolution, or timeout failure.
    Failed(String),
}

/// Layer-1 HTTP oracle.
///
/// Sends a HEAD request to `https://<domain>/`, then `http://<domain>/`.
/// Any HTTP status at all proves a listening server, hence registration.
/// Redirects are never followed: a parking 3xx must count as the probed
/// domain answering, not as wherever it points. HTTP can never prove
/// *non*-registration, so the negative outcome is always inconclusive.
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("domainwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MonitorError::Fatal(format!("HTTP client init failed: {e}")))?;
        Ok(Self { client })
    }

    /// Use a caller-built client (tests, custom TLS setup).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn probe(&self, domain: &DomainName, budget: Duration) -> CheckResult {
        let started_at = Utc::now();
        let mut attempts = Vec::with_capacity(2);

        for scheme in ["https", "http"] {
            let url = format!("{scheme}://{domain}/");
            let per_request = budget.min(REQUEST_TIMEOUT);
            let attempt =
                match tokio::time::timeout(per_request, self.client.head(&url).send()).await {
                    Ok(Ok(response)) => SchemeAttempt::Answered(response.status().as_u16()),
                    Ok(Err(e)) => SchemeAttempt::Failed(e.to_string()),
                    Err(_) => SchemeAttempt::Failed("timeout".to_string()),
                };
            let answered = matches!(attempt, SchemeAttempt::Answered(_));
            attempts.push((scheme, attempt));
            if answered {
                break;
            }
        }

        let (outcome, details) = fuse_attempts(&attempts);
        let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
        CheckResult::new(CheckerKind::Http, outcome, started_at)
            .with_details(details)
            .with_duration_ms(duration_ms)
    }
}

impl Checker for HttpChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Http
    }

    fn check<'a>(
        &'a self,
        domain: &'a DomainName,
        budget: Duration,
    ) -> Pin<Box<dyn Future<Output = CheckResult> + Send + 'a>> {
        Box::pin(self.probe(domain, budget))
    }
}

/// Pure fusion of the per-scheme attempts into an outcome.
///
/// Any answered status wins. When every scheme failed to connect, that can
/// mean an unregistered domain or just no web server; DNS is the authority
/// there, so the outcome stays inconclusive.
fn fuse_attempts(attempts: &[(&str, SchemeAttempt)]) -> (CheckOutcome, serde_json::Value) {
    let mut responses = serde_json::Map::new();
    let mut answered = false;

    for (scheme, attempt) in attempts {
        match attempt {
            SchemeAttempt::Answered(status) => {
                answered = true;
                responses.insert((*scheme).to_string(), json!({ "status": status }));
            }
            SchemeAttempt::Failed(error) => {
                responses.insert((*scheme).to_string(), json!({ "error": error }));
            }
        }
    }

    let outcome = if answered {
        CheckOutcome::Registered
    } else {
        CheckOutcome::Inconclusive
    };
    (outcome, json!({ "responses": responses }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(message: &str) -> SchemeAttempt {
        SchemeAttempt::Failed(message.to_string())
    }

    // ── Attempt fusion rules ─────────────────────────────────────────

    #[test]
    fn any_status_means_registered() {
        let (outcome, details) = fuse_attempts(&[("https", SchemeAttempt::Answered(200))]);
        assert_eq!(outcome, CheckOutcome::Registered);
        assert_eq!(details["responses"]["https"]["status"], 200);
    }

    #[test]
    fn error_statuses_still_prove_a_listener() {
        // 404 or 500 from the origin is a live server all the same.
        let (outcome, _) = fuse_attempts(&[("https", SchemeAttempt::Answered(404))]);
        assert_eq!(outcome, CheckOutcome::Registered);
        let (outcome, _) = fuse_attempts(&[("https", SchemeAttempt::Answered(500))]);
        assert_eq!(outcome, CheckOutcome::Registered);
    }

    #[test]
    fn http_fallback_after_https_failure_registers() {
        let (outcome, details) = fuse_attempts(&[
            ("https", failed("tls handshake failed")),
            ("http", SchemeAttempt::Answered(301)),
        ]);
        assert_eq!(outcome, CheckOutcome::Registered);
        assert_eq!(details["responses"]["https"]["error"], "tls handshake failed");
        assert_eq!(details["responses"]["http"]["status"], 301);
    }

    #[test]
    fn all_failures_are_inconclusive_never_unregistered() {
        let (outcome, details) = fuse_attempts(&[
            ("https", failed("connection refused")),
            ("http", failed("timeout")),
        ]);
        assert_eq!(outcome, CheckOutcome::Inconclusive);
        assert_eq!(details["responses"]["http"]["error"], "timeout");
    }

    #[test]
    fn dns_style_failure_is_inconclusive() {
        // Resolution failure looks like NXDOMAIN, but the DNS checker is
        // the authority on that; HTTP must not claim availability.
        let (outcome, _) = fuse_attempts(&[
            ("https", failed("error trying to connect: dns error")),
            ("http", failed("error trying to connect: dns error")),
        ]);
        assert_eq!(outcome, CheckOutcome::Inconclusive);
    }

    #[test]
    fn no_attempts_is_inconclusive() {
        let (outcome, _) = fuse_attempts(&[]);
        assert_eq!(outcome, CheckOutcome::Inconclusive);
    }

    // ── Checker surface ──────────────────────────────────────────────

    #[test]
    fn checker_reports_http_kind() {
        let checker = HttpChecker::new().unwrap();
        assert_eq!(checker.kind(), CheckerKind::Http);
    }

    #[test]
    fn checker_is_send_sync() {
        fn _assert<T: Send + Sync>() {}
        _assert::<HttpChecker>();
    }

    #[test]
    fn with_client_accepts_custom_client() {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        let checker = HttpChecker::with_client(client);
        assert_eq!(checker.kind(), CheckerKind::Http);
    }
}
