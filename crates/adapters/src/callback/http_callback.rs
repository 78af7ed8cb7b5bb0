use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use application::ratelimit_gate::RateLimiter;
use application::retry::{RetryConfig, retry_with_backoff};
use domain::common::entity::DomainName;
use domain::common::error::MonitorError;
use domain::pipeline::entity::Verdict;
use domain::probe::entity::CheckResult;
use ports::secondary::callback_sink::CallbackSink;
use ports::secondary::metrics_port::MetricsPort;
use serde_json::json;
use tracing::{error, warn};

/// Posts check results and availability events to the callback API.
///
/// Transient failures (network, 5xx, 429) retry with backoff, up to five
/// attempts total. Other 4xx responses drop the event and count it. A 401
/// or 403 pauses all posting until the next config reload — with
/// environment-sourced config that means a process restart — since
/// hammering a misconfigured endpoint only burns the budget.
pub struct HttpCallbackSink {
    client: reqwest::Client,
    check_url: String,
    availability_url: String,
    auth_token: String,
    retry: RetryConfig,
    paused: AtomicBool,
    limiter: Arc<RateLimiter>,
    metrics: Arc<dyn MetricsPort>,
}

impl HttpCallbackSink {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        check_url: String,
        availability_url: String,
        auth_token: String,
        timeout: Duration,
        max_attempts: usize,
        limiter: Arc<RateLimiter>,
        metrics: Arc<dyn MetricsPort>,
    ) -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("domainwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MonitorError::Fatal(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            client,
            check_url,
            availability_url,
            auth_token,
            retry: RetryConfig {
                max_retries: max_attempts.saturating_sub(1),
                backoff_schedule: vec![
                    Duration::from_secs(1),
                    Duration::from_secs(2),
                    Duration::from_secs(5),
                    Duration::from_secs(15),
                ],
                timeout,
            },
            paused: AtomicBool::new(false),
            limiter,
            metrics,
        })
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// One POST with the full retry/drop/pause policy applied.
    async fn post(
        &self,
        url: &str,
        kind: &'static str,
        payload: serde_json::Value,
    ) -> Result<(), MonitorError> {
        if self.is_paused() {
            self.metrics.record_callback_post(kind, "paused");
            return Err(MonitorError::Auth(
                "callback posting paused after auth rejection".to_string(),
            ));
        }

        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result = retry_with_backoff(&self.retry, || {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed);
            if attempt > 0 {
                self.metrics.record_callback_retry(kind);
            }
            let payload = payload.clone();
            async move { self.send_once(url, payload).await }
        })
        .await;

        match result {
            Ok(Delivery::Accepted) => {
                self.metrics.record_callback_post(kind, "success");
                Ok(())
            }
            Ok(Delivery::Dropped(status)) => {
                // Client error other than 429: retrying cannot help.
                warn!(kind, status, "callback rejected the event, dropping");
                self.metrics.record_callback_post(kind, "dropped");
                Ok(())
            }
            Err(e) => {
                if matches!(e, MonitorError::Auth(_)) {
                    error!(kind, error = %e, "callback auth rejected, pausing posts");
                    self.paused.store(true, Ordering::Relaxed);
                    self.metrics.set_callback_paused(true);
                    self.metrics.record_callback_post(kind, "auth");
                } else {
                    self.metrics.record_callback_post(kind, "failure");
                }
                Err(e)
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        payload: serde_json::Value,
    ) -> Result<Delivery, MonitorError> {
        self.limiter
            .acquire_one("callback", self.retry.timeout)
            .await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.auth_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MonitorError::Network(format!("callback POST failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(Delivery::Accepted);
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(MonitorError::Auth(format!("callback returned HTTP {status}")));
        }
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(MonitorError::RemoteFailure(format!(
                "callback returned HTTP {status}"
            )));
        }
        Ok(Delivery::Dropped(status.as_u16()))
    }
}

enum Delivery {
    Accepted,
    Dropped(u16),
}

impl CallbackSink for HttpCallbackSink {
    fn post_check<'a>(
        &'a self,
        domain: &'a DomainName,
        result: &'a CheckResult,
    ) -> Pin<Box<dyn Future<Output = Result<(), MonitorError>> + Send + 'a>> {
        Box::pin(async move {
            let payload = check_payload(domain, result);
            self.post(&self.check_url, "per_check", payload).await
        })
    }

    fn post_availability<'a>(
        &'a self,
        domain: &'a DomainName,
        verdict: &'a Verdict,
    ) -> Pin<Box<dyn Future<Output = Result<(), MonitorError>> + Send + 'a>> {
        Box::pin(async move {
            let payload = availability_payload(domain, verdict);
            self.post(&self.availability_url, "availability", payload)
                .await
        })
    }
}

/// Per-check event body. Timestamps are epoch seconds with millisecond
/// precision, matching what the callback consumer stores.
fn check_payload(domain: &DomainName, result: &CheckResult) -> serde_json::Value {
    let mut payload = json!({
        "domain": domain.as_str(),
        "check_type": result.kind.as_str(),
        "result": result.outcome.wire_value(),
        "timestamp": epoch_seconds(result.started_at),
        "details": result.details,
        "duration_ms": result.duration_ms,
    });
    if let Some(ref error) = result.error {
        payload["error"] = json!(error);
    }
    payload
}

/// Availability event body: the final status plus every contributing check.
fn availability_payload(domain: &DomainName, verdict: &Verdict) -> serde_json::Value {
    let checks: serde_json::Map<String, serde_json::Value> = verdict
        .contributing
        .iter()
        .map(|r| {
            (
                r.kind.as_str().to_string(),
                json!({
                    "result": r.outcome.wire_value(),
                    "details": r.details,
                    "duration_ms": r.duration_ms,
                }),
            )
        })
        .collect();

    json!({
        "domain": domain.as_str(),
        "status": "available",
        "confidence": verdict.confidence,
        "timestamp": epoch_seconds(chrono::Utc::now()),
        "checks": checks,
    })
}

fn epoch_seconds(at: chrono::DateTime<chrono::Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use domain::common::entity::VerdictStatus;
    use domain::probe::entity::{CheckOutcome, CheckerKind};
    use ports::test_utils::NoopMetrics;

    fn open_limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(
            [(
                "callback".to_string(),
                domain::ratelimit::entity::BucketConfig {
                    rate_per_sec: 1000.0,
                    capacity: 1000.0,
                },
            )],
            Arc::new(NoopMetrics),
        ))
    }

    fn sink_to(url: &str) -> HttpCallbackSink {
        let mut sink = HttpCallbackSink::new(
            url.to_string(),
            url.to_string(),
            "test-token-value".to_string(),
            Duration::from_millis(500),
            2,
            open_limiter(),
            Arc::new(NoopMetrics),
        )
        .unwrap();
        sink.retry.backoff_schedule = vec![Duration::from_millis(1)];
        sink
    }

    fn name() -> DomainName {
        DomainName::parse("example.com").unwrap()
    }

    fn whois_result() -> CheckResult {
        CheckResult::new(
            CheckerKind::Whois,
            CheckOutcome::Unregistered,
            Utc.timestamp_millis_opt(1_647_854_321_123).unwrap(),
        )
        .with_details(json!({"server": "whois.verisign-grs.com"}))
        .with_duration_ms(1250)
    }

    // ── Payload shape ────────────────────────────────────────────────

    #[test]
    fn check_payload_matches_wire_format() {
        let payload = check_payload(&name(), &whois_result());
        assert_eq!(payload["domain"], "example.com");
        assert_eq!(payload["check_type"], "whois");
        assert_eq!(payload["result"], "available");
        assert_eq!(payload["duration_ms"], 1250);
        assert!((payload["timestamp"].as_f64().unwrap() - 1_647_854_321.123).abs() < 1e-6);
        assert!(payload.get("error").is_none());
    }

    #[test]
    fn check_payload_carries_error_string() {
        let result = CheckResult::new(CheckerKind::Dns, CheckOutcome::Error, Utc::now())
            .with_error("resolver unreachable");
        let payload = check_payload(&name(), &result);
        assert_eq!(payload["result"], "error");
        assert_eq!(payload["error"], "resolver unreachable");
    }

    #[test]
    fn availability_payload_matches_wire_format() {
        let verdict = Verdict::new(
            VerdictStatus::ConfirmedAvailable,
            0.95,
            vec![whois_result()],
        );
        let payload = availability_payload(&name(), &verdict);
        assert_eq!(payload["domain"], "example.com");
        assert_eq!(payload["status"], "available");
        assert!((payload["confidence"].as_f64().unwrap() - 0.95).abs() < 1e-9);
        assert_eq!(payload["checks"]["whois"]["result"], "available");
        assert_eq!(payload["checks"]["whois"]["duration_ms"], 1250);
    }

    // ── Delivery policy ──────────────────────────────────────────────

    #[tokio::test]
    async fn unreachable_endpoint_fails_after_retries() {
        let sink = sink_to("http://127.0.0.1:1/checks");
        let err = sink
            .post_check(&name(), &whois_result())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "network");
        assert!(!sink.is_paused(), "network failure must not pause posting");
    }

    #[tokio::test]
    async fn paused_sink_rejects_without_sending() {
        let sink = sink_to("http://127.0.0.1:1/checks");
        sink.paused.store(true, Ordering::Relaxed);
        let err = sink
            .post_check(&name(), &whois_result())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "auth");
    }

    #[test]
    fn epoch_seconds_millisecond_precision() {
        let at = Utc.timestamp_millis_opt(1_647_854_321_123).unwrap();
        assert!((epoch_seconds(at) - 1_647_854_321.123).abs() < 1e-9);
    }
}
