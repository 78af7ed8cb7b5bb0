use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use domain::common::entity::{DomainName, VerdictStatus};
use domain::pipeline::engine::FusionEngine;
use domain::pipeline::entity::{LayerPlan, Verdict};
use domain::probe::entity::{CheckOutcome, CheckResult, CheckerKind};
use ports::secondary::checker::Checker;
use ports::secondary::metrics_port::MetricsPort;
use tracing::debug;

use crate::ratelimit_gate::RateLimiter;

/// Drives the layered pipeline for one domain at a time.
///
/// Layer 1 (DNS + HTTP) runs concurrently, deeper layers sequentially, the
/// whole descent bounded by one overall deadline. Rate-limit tokens are
/// acquired here, per checker kind, before each probe — the limiter is the
/// only admission point for outbound traffic.
pub struct CheckRunner {
    checkers: HashMap<CheckerKind, Arc<dyn Checker>>,
    limiter: Arc<RateLimiter>,
    metrics: Arc<dyn MetricsPort>,
    check_timeout: Duration,
}

impl CheckRunner {
    pub fn new(
        checkers: Vec<Arc<dyn Checker>>,
        limiter: Arc<RateLimiter>,
        metrics: Arc<dyn MetricsPort>,
        check_timeout: Duration,
    ) -> Self {
        let checkers = checkers.into_iter().map(|c| (c.kind(), c)).collect();
        Self {
            checkers,
            limiter,
            metrics,
            check_timeout,
        }
    }

    /// Run the full pipeline for `domain`.
    ///
    /// `prior` is the previous verdict (flip confirmation), `deep_check`
    /// forces the WHOIS layer. Never fails: exhausted deadlines and missing
    /// oracles degrade into inconclusive evidence.
    pub async fn run(
        &self,
        domain: &DomainName,
        prior: VerdictStatus,
        deep_check: bool,
    ) -> Verdict {
        let deadline = Instant::now() + self.check_timeout;
        let mut engine = FusionEngine::new(prior, deep_check);

        // Layer 1: DNS and HTTP in parallel.
        let (dns, http) = tokio::join!(
            self.probe(CheckerKind::Dns, domain, deadline),
            self.probe(CheckerKind::Http, domain, deadline),
        );
        if let LayerPlan::Stop(verdict) = engine.absorb_layer1(vec![dns, http]) {
            debug!(domain = %domain, status = %verdict.status, "short-circuit after layer 1");
            return verdict;
        }

        // Layer 2: RDAP.
        if Instant::now() >= deadline {
            return engine.conclude();
        }
        let rdap = self.probe(CheckerKind::Rdap, domain, deadline).await;
        if let LayerPlan::Stop(verdict) = engine.absorb_layer2(rdap) {
            debug!(domain = %domain, status = %verdict.status, "settled at layer 2");
            return verdict;
        }

        // Layer 3: WHOIS.
        if Instant::now() >= deadline {
            return engine.conclude();
        }
        let whois = self.probe(CheckerKind::Whois, domain, deadline).await;
        engine.absorb_layer3(whois)
    }

    /// One rate-limited probe. Limiter timeouts and missing checkers come
    /// back as `Error` results so the pipeline can weigh them like any
    /// other failed oracle.
    async fn probe(
        &self,
        kind: CheckerKind,
        domain: &DomainName,
        deadline: Instant,
    ) -> CheckResult {
        let started_at = Utc::now();

        let Some(checker) = self.checkers.get(&kind) else {
            return CheckResult::new(kind, CheckOutcome::Error, started_at)
                .with_error(format!("no {kind} checker wired"));
        };

        if let Err(e) = self.limiter.acquire(kind.as_str(), 1.0, deadline).await {
            self.metrics.record_check(kind.as_str(), "error");
            return CheckResult::new(kind, CheckOutcome::Error, started_at)
                .with_error(e.to_string());
        }

        let budget = deadline.saturating_duration_since(Instant::now());
        if budget.is_zero() {
            return CheckResult::new(kind, CheckOutcome::Inconclusive, started_at)
                .with_error("check deadline exhausted");
        }

        let start = Instant::now();
        let result = checker.check(domain, budget).await;
        let elapsed = start.elapsed();

        self.metrics
            .record_check(kind.as_str(), result.outcome.as_str());
        self.metrics
            .observe_check_duration(kind.as_str(), elapsed.as_secs_f64());
        result
    }
}
