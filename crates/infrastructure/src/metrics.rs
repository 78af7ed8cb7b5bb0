use ports::secondary::metrics_port::{
    CallbackMetrics, CheckMetrics, ListMetrics, ScheduleMetrics, StateMetrics, VerdictMetrics,
};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets_range};
use prometheus_client::registry::Registry;

// ── Label types ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CheckLabels {
    pub kind: String,
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct KindLabels {
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ClassLabels {
    pub class: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StatusLabels {
    pub status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PostLabels {
    pub kind: String,
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TierLabels {
    pub tier: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReasonLabels {
    pub reason: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResultLabels {
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ChangeLabels {
    pub change: String,
}

// ── Monitor metrics registry ────────────────────────────────────────

/// Prometheus metrics registry for the monitor.
///
/// All metric families use interior mutability (atomics), so recording
/// metrics only requires `&self`. The registry itself is NOT Clone —
/// wrap in `Arc` for multi-task sharing.
///
/// Every counter is a labelled family so `/metrics/reset` can zero the
/// whole surface via `Family::clear`.
pub struct MonitorMetrics {
    registry: Registry,
    pub checks_total: Family<CheckLabels, Counter>,
    pub check_duration_seconds: Family<KindLabels, Histogram>,
    pub rate_timeouts_total: Family<ClassLabels, Counter>,
    pub verdicts_total: Family<StatusLabels, Counter>,
    pub availability_events_total: Family<StatusLabels, Counter>,
    pub callback_posts_total: Family<PostLabels, Counter>,
    pub callback_retries_total: Family<KindLabels, Counter>,
    pub callback_paused: Gauge,
    pub dispatches_total: Family<TierLabels, Counter>,
    pub dispatch_skipped_total: Family<ReasonLabels, Counter>,
    pub checks_in_flight: Gauge,
    pub list_fetches_total: Family<ResultLabels, Counter>,
    pub reconcile_changes_total: Family<ChangeLabels, Counter>,
    pub domains_monitored: Gauge,
    pub domains_priority: Gauge,
    pub domains_by_verdict: Family<StatusLabels, Gauge>,
    pub snapshots_total: Family<ResultLabels, Counter>,
}

impl MonitorMetrics {
    /// Create a new metrics registry with all metrics registered under
    /// the `domainwatch` prefix.
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("domainwatch");

        let checks_total = Family::<CheckLabels, Counter>::default();
        registry.register(
            "checks",
            "Completed oracle probes by checker kind and outcome",
            checks_total.clone(),
        );

        let check_duration_seconds = Family::<KindLabels, Histogram>::new_with_constructor(|| {
            // Exponential buckets from 1ms to 30s (12 buckets): DNS answers
            // in milliseconds, WHOIS can take tens of seconds.
            Histogram::new(exponential_buckets_range(0.001, 30.0, 12))
        });
        registry.register(
            "check_duration_seconds",
            "Oracle probe latency in seconds",
            check_duration_seconds.clone(),
        );

        let rate_timeouts_total = Family::<ClassLabels, Counter>::default();
        registry.register(
            "rate_timeouts",
            "Rate-limiter deadline misses by service class",
            rate_timeouts_total.clone(),
        );

        let verdicts_total = Family::<StatusLabels, Counter>::default();
        registry.register(
            "verdicts",
            "Pipeline verdicts by status",
            verdicts_total.clone(),
        );

        let availability_events_total = Family::<StatusLabels, Counter>::default();
        registry.register(
            "availability_events",
            "Availability transitions reported to the callback API",
            availability_events_total.clone(),
        );

        let callback_posts_total = Family::<PostLabels, Counter>::default();
        registry.register(
            "callback_posts",
            "Callback POST attempts by event kind and result",
            callback_posts_total.clone(),
        );

        let callback_retries_total = Family::<KindLabels, Counter>::default();
        registry.register(
            "callback_retries",
            "Callback POST retries by event kind",
            callback_retries_total.clone(),
        );

        let callback_paused = Gauge::default();
        registry.register(
            "callback_paused",
            "1 while callback posting is paused after an auth rejection",
            callback_paused.clone(),
        );

        let dispatches_total = Family::<TierLabels, Counter>::default();
        registry.register(
            "dispatches",
            "Due domains handed to workers by priority tier",
            dispatches_total.clone(),
        );

        let dispatch_skipped_total = Family::<ReasonLabels, Counter>::default();
        registry.register(
            "dispatch_skipped",
            "Dispatches skipped with a reason",
            dispatch_skipped_total.clone(),
        );

        let checks_in_flight = Gauge::default();
        registry.register(
            "checks_in_flight",
            "Domains currently being checked by a worker",
            checks_in_flight.clone(),
        );

        let list_fetches_total = Family::<ResultLabels, Counter>::default();
        registry.register(
            "list_fetches",
            "Domain list fetch attempts by result",
            list_fetches_total.clone(),
        );

        let reconcile_changes_total = Family::<ChangeLabels, Counter>::default();
        registry.register(
            "reconcile_changes",
            "Registry mutations applied by the reconciler",
            reconcile_changes_total.clone(),
        );

        let domains_monitored = Gauge::default();
        registry.register(
            "domains_monitored",
            "Current number of monitored domains",
            domains_monitored.clone(),
        );

        let domains_priority = Gauge::default();
        registry.register(
            "domains_priority",
            "Current number of priority domains",
            domains_priority.clone(),
        );

        let domains_by_verdict = Family::<StatusLabels, Gauge>::default();
        registry.register(
            "domains_by_verdict",
            "Monitored domains grouped by last verdict",
            domains_by_verdict.clone(),
        );

        let snapshots_total = Family::<ResultLabels, Counter>::default();
        registry.register(
            "snapshots",
            "State snapshot attempts by result",
            snapshots_total.clone(),
        );

        Self {
            registry,
            checks_total,
            check_duration_seconds,
            rate_timeouts_total,
            verdicts_total,
            availability_events_total,
            callback_posts_total,
            callback_retries_total,
            callback_paused,
            dispatches_total,
            dispatch_skipped_total,
            checks_in_flight,
            list_fetches_total,
            reconcile_changes_total,
            domains_monitored,
            domains_priority,
            domains_by_verdict,
            snapshots_total,
        }
    }

    /// Encode all registered metrics to `OpenMetrics` text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("encoding metrics to string should not fail");
        buffer
    }

    /// Zero the whole surface: clear every counter family, reset gauges.
    /// Gauges repopulate on the next monitor tick.
    pub fn reset(&self) {
        self.checks_total.clear();
        self.check_duration_seconds.clear();
        self.rate_timeouts_total.clear();
        self.verdicts_total.clear();
        self.availability_events_total.clear();
        self.callback_posts_total.clear();
        self.callback_retries_total.clear();
        self.dispatches_total.clear();
        self.dispatch_skipped_total.clear();
        self.list_fetches_total.clear();
        self.reconcile_changes_total.clear();
        self.snapshots_total.clear();
        self.domains_by_verdict.clear();
        self.callback_paused.set(0);
        self.checks_in_flight.set(0);
        self.domains_monitored.set(0);
        self.domains_priority.set(0);
    }
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ── Sub-trait implementations ──────────────────────────────────────

impl CheckMetrics for MonitorMetrics {
    fn record_check(&self, kind: &str, outcome: &str) {
        self.checks_total
            .get_or_create(&CheckLabels {
                kind: kind.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    fn observe_check_duration(&self, kind: &str, duration_seconds: f64) {
        self.check_duration_seconds
            .get_or_create(&KindLabels {
                kind: kind.to_string(),
            })
            .observe(duration_seconds);
    }

    fn record_rate_timeout(&self, class: &str) {
        self.rate_timeouts_total
            .get_or_create(&ClassLabels {
                class: class.to_string(),
            })
            .inc();
    }
}

impl VerdictMetrics for MonitorMetrics {
    fn record_verdict(&self, status: &str) {
        self.verdicts_total
            .get_or_create(&StatusLabels {
                status: status.to_string(),
            })
            .inc();
    }

    fn record_availability_event(&self) {
        self.availability_events_total
            .get_or_create(&StatusLabels {
                status: "available".to_string(),
            })
            .inc();
    }

    fn set_domains_by_verdict(&self, status: &str, count: u64) {
        self.domains_by_verdict
            .get_or_create(&StatusLabels {
                status: status.to_string(),
            })
            .set(count.try_into().unwrap_or(i64::MAX));
    }
}

impl CallbackMetrics for MonitorMetrics {
    fn record_callback_post(&self, kind: &str, result: &str) {
        self.callback_posts_total
            .get_or_create(&PostLabels {
                kind: kind.to_string(),
                result: result.to_string(),
            })
            .inc();
    }

    fn record_callback_retry(&self, kind: &str) {
        self.callback_retries_total
            .get_or_create(&KindLabels {
                kind: kind.to_string(),
            })
            .inc();
    }

    fn set_callback_paused(&self, paused: bool) {
        self.callback_paused.set(i64::from(paused));
    }
}

impl ScheduleMetrics for MonitorMetrics {
    fn record_dispatch(&self, priority: bool) {
        self.dispatches_total
            .get_or_create(&TierLabels {
                tier: if priority { "priority" } else { "normal" }.to_string(),
            })
            .inc();
    }

    fn set_in_flight(&self, count: u64) {
        self.checks_in_flight
            .set(count.try_into().unwrap_or(i64::MAX));
    }

    fn record_dispatch_skipped(&self, reason: &str) {
        self.dispatch_skipped_total
            .get_or_create(&ReasonLabels {
                reason: reason.to_string(),
            })
            .inc();
    }
}

impl ListMetrics for MonitorMetrics {
    fn record_list_fetch(&self, result: &str) {
        self.list_fetches_total
            .get_or_create(&ResultLabels {
                result: result.to_string(),
            })
            .inc();
    }

    fn record_domains_added(&self, count: u64) {
        self.reconcile_changes_total
            .get_or_create(&ChangeLabels {
                change: "added".to_string(),
            })
            .inc_by(count);
    }

    fn record_domains_removed(&self, count: u64) {
        self.reconcile_changes_total
            .get_or_create(&ChangeLabels {
                change: "removed".to_string(),
            })
            .inc_by(count);
    }

    fn set_domains_monitored(&self, count: u64) {
        self.domains_monitored
            .set(count.try_into().unwrap_or(i64::MAX));
    }

    fn set_domains_priority(&self, count: u64) {
        self.domains_priority
            .set(count.try_into().unwrap_or(i64::MAX));
    }
}

impl StateMetrics for MonitorMetrics {
    fn record_snapshot(&self, result: &str) {
        self.snapshots_total
            .get_or_create(&ResultLabels {
                result: result.to_string(),
            })
            .inc();
    }

    fn record_state_corruption(&self) {
        self.snapshots_total
            .get_or_create(&ResultLabels {
                result: "corrupt_quarantined".to_string(),
            })
            .inc();
    }
}

// MetricsPort is automatically implemented via the blanket impl
// since MonitorMetrics implements all sub-traits.

#[cfg(test)]
mod tests {
    use super::*;
    use ports::secondary::metrics_port::MetricsPort;

    #[test]
    fn new_creates_valid_registry() {
        let metrics = MonitorMetrics::new();
        let encoded = metrics.encode();
        assert!(encoded.contains("# EOF"));
    }

    #[test]
    fn check_counter_appears_in_output() {
        let metrics = MonitorMetrics::new();
        metrics.record_check("dns", "registered");
        metrics.record_check("dns", "unregistered");
        metrics.record_check("whois", "unregistered");

        let encoded = metrics.encode();
        assert!(encoded.contains("domainwatch_checks"));
        assert!(encoded.contains("kind=\"dns\""));
        assert!(encoded.contains("outcome=\"unregistered\""));
    }

    #[test]
    fn duration_histogram_appears_in_output() {
        let metrics = MonitorMetrics::new();
        metrics.observe_check_duration("whois", 1.25);

        let encoded = metrics.encode();
        assert!(encoded.contains("domainwatch_check_duration_seconds"));
        assert!(encoded.contains("kind=\"whois\""));
    }

    #[test]
    fn gauges_track_registry_size() {
        let metrics = MonitorMetrics::new();
        metrics.set_domains_monitored(42);
        metrics.set_domains_priority(7);

        let encoded = metrics.encode();
        assert!(encoded.contains("domainwatch_domains_monitored 42"));
        assert!(encoded.contains("domainwatch_domains_priority 7"));
    }

    #[test]
    fn verdict_and_availability_counters() {
        let metrics = MonitorMetrics::new();
        metrics.record_verdict("confirmed_available");
        metrics.record_availability_event();

        let encoded = metrics.encode();
        assert!(encoded.contains("domainwatch_verdicts"));
        assert!(encoded.contains("status=\"confirmed_available\""));
        assert!(encoded.contains("domainwatch_availability_events"));
    }

    #[test]
    fn callback_paused_gauge_toggles() {
        let metrics = MonitorMetrics::new();
        metrics.set_callback_paused(true);
        assert!(metrics.encode().contains("domainwatch_callback_paused 1"));
        metrics.set_callback_paused(false);
        assert!(metrics.encode().contains("domainwatch_callback_paused 0"));
    }

    #[test]
    fn reset_clears_counters_and_gauges() {
        let metrics = MonitorMetrics::new();
        metrics.record_check("dns", "registered");
        metrics.record_dispatch(true);
        metrics.set_domains_monitored(10);
        metrics.record_snapshot("success");

        metrics.reset();

        let encoded = metrics.encode();
        assert!(!encoded.contains("kind=\"dns\""));
        assert!(!encoded.contains("tier=\"priority\""));
        assert!(!encoded.contains("result=\"success\""));
        assert!(encoded.contains("domainwatch_domains_monitored 0"));
    }

    #[test]
    fn metrics_port_trait_impl() {
        let metrics = MonitorMetrics::new();
        let port: &dyn MetricsPort = &metrics;
        port.record_check("dns", "registered");
        port.observe_check_duration("dns", 0.02);
        port.record_rate_timeout("whois");
        port.record_verdict("likely_taken");
        port.record_availability_event();
        port.set_domains_by_verdict("unknown", 3);
        port.record_callback_post("per_check", "success");
        port.record_callback_retry("availability");
        port.set_callback_paused(false);
        port.record_dispatch(false);
        port.set_in_flight(2);
        port.record_dispatch_skipped("in_flight");
        port.record_list_fetch("success");
        port.record_domains_added(3);
        port.record_domains_removed(1);
        port.set_domains_monitored(12);
        port.set_domains_priority(4);
        port.record_snapshot("success");
        port.record_state_corruption();
    }

    #[test]
    fn reconcile_changes_accumulate() {
        let metrics = MonitorMetrics::new();
        metrics.record_domains_added(3);
        metrics.record_domains_added(2);
        metrics.record_domains_removed(1);

        let encoded = metrics.encode();
        assert!(encoded.contains("change=\"added\""));
        assert!(encoded.contains("change=\"removed\""));
    }
}
