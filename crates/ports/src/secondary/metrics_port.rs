// Focused sub-traits for recording Prometheus metrics, grouped by concern.
//
// All methods take `&self` because the underlying implementation uses
// atomic operations (interior mutability via `prometheus-client`).
//
// Default implementations are no-ops, allowing test mocks to implement
// only the sub-traits relevant to the code under test.

// ── Oracle probe metrics ───────────────────────────────────────────

pub trait CheckMetrics: Send + Sync {
    /// Record one completed probe with checker kind and outcome labels.
    fn record_check(&self, _kind: &str, _outcome: &str) {}

    /// Observe a probe duration in seconds.
    fn observe_check_duration(&self, _kind: &str, _duration_seconds: f64) {}

    /// Record a rate-limiter deadline miss for a service class.
    fn record_rate_timeout(&self, _class: &str) {}
}

// ── Verdict metrics ────────────────────────────────────────────────

pub trait VerdictMetrics: Send + Sync {
    /// Record a pipeline verdict by status label.
    fn record_verdict(&self, _status: &str) {}

    /// Record an availability transition event (post-dedup).
    fn record_availability_event(&self) {}

    /// Set the number of monitored domains currently at a given verdict.
    fn set_domains_by_verdict(&self, _status: &str, _count: u64) {}
}

// ── Callback client metrics ────────────────────────────────────────

pub trait CallbackMetrics: Send + Sync {
    /// Record a callback POST attempt outcome: kind is `per_check` or
    /// `availability`; result is `success`, `dropped`, `auth`, `failure`.
    fn record_callback_post(&self, _kind: &str, _result: &str) {}

    /// Record one retry of a callback POST.
    fn record_callback_retry(&self, _kind: &str) {}

    /// Flag whether callback posting is paused after an auth rejection.
    fn set_callback_paused(&self, _paused: bool) {}
}

// ── Scheduler metrics ──────────────────────────────────────────────

pub trait ScheduleMetrics: Send + Sync {
    /// Record one dispatch of a due domain to a worker.
    fn record_dispatch(&self, _priority: bool) {}

    /// Set the current number of in-flight checks.
    fn set_in_flight(&self, _count: u64) {}

    /// Record a dispatch skipped with a reason (`in_flight`, `removed`).
    fn record_dispatch_skipped(&self, _reason: &str) {}
}

// ── List reconciliation metrics ────────────────────────────────────

pub trait ListMetrics: Send + Sync {
    /// Record a list fetch attempt (`success` / `failure` / `empty`).
    fn record_list_fetch(&self, _result: &str) {}

    fn record_domains_added(&self, _count: u64) {}

    fn record_domains_removed(&self, _count: u64) {}

    fn set_domains_monitored(&self, _count: u64) {}

    fn set_domains_priority(&self, _count: u64) {}
}

// ── State persistence metrics ──────────────────────────────────────

pub trait StateMetrics: Send + Sync {
    /// Record a snapshot attempt (`success` / `failure`).
    fn record_snapshot(&self, _result: &str) {}

    /// Record a corrupt state file quarantined at startup.
    fn record_state_corruption(&self) {}
}

// ── Umbrella trait ─────────────────────────────────────────────────

/// The full metrics surface, implemented by the real registry and (via the
/// blanket impl) by anything implementing every sub-trait.
pub trait MetricsPort:
    CheckMetrics + VerdictMetrics + CallbackMetrics + ScheduleMetrics + ListMetrics + StateMetrics
{
}

impl<T> MetricsPort for T where
    T: CheckMetrics
        + VerdictMetrics
        + CallbackMetrics
        + ScheduleMetrics
        + ListMetrics
        + StateMetrics
{
}
