use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use domain::common::entity::{DomainName, VerdictStatus};
use domain::pipeline::entity::Verdict;
use domain::registry::engine::DomainRegistry;
use domain::registry::entity::MonitoredDomain;
use domain::schedule::entity::{CadencePolicy, apply_jitter};
use ports::secondary::callback_sink::CallbackSink;
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::state_store::StateStore;
use rand::Rng;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::check_runner::CheckRunner;
use crate::reconciler::Reconciler;
use crate::scheduler::{DomainExecutor, Scheduler};

/// Everything the monitor needs to know that isn't a port.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub instance_id: String,
    pub cadence: CadencePolicy,
    pub workers: usize,
    pub snapshot_interval: Duration,
    pub shutdown_grace: Duration,
}

/// Read-only view served by `/status`.
#[derive(Debug, Clone)]
pub struct MonitorStatus {
    pub instance_id: String,
    pub uptime_secs: u64,
    pub workers: usize,
    /// Workers currently executing a check.
    pub busy_workers: usize,
    pub domains_total: usize,
    pub domains_priority: usize,
    pub in_flight: usize,
    pub counts_by_verdict: BTreeMap<&'static str, usize>,
}

/// Cheap, cloneable view of the running monitor for the ops API.
#[derive(Clone)]
pub struct MonitorHandle {
    registry: Arc<RwLock<DomainRegistry>>,
    scheduler: Arc<Scheduler>,
    state_store: Arc<dyn StateStore>,
    refresh_tx: mpsc::Sender<()>,
    alive: Arc<AtomicBool>,
    started_at: Instant,
    instance_id: String,
    workers: usize,
}

impl MonitorHandle {
    /// `/health`: the monitor loops are running and state is writable.
    pub async fn is_healthy(&self) -> bool {
        self.alive.load(Ordering::Relaxed) && self.state_store.is_writable().await
    }

    pub async fn status(&self) -> MonitorStatus {
        let registry = self.registry.read().await;
        let counts = registry
            .counts_by_verdict()
            .into_iter()
            .map(|(status, count)| (status.as_str(), count))
            .collect();
        MonitorStatus {
            instance_id: self.instance_id.clone(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            workers: self.workers,
            busy_workers: self.scheduler.busy_workers(),
            domains_total: registry.len(),
            domains_priority: registry.priority_count(),
            in_flight: registry.in_flight_count(),
            counts_by_verdict: counts,
        }
    }

    pub async fn domains(&self) -> Vec<MonitoredDomain> {
        self.registry.read().await.snapshot()
    }

    pub async fn domain(&self, name: &DomainName) -> Option<MonitoredDomain> {
        self.registry.read().await.get(name).cloned()
    }

    /// Queue a manual refresh. Returns false when one is already pending.
    pub fn trigger_refresh(&self) -> bool {
        self.refresh_tx.try_send(()).is_ok()
    }
}

/// Top-level orchestrator: owns the registry, the scheduler, the
/// reconciler, the snapshot loop, and the verdict-handling policy.
pub struct DomainMonitor {
    settings: MonitorSettings,
    registry: Arc<RwLock<DomainRegistry>>,
    scheduler: Arc<Scheduler>,
    reconciler: Reconciler,
    executor: Arc<CheckExecutor>,
    state_store: Arc<dyn StateStore>,
    metrics: Arc<dyn MetricsPort>,
    alive: Arc<AtomicBool>,
    refresh_rx: mpsc::Receiver<()>,
}

impl DomainMonitor {
    pub fn new(
        settings: MonitorSettings,
        runner: CheckRunner,
        sink: Arc<dyn CallbackSink>,
        list_source: Arc<dyn ports::secondary::list_source::DomainListSource>,
        state_store: Arc<dyn StateStore>,
        metrics: Arc<dyn MetricsPort>,
        refresh_interval: Duration,
    ) -> (Self, MonitorHandle) {
        let registry = Arc::new(RwLock::new(DomainRegistry::new()));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&registry),
            Arc::clone(&metrics),
            settings.workers,
            settings.workers * 8,
        ));
        let reconciler = Reconciler::new(
            list_source,
            Arc::clone(&registry),
            Arc::clone(&scheduler),
            Arc::clone(&metrics),
            refresh_interval,
        );
        let executor = Arc::new(CheckExecutor {
            registry: Arc::clone(&registry),
            scheduler: Arc::clone(&scheduler),
            runner,
            sink,
            metrics: Arc::clone(&metrics),
            cadence: settings.cadence,
        });

        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let alive = Arc::new(AtomicBool::new(false));

        let handle = MonitorHandle {
            registry: Arc::clone(&registry),
            scheduler: Arc::clone(&scheduler),
            state_store: Arc::clone(&state_store),
            refresh_tx,
            alive: Arc::clone(&alive),
            started_at: Instant::now(),
            instance_id: settings.instance_id.clone(),
            workers: settings.workers,
        };

        let monitor = Self {
            settings,
            registry,
            scheduler,
            reconciler,
            executor,
            state_store,
            metrics,
            alive,
            refresh_rx,
        };
        (monitor, handle)
    }

    /// Run until `token` is cancelled: load state, prime the list, spawn
    /// the loops, then drain and snapshot on the way out.
    pub async fn run(self, token: CancellationToken) {
        let Self {
            settings,
            registry,
            scheduler,
            reconciler,
            executor,
            state_store,
            metrics,
            alive,
            refresh_rx,
        } = self;

        // ── 1. Restore persisted state ───────────────────────────────
        match state_store.load().await {
            Ok(loaded) => {
                let count = loaded.len();
                registry.write().await.load(loaded);
                info!(domains = count, "restored state snapshot");
            }
            Err(e) => {
                error!(error = %e, "state load failed, starting with empty registry");
            }
        }
        {
            let registry = registry.read().await;
            metrics.set_domains_monitored(registry.len() as u64);
            metrics.set_domains_priority(registry.priority_count() as u64);
        }
        scheduler.rebuild_from_registry().await;

        // ── 2. Prime the domain list ─────────────────────────────────
        if let Err(e) = reconciler.refresh_once().await {
            warn!(error = %e, "initial domain list fetch failed, continuing with restored set");
        }

        // ── 3. Spawn the long-lived loops ────────────────────────────
        alive.store(true, Ordering::Relaxed);
        let loops = token.child_token();

        let mut worker_handles = Arc::clone(&scheduler).spawn(
            Arc::clone(&executor) as Arc<dyn DomainExecutor>,
            loops.clone(),
        );

        let reconcile_handle = {
            let loops = loops.clone();
            tokio::spawn(async move { reconciler.run(refresh_rx, loops).await })
        };

        let snapshot_handle = {
            let loops = loops.clone();
            let registry = Arc::clone(&registry);
            let store = Arc::clone(&state_store);
            let metrics = Arc::clone(&metrics);
            let interval = settings.snapshot_interval;
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = loops.cancelled() => break,
                        () = tokio::time::sleep(interval) => {
                            snapshot(&registry, store.as_ref(), metrics.as_ref()).await;
                        }
                    }
                }
            })
        };

        info!(
            instance_id = %settings.instance_id,
            workers = settings.workers,
            "domain monitor running"
        );

        // ── 4. Wait for shutdown ─────────────────────────────────────
        token.cancelled().await;
        info!("shutdown requested, draining in-flight checks");
        loops.cancel();

        // Dispatcher stops feeding; give workers the grace period to
        // drain, then cut them loose.
        let drain = async {
            for handle in &mut worker_handles {
                let _ = handle.await;
            }
            let _ = reconcile_handle.await;
            let _ = snapshot_handle.await;
        };
        if tokio::time::timeout(settings.shutdown_grace, drain)
            .await
            .is_err()
        {
            warn!(
                grace_secs = settings.shutdown_grace.as_secs(),
                "grace period expired with checks still in flight, aborting"
            );
            for handle in &worker_handles {
                handle.abort();
            }
        }

        // ── 5. Final snapshot ────────────────────────────────────────
        snapshot(&registry, state_store.as_ref(), metrics.as_ref()).await;
        alive.store(false, Ordering::Relaxed);
        info!("domain monitor stopped");
    }
}

/// Write one snapshot, logging and counting the outcome.
async fn snapshot(
    registry: &Arc<RwLock<DomainRegistry>>,
    store: &dyn StateStore,
    metrics: &dyn MetricsPort,
) {
    let domains = registry.read().await.snapshot();
    match store.save(&domains).await {
        Ok(()) => {
            metrics.record_snapshot("success");
            debug!(domains = domains.len(), "state snapshot written");
        }
        Err(e) => {
            metrics.record_snapshot("failure");
            error!(error = %e, "state snapshot failed");
        }
    }
}

/// Per-domain check execution and verdict handling.
///
/// This is the single writer for verdict-driven registry mutation: timing,
/// failure streaks, escalation flags, reschedules, and the availability
/// dedup keyed on `last_reported_status`.
struct CheckExecutor {
    registry: Arc<RwLock<DomainRegistry>>,
    scheduler: Arc<Scheduler>,
    runner: CheckRunner,
    sink: Arc<dyn CallbackSink>,
    metrics: Arc<dyn MetricsPort>,
    cadence: CadencePolicy,
}

impl DomainExecutor for CheckExecutor {
    fn execute<'a>(
        &'a self,
        domain: DomainName,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(self.process(domain))
    }
}

impl CheckExecutor {
    async fn process(&self, name: DomainName) {
        let Some((prior, deep_check)) = ({
            let registry = self.registry.read().await;
            registry
                .get(&name)
                .map(|d| (d.last_verdict, d.deep_check))
        }) else {
            // Removed between dispatch and pickup; nothing to do.
            self.metrics.record_dispatch_skipped("removed");
            return;
        };

        let verdict = self.runner.run(&name, prior, deep_check).await;
        debug_assert!(verdict.satisfies_confirmation_invariant());
        self.metrics.record_verdict(verdict.status.as_str());

        let disposition = self.settle(&name, &verdict).await;
        match disposition {
            Disposition::Discarded => {
                // Removal was deferred to completion; the trailing check's
                // results are not posted anywhere.
                self.metrics.record_dispatch_skipped("removed");
            }
            Disposition::Settled { report } => {
                self.post_callbacks(&name, &verdict, report).await;
            }
        }

        let registry = self.registry.read().await;
        for (status, count) in registry.counts_by_verdict() {
            self.metrics
                .set_domains_by_verdict(status.as_str(), count as u64);
        }
        self.metrics
            .set_in_flight(registry.in_flight_count() as u64);
    }

    /// Apply the verdict to the registry and compute the reschedule.
    async fn settle(&self, name: &DomainName, verdict: &Verdict) -> Disposition {
        let mut registry = self.registry.write().await;

        if registry.complete_in_flight(name) {
            return Disposition::Discarded;
        }
        let Some(domain) = registry.get_mut(name) else {
            return Disposition::Discarded;
        };

        let now = Utc::now();
        domain.last_checked_at = Some(now);
        domain.last_verdict = verdict.status;
        domain.last_confidence = verdict.confidence;
        if verdict.status == VerdictStatus::Unknown {
            domain.consecutive_failures += 1;
        } else {
            domain.consecutive_failures = 0;
        }
        // A likely-available domain escalates to a full-depth check next
        // cycle so WHOIS can confirm.
        domain.deep_check = verdict.status == VerdictStatus::LikelyAvailable;

        let delay = self.cadence.next_delay(
            verdict.status,
            domain.priority,
            domain.consecutive_failures,
        );
        let jittered = apply_jitter(delay, rand::rng().random_range(0.9..=1.1));
        domain.next_check_at =
            now + chrono::Duration::from_std(jittered).unwrap_or_else(|_| {
                chrono::Duration::seconds(self.cadence.t_cap.as_secs() as i64)
            });
        self.scheduler
            .schedule(name.clone(), domain.next_check_at, domain.priority);

        debug!(
            domain = %name,
            status = %verdict.status,
            confidence = verdict.confidence,
            failures = domain.consecutive_failures,
            next_check_in_secs = jittered.as_secs(),
            "check settled"
        );

        let report = verdict.status.is_available_variant()
            && domain.last_reported_status != Some(verdict.status);
        Disposition::Settled { report }
    }

    /// Post per-check events, then (if the status transitioned into an
    /// available variant) the availability event. A failed availability
    /// post leaves `last_reported_status` untouched, so it is re-attempted
    /// after the next check's per-check emissions.
    async fn post_callbacks(&self, name: &DomainName, verdict: &Verdict, report: bool) {
        for result in &verdict.contributing {
            if let Err(e) = self.sink.post_check(name, result).await {
                warn!(domain = %name, kind = result.kind.as_str(), error = %e, "per-check callback failed");
            }
        }

        if !report {
            return;
        }
        match self.sink.post_availability(name, verdict).await {
            Ok(()) => {
                self.metrics.record_availability_event();
                let mut registry = self.registry.write().await;
                if let Some(domain) = registry.get_mut(name) {
                    domain.last_reported_status = Some(verdict.status);
                }
                info!(
                    domain = %name,
                    status = %verdict.status,
                    confidence = verdict.confidence,
                    "availability reported"
                );
            }
            Err(e) => {
                warn!(domain = %name, error = %e, "availability callback failed, will retry next cycle");
            }
        }
    }
}

enum Disposition {
    /// Registry updated; `report` says an availability event is due.
    Settled { report: bool },
    /// Domain was removed while in flight; drop everything.
    Discarded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::probe::entity::{CheckOutcome, CheckResult, CheckerKind};
    use domain::ratelimit::entity::BucketConfig;
    use domain::registry::entity::DomainEntry;
    use ports::secondary::checker::Checker;
    use ports::secondary::list_source::DomainListSource;
    use ports::test_utils::NoopMetrics;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use crate::ratelimit_gate::RateLimiter;

    // ── Mock ports ───────────────────────────────────────────────────

    /// Checker that always answers with one outcome.
    struct FixedChecker {
        kind: CheckerKind,
        outcome: CheckOutcome,
    }

    impl Checker for FixedChecker {
        fn kind(&self) -> CheckerKind {
            self.kind
        }

        fn check<'a>(
            &'a self,
            _domain: &'a DomainName,
            _budget: Duration,
        ) -> Pin<Box<dyn Future<Output = CheckResult> + Send + 'a>> {
            Box::pin(async { CheckResult::new(self.kind, self.outcome, Utc::now()) })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        checks: Mutex<Vec<(DomainName, CheckerKind)>>,
        availability: Mutex<Vec<(DomainName, VerdictStatus)>>,
        fail_availability: std::sync::atomic::AtomicBool,
    }

    impl CallbackSink for RecordingSink {
        fn post_check<'a>(
            &'a self,
            domain: &'a DomainName,
            result: &'a CheckResult,
        ) -> Pin<Box<dyn Future<Output = Result<(), domain::common::error::MonitorError>> + Send + 'a>>
        {
            Box::pin(async move {
                self.checks.lock().unwrap().push((domain.clone(), result.kind));
                Ok(())
            })
        }

        fn post_availability<'a>(
            &'a self,
            domain: &'a DomainName,
            verdict: &'a Verdict,
        ) -> Pin<Box<dyn Future<Output = Result<(), domain::common::error::MonitorError>> + Send + 'a>>
        {
            Box::pin(async move {
                if self.fail_availability.load(Ordering::Relaxed) {
                    return Err(domain::common::error::MonitorError::Network(
                        "callback down".to_string(),
                    ));
                }
                self.availability
                    .lock()
                    .unwrap()
                    .push((domain.clone(), verdict.status));
                Ok(())
            })
        }
    }

    struct StaticSource(Vec<DomainEntry>);

    impl DomainListSource for StaticSource {
        fn fetch<'a>(
            &'a self,
        ) -> Pin<
            Box<
                dyn Future<
                        Output = Result<Vec<DomainEntry>, domain::common::error::MonitorError>,
                    > + Send
                    + 'a,
            >,
        > {
            let entries = self.0.clone();
            Box::pin(async move { Ok(entries) })
        }
    }

    /// In-memory state store shared across "restarts".
    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Vec<MonitoredDomain>>,
    }

    impl StateStore for MemoryStore {
        fn load<'a>(
            &'a self,
        ) -> Pin<
            Box<
                dyn Future<
                        Output = Result<Vec<MonitoredDomain>, domain::common::error::MonitorError>,
                    > + Send
                    + 'a,
            >,
        > {
            Box::pin(async { Ok(self.saved.lock().unwrap().clone()) })
        }

        fn save<'a>(
            &'a self,
            domains: &'a [MonitoredDomain],
        ) -> Pin<Box<dyn Future<Output = Result<(), domain::common::error::MonitorError>> + Send + 'a>>
        {
            Box::pin(async move {
                *self.saved.lock().unwrap() = domains.to_vec();
                Ok(())
            })
        }

        fn is_writable<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
            Box::pin(async { true })
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn name(s: &str) -> DomainName {
        DomainName::parse(s).unwrap()
    }

    fn cadence() -> CadencePolicy {
        CadencePolicy {
            t_low: Duration::from_secs(3600),
            t_high: Duration::from_secs(300),
            t_confirmed: Duration::from_secs(14_400),
            t_cap: Duration::from_secs(86_400),
        }
    }

    fn runner(outcomes: [CheckOutcome; 4]) -> CheckRunner {
        let [dns, http, rdap, whois] = outcomes;
        let checkers: Vec<Arc<dyn Checker>> = vec![
            Arc::new(FixedChecker {
                kind: CheckerKind::Dns,
                outcome: dns,
            }),
            Arc::new(FixedChecker {
                kind: CheckerKind::Http,
                outcome: http,
            }),
            Arc::new(FixedChecker {
                kind: CheckerKind::Rdap,
                outcome: rdap,
            }),
            Arc::new(FixedChecker {
                kind: CheckerKind::Whois,
                outcome: whois,
            }),
        ];
        let classes = CheckerKind::ALL.map(|k| {
            (
                k.as_str().to_string(),
                BucketConfig {
                    rate_per_sec: 1000.0,
                    capacity: 1000.0,
                },
            )
        });
        CheckRunner::new(
            checkers,
            Arc::new(RateLimiter::new(classes, Arc::new(NoopMetrics))),
            Arc::new(NoopMetrics),
            Duration::from_secs(5),
        )
    }

    struct Fixture {
        executor: Arc<CheckExecutor>,
        registry: Arc<RwLock<DomainRegistry>>,
        sink: Arc<RecordingSink>,
    }

    async fn fixture(outcomes: [CheckOutcome; 4], domains: &[(&str, bool)]) -> Fixture {
        let registry = Arc::new(RwLock::new(DomainRegistry::new()));
        {
            let entries: Vec<DomainEntry> = domains
                .iter()
                .map(|(n, p)| DomainEntry {
                    name: name(n),
                    priority: *p,
                })
                .collect();
            registry
                .write()
                .await
                .reconcile(&entries, Utc::now(), || chrono::Duration::zero());
        }
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&registry),
            Arc::new(NoopMetrics),
            1,
            16,
        ));
        let sink = Arc::new(RecordingSink::default());
        let executor = Arc::new(CheckExecutor {
            registry: Arc::clone(&registry),
            scheduler,
            runner: runner(outcomes),
            sink: Arc::clone(&sink) as Arc<dyn CallbackSink>,
            metrics: Arc::new(NoopMetrics),
            cadence: cadence(),
        });
        Fixture {
            executor,
            registry,
            sink,
        }
    }

    const CONFIRMING: [CheckOutcome; 4] = [
        CheckOutcome::Unregistered,
        CheckOutcome::Inconclusive,
        CheckOutcome::Unregistered,
        CheckOutcome::Unregistered,
    ];

    const ALL_INCONCLUSIVE: [CheckOutcome; 4] = [CheckOutcome::Inconclusive; 4];

    async fn claim_and_run(fixture: &Fixture, domain: &str) {
        fixture
            .registry
            .write()
            .await
            .mark_in_flight(&name(domain))
            .unwrap();
        fixture.executor.execute(name(domain)).await;
    }

    // ── Scenarios ────────────────────────────────────────────────────

    #[tokio::test]
    async fn confirmed_availability_fires_one_event() {
        // S1: full descent confirms; exactly one availability callback.
        let fixture = fixture(CONFIRMING, &[("a.com", false)]).await;
        claim_and_run(&fixture, "a.com").await;

        let availability = fixture.sink.availability.lock().unwrap().clone();
        assert_eq!(
            availability,
            vec![(name("a.com"), VerdictStatus::ConfirmedAvailable)]
        );
        // Per-check events for all four oracles.
        assert_eq!(fixture.sink.checks.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn duplicate_availability_is_suppressed() {
        // S6: second confirming check must not re-fire the event.
        let fixture = fixture(CONFIRMING, &[("a.com", false)]).await;
        claim_and_run(&fixture, "a.com").await;
        claim_and_run(&fixture, "a.com").await;

        assert_eq!(
            fixture.sink.availability.lock().unwrap().len(),
            1,
            "last_reported_status must suppress the duplicate"
        );
    }

    #[tokio::test]
    async fn restored_reported_status_suppresses_on_boot() {
        // S6 across a restart: snapshot, reload, re-check, no re-post.
        let fixture = fixture(CONFIRMING, &[("a.com", false)]).await;
        claim_and_run(&fixture, "a.com").await;

        let snapshot = fixture.registry.read().await.snapshot();
        let restored: Vec<MonitoredDomain> = serde_json::from_str(
            &serde_json::to_string(&snapshot).unwrap(),
        )
        .unwrap();

        let fixture2 = fixture2_with_state(CONFIRMING, restored).await;
        claim_and_run(&fixture2, "a.com").await;

        assert!(
            fixture2.sink.availability.lock().unwrap().is_empty(),
            "restored last_reported_status must suppress duplicate event"
        );
    }

    async fn fixture2_with_state(
        outcomes: [CheckOutcome; 4],
        state: Vec<MonitoredDomain>,
    ) -> Fixture {
        let fixture = self::fixture(outcomes, &[]).await;
        fixture.registry.write().await.load(state);
        fixture
    }

    #[tokio::test]
    async fn unknown_verdict_backs_off_exponentially() {
        // S4: every oracle inconclusive.
        let fixture = fixture(ALL_INCONCLUSIVE, &[("a.com", true)]).await;
        let before = Utc::now();
        claim_and_run(&fixture, "a.com").await;

        let registry = fixture.registry.read().await;
        let domain = registry.get(&name("a.com")).unwrap();
        assert_eq!(domain.last_verdict, VerdictStatus::Unknown);
        assert_eq!(domain.consecutive_failures, 1);
        assert!(fixture.sink.availability.lock().unwrap().is_empty());

        // Priority base 300s doubled once, ±10 % jitter.
        let delay = (domain.next_check_at - before).num_seconds();
        assert!((500..=700).contains(&delay), "delay was {delay}s");
    }

    #[tokio::test]
    async fn conclusive_verdict_resets_failure_streak() {
        let fixture = fixture(CONFIRMING, &[("a.com", false)]).await;
        fixture
            .registry
            .write()
            .await
            .get_mut(&name("a.com"))
            .unwrap()
            .consecutive_failures = 4;

        claim_and_run(&fixture, "a.com").await;

        let registry = fixture.registry.read().await;
        assert_eq!(
            registry.get(&name("a.com")).unwrap().consecutive_failures,
            0
        );
    }

    #[tokio::test]
    async fn removal_during_flight_discards_results() {
        // Property 6: deletion deferred, trailing check posts nothing.
        let fixture = fixture(CONFIRMING, &[("a.com", false)]).await;
        fixture
            .registry
            .write()
            .await
            .mark_in_flight(&name("a.com"))
            .unwrap();

        // List reconciliation drops the domain mid-flight.
        fixture
            .registry
            .write()
            .await
            .reconcile(&[DomainEntry { name: name("b.com"), priority: false }], Utc::now(), || {
                chrono::Duration::zero()
            });

        fixture.executor.execute(name("a.com")).await;

        assert!(fixture.sink.checks.lock().unwrap().is_empty());
        assert!(fixture.sink.availability.lock().unwrap().is_empty());
        assert!(fixture.registry.read().await.get(&name("a.com")).is_none());
    }

    #[tokio::test]
    async fn failed_availability_post_is_retried_next_cycle() {
        let fixture = fixture(CONFIRMING, &[("a.com", false)]).await;
        fixture.sink.fail_availability.store(true, Ordering::Relaxed);
        claim_and_run(&fixture, "a.com").await;
        assert!(fixture.sink.availability.lock().unwrap().is_empty());
        {
            let registry = fixture.registry.read().await;
            assert_eq!(
                registry.get(&name("a.com")).unwrap().last_reported_status,
                None,
                "failed post must not mark the status as reported"
            );
        }

        fixture.sink.fail_availability.store(false, Ordering::Relaxed);
        claim_and_run(&fixture, "a.com").await;
        assert_eq!(fixture.sink.availability.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn likely_available_escalates_to_deep_check() {
        // RDAP 404 without full agreement settles at layer 2...
        let outcomes = [
            CheckOutcome::Inconclusive,
            CheckOutcome::Inconclusive,
            CheckOutcome::Unregistered,
            CheckOutcome::Unregistered,
        ];
        let fixture = fixture(outcomes, &[("a.com", false)]).await;
        claim_and_run(&fixture, "a.com").await;

        {
            let registry = fixture.registry.read().await;
            let domain = registry.get(&name("a.com")).unwrap();
            assert_eq!(domain.last_verdict, VerdictStatus::LikelyAvailable);
            assert!(domain.deep_check, "next cycle must go to WHOIS");
        }

        // ...and the escalated cycle reaches WHOIS and confirms.
        claim_and_run(&fixture, "a.com").await;
        let registry = fixture.registry.read().await;
        assert_eq!(
            registry.get(&name("a.com")).unwrap().last_verdict,
            VerdictStatus::ConfirmedAvailable
        );
    }

    // ── Full lifecycle smoke test ────────────────────────────────────

    #[tokio::test]
    async fn monitor_lifecycle_checks_and_snapshots() {
        let settings = MonitorSettings {
            instance_id: "test".to_string(),
            cadence: cadence(),
            workers: 2,
            snapshot_interval: Duration::from_secs(600),
            shutdown_grace: Duration::from_secs(5),
        };
        let sink = Arc::new(RecordingSink::default());
        let store = Arc::new(MemoryStore::default());
        let (monitor, handle) = DomainMonitor::new(
            settings,
            runner(CONFIRMING),
            Arc::clone(&sink) as Arc<dyn CallbackSink>,
            Arc::new(StaticSource(vec![DomainEntry {
                name: name("a.com"),
                priority: true,
            }])),
            Arc::clone(&store) as Arc<dyn StateStore>,
            Arc::new(NoopMetrics),
            Duration::from_secs(300),
        );

        let token = CancellationToken::new();
        let run = tokio::spawn(monitor.run(token.clone()));

        // Give the first (jittered ≤ 60s... so force) cycle a chance: the
        // initial fetch schedules a.com with up to a minute of jitter, so
        // trigger a manual refresh which reschedules to now + jitter — still
        // too slow for a unit test. Instead just verify liveness and state.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(handle.is_healthy().await);
        let status = handle.status().await;
        assert_eq!(status.domains_total, 1);
        assert_eq!(status.busy_workers, 0, "no check is due yet");
        assert!(handle.domain(&name("a.com")).await.is_some());

        token.cancel();
        run.await.unwrap();

        assert!(!handle.is_healthy().await);
        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1, "final snapshot must persist the registry");
        assert_eq!(saved[0].name, name("a.com"));
    }
}
