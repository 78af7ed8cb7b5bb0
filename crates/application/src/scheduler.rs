use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use domain::common::entity::DomainName;
use domain::registry::engine::DomainRegistry;
use domain::schedule::engine::ScheduleQueue;
use ports::secondary::metrics_port::MetricsPort;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Scheduler wakes at least this often even with an empty queue, so list
/// changes and clock drift are picked up promptly.
const IDLE_TICK: Duration = Duration::from_secs(10);

/// Executes one dispatched domain check end to end (probe, verdict,
/// callbacks, reschedule). Implemented by the monitor.
pub trait DomainExecutor: Send + Sync {
    fn execute<'a>(
        &'a self,
        domain: DomainName,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Priority-aware dispatcher plus fixed worker pool.
///
/// The due queue is the domain-level [`ScheduleQueue`]; entries are
/// validated against the registry at pop time (exists, not in flight, not
/// pending removal, timestamp still current), which implements both lazy
/// invalidation and the per-domain single-dispatch guarantee. Workers pull
/// from one bounded channel; on shutdown the dispatcher stops feeding it
/// and workers drain what is left before exiting.
pub struct Scheduler {
    registry: Arc<RwLock<DomainRegistry>>,
    queue: Mutex<ScheduleQueue>,
    metrics: Arc<dyn MetricsPort>,
    workers: usize,
    channel_capacity: usize,
    /// Workers currently executing a check. Distinct from the registry's
    /// in-flight count: a domain is in flight from dispatch until
    /// completion, a worker is busy only while it holds one.
    busy_workers: AtomicUsize,
}

impl Scheduler {
    pub fn new(
        registry: Arc<RwLock<DomainRegistry>>,
        metrics: Arc<dyn MetricsPort>,
        workers: usize,
        channel_capacity: usize,
    ) -> Self {
        Self {
            registry,
            queue: Mutex::new(ScheduleQueue::new()),
            metrics,
            workers,
            channel_capacity,
            busy_workers: AtomicUsize::new(0),
        }
    }

    /// Workers currently executing a check.
    pub fn busy_workers(&self) -> usize {
        self.busy_workers.load(Ordering::Relaxed)
    }

    /// Queue (or re-queue) a domain. The registry's `next_check_at` is the
    /// source of truth; any older queue entry for the domain goes stale
    /// automatically.
    pub fn schedule(&self, name: DomainName, due_at: chrono::DateTime<chrono::Utc>, priority: bool) {
        self.queue
            .lock()
            .expect("schedule queue lock poisoned")
            .push(name, due_at, priority);
    }

    /// Push a fresh entry for every registry domain. Used after boot,
    /// reconciliation, and `/refresh`.
    pub async fn rebuild_from_registry(&self) {
        let registry = self.registry.read().await;
        let mut queue = self.queue.lock().expect("schedule queue lock poisoned");
        for domain in registry.iter() {
            if !domain.in_flight && !domain.pending_removal {
                queue.push(domain.name.clone(), domain.next_check_at, domain.priority);
            }
        }
    }

    /// Spawn the dispatcher and `workers` worker tasks.
    ///
    /// Cancelling `token` stops dispatching; workers finish draining the
    /// channel and exit. The caller bounds the drain with its grace period.
    pub fn spawn(
        self: Arc<Self>,
        executor: Arc<dyn DomainExecutor>,
        token: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let (tx, rx) = mpsc::channel::<DomainName>(self.channel_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let mut handles = Vec::with_capacity(self.workers + 1);
        handles.push(tokio::spawn(
            Arc::clone(&self).dispatch_loop(tx, token.clone()),
        ));

        for worker_id in 0..self.workers {
            let rx = Arc::clone(&rx);
            let executor = Arc::clone(&executor);
            let scheduler = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                loop {
                    let next = { rx.lock().await.recv().await };
                    match next {
                        Some(name) => {
                            debug!(worker_id, domain = %name, "worker picked up check");
                            scheduler.busy_workers.fetch_add(1, Ordering::Relaxed);
                            executor.execute(name).await;
                            scheduler.busy_workers.fetch_sub(1, Ordering::Relaxed);
                        }
                        None => break,
                    }
                }
                debug!(worker_id, "worker drained, exiting");
            }));
        }

        handles
    }

    async fn dispatch_loop(self: Arc<Self>, tx: mpsc::Sender<DomainName>, token: CancellationToken) {
        loop {
            if token.is_cancelled() {
                break;
            }

            let batch = self.collect_due().await;
            for (name, priority) in batch {
                self.metrics.record_dispatch(priority);
                if tx.send(name).await.is_err() {
                    error!("dispatch channel closed unexpectedly");
                    return;
                }
            }

            {
                let registry = self.registry.read().await;
                self.metrics.set_in_flight(registry.in_flight_count() as u64);
            }

            let sleep_for = self.time_to_next_due().await.unwrap_or(IDLE_TICK).min(IDLE_TICK);
            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(sleep_for) => {}
            }
        }
        debug!("dispatcher stopped");
        // tx drops here; workers drain the channel and exit.
    }

    /// Pop every currently due, live entry and mark it in flight.
    async fn collect_due(&self) -> Vec<(DomainName, bool)> {
        let mut registry = self.registry.write().await;
        let mut queue = self.queue.lock().expect("schedule queue lock poisoned");
        let now = Utc::now();
        let mut batch = Vec::new();

        loop {
            let popped = queue.pop_due(now, |name, due| {
                registry.get(name).is_some_and(|d| {
                    !d.in_flight && !d.pending_removal && d.next_check_at == due
                })
            });
            let Some(name) = popped else { break };

            match registry.mark_in_flight(&name) {
                Ok(()) => {
                    let priority = registry.get(&name).map(|d| d.priority).unwrap_or(false);
                    batch.push((name, priority));
                }
                Err(e) => {
                    // Validator raced with nothing (single writer), so this
                    // is unexpected; skip rather than crash the loop.
                    warn!(domain = %name, error = %e, "dispatch claim failed");
                    self.metrics.record_dispatch_skipped("claim_failed");
                }
            }
        }

        batch
    }

    async fn time_to_next_due(&self) -> Option<Duration> {
        let registry = self.registry.read().await;
        let mut queue = self.queue.lock().expect("schedule queue lock poisoned");
        let next = queue.next_due_at(|name, due| {
            registry
                .get(name)
                .is_some_and(|d| !d.in_flight && !d.pending_removal && d.next_check_at == due)
        })?;
        let now = Utc::now();
        Some((next - now).to_std().unwrap_or(Duration::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::registry::entity::DomainEntry;
    use ports::test_utils::NoopMetrics;
    use std::collections::HashSet;

    struct RecordingExecutor {
        seen: Mutex<Vec<DomainName>>,
        registry: Arc<RwLock<DomainRegistry>>,
        delay: Duration,
    }

    impl DomainExecutor for RecordingExecutor {
        fn execute<'a>(
            &'a self,
            domain: DomainName,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                self.seen.lock().unwrap().push(domain.clone());
                // Completion clears the in-flight mark like the monitor does.
                self.registry.write().await.complete_in_flight(&domain);
            })
        }
    }

    fn name(s: &str) -> DomainName {
        DomainName::parse(s).unwrap()
    }

    async fn registry_with(names: &[(&str, bool)]) -> Arc<RwLock<DomainRegistry>> {
        let mut registry = DomainRegistry::new();
        let entries: Vec<DomainEntry> = names
            .iter()
            .map(|(n, p)| DomainEntry {
                name: name(n),
                priority: *p,
            })
            .collect();
        registry.reconcile(&entries, Utc::now() - chrono::Duration::seconds(60), || {
            chrono::Duration::zero()
        });
        Arc::new(RwLock::new(registry))
    }

    #[tokio::test]
    async fn dispatches_due_domains_to_workers() {
        let registry = registry_with(&[("a.com", false), ("b.com", false)]).await;
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&registry),
            Arc::new(NoopMetrics),
            2,
            16,
        ));
        scheduler.rebuild_from_registry().await;

        let executor = Arc::new(RecordingExecutor {
            seen: Mutex::new(Vec::new()),
            registry: Arc::clone(&registry),
            delay: Duration::ZERO,
        });
        let token = CancellationToken::new();
        let handles = Arc::clone(&scheduler).spawn(executor.clone(), token.clone());

        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
        for handle in handles {
            handle.await.unwrap();
        }

        let seen: HashSet<DomainName> = executor.seen.lock().unwrap().iter().cloned().collect();
        assert_eq!(seen, HashSet::from([name("a.com"), name("b.com")]));
    }

    #[tokio::test]
    async fn no_double_dispatch_while_in_flight() {
        let registry = registry_with(&[("a.com", false)]).await;
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&registry),
            Arc::new(NoopMetrics),
            4,
            16,
        ));
        scheduler.rebuild_from_registry().await;
        // A duplicate (stale) queue entry for the same due time must not
        // produce a second dispatch.
        {
            let reg = registry.read().await;
            let due = reg.get(&name("a.com")).unwrap().next_check_at;
            scheduler.schedule(name("a.com"), due, false);
        }

        let executor = Arc::new(RecordingExecutor {
            seen: Mutex::new(Vec::new()),
            registry: Arc::clone(&registry),
            delay: Duration::from_millis(100),
        });
        let token = CancellationToken::new();
        let handles = Arc::clone(&scheduler).spawn(executor.clone(), token.clone());

        tokio::time::sleep(Duration::from_millis(250)).await;
        token.cancel();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(
            executor.seen.lock().unwrap().len(),
            1,
            "in-flight domain must be dispatched exactly once"
        );
    }

    #[tokio::test]
    async fn busy_worker_count_tracks_execution() {
        let registry = registry_with(&[("a.com", false)]).await;
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&registry),
            Arc::new(NoopMetrics),
            2,
            16,
        ));
        scheduler.rebuild_from_registry().await;

        let executor = Arc::new(RecordingExecutor {
            seen: Mutex::new(Vec::new()),
            registry: Arc::clone(&registry),
            delay: Duration::from_millis(150),
        });
        let token = CancellationToken::new();
        let handles = Arc::clone(&scheduler).spawn(executor.clone(), token.clone());

        // Mid-execution the slow check occupies exactly one worker.
        tokio::time::sleep(Duration::from_millis(75)).await;
        assert_eq!(scheduler.busy_workers(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(scheduler.busy_workers(), 0, "counter must drop on completion");

        token.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn cancellation_stops_new_dispatches() {
        let registry = registry_with(&[("a.com", false)]).await;
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&registry),
            Arc::new(NoopMetrics),
            1,
            16,
        ));
        // Nothing queued yet; cancel immediately.
        let executor = Arc::new(RecordingExecutor {
            seen: Mutex::new(Vec::new()),
            registry: Arc::clone(&registry),
            delay: Duration::ZERO,
        });
        let token = CancellationToken::new();
        token.cancel();
        let handles = Arc::clone(&scheduler).spawn(executor.clone(), token.clone());
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(executor.seen.lock().unwrap().is_empty());
    }
}
