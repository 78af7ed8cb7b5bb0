use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domain::common::error::MonitorError;
use domain::registry::engine::DomainRegistry;
use domain::registry::entity::ReconcileReport;
use ports::secondary::list_source::DomainListSource;
use ports::secondary::metrics_port::MetricsPort;
use rand::Rng;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::retry::{RetryConfig, retry_with_backoff};
use crate::scheduler::Scheduler;

/// Upper bound for the initial jitter applied to newly added domains, so a
/// large list landing at once doesn't fire a burst of simultaneous checks.
const NEW_DOMAIN_JITTER_MAX_SECS: i64 = 60;

/// Periodically merges the remote domain list into the registry.
///
/// Fetch failures preserve the registry untouched; an empty response must
/// repeat before deletions are honoured (that rule lives in the registry
/// engine). New domains get a jittered first check and a queue entry.
pub struct Reconciler {
    source: Arc<dyn DomainListSource>,
    registry: Arc<RwLock<DomainRegistry>>,
    scheduler: Arc<Scheduler>,
    metrics: Arc<dyn MetricsPort>,
    interval: Duration,
    retry: RetryConfig,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn DomainListSource>,
        registry: Arc<RwLock<DomainRegistry>>,
        scheduler: Arc<Scheduler>,
        metrics: Arc<dyn MetricsPort>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            registry,
            scheduler,
            metrics,
            interval,
            retry: RetryConfig::default(),
        }
    }

    /// Run the periodic loop. `refresh_rx` delivers manual `/refresh`
    /// triggers, which force a fetch and reschedule every domain.
    pub async fn run(
        &self,
        mut refresh_rx: tokio::sync::mpsc::Receiver<()>,
        token: CancellationToken,
    ) {
        // Once the refresh handle is gone the branch is disabled; the
        // periodic loop keeps going on its own.
        let mut refresh_open = true;
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.refresh_once().await {
                        error!(error = %e, "domain list refresh failed, keeping current registry");
                    }
                }
                trigger = refresh_rx.recv(), if refresh_open => {
                    match trigger {
                        Some(()) => {
                            info!("manual refresh requested");
                            if let Err(e) = self.refresh_once().await {
                                error!(error = %e, "manual refresh fetch failed");
                            }
                            self.reschedule_all().await;
                        }
                        None => refresh_open = false,
                    }
                }
            }
        }
    }

    /// One fetch-and-merge pass. Public so startup can prime the registry.
    pub async fn refresh_once(&self) -> Result<ReconcileReport, MonitorError> {
        let source = Arc::clone(&self.source);
        let entries = match retry_with_backoff(&self.retry, || {
            let source = Arc::clone(&source);
            async move { source.fetch().await }
        })
        .await
        {
            Ok(entries) => entries,
            Err(e) => {
                self.metrics.record_list_fetch("failure");
                return Err(e);
            }
        };

        self.metrics.record_list_fetch(if entries.is_empty() {
            "empty"
        } else {
            "success"
        });

        let report = {
            let mut registry = self.registry.write().await;
            let report = registry.reconcile(&entries, Utc::now(), new_domain_jitter);
            self.metrics.set_domains_monitored(registry.len() as u64);
            self.metrics
                .set_domains_priority(registry.priority_count() as u64);
            report
        };

        if report.empty_deferred {
            warn!(
                "list API returned an empty domain set; deferring deletions until it repeats"
            );
        }
        if !report.added.is_empty() || !report.removed.is_empty() {
            info!(
                added = report.added.len(),
                removed = report.removed.len(),
                deferred = report.deferred.len(),
                priority_changed = report.priority_changed.len(),
                "domain list reconciled"
            );
        }
        self.metrics.record_domains_added(report.added.len() as u64);
        self.metrics
            .record_domains_removed(report.removed.len() as u64);

        // Queue entries for the additions; everything else keeps its timer.
        {
            let registry = self.registry.read().await;
            for name in &report.added {
                if let Some(domain) = registry.get(name) {
                    self.scheduler
                        .schedule(name.clone(), domain.next_check_at, domain.priority);
                }
            }
        }

        Ok(report)
    }

    /// Reset every domain to `now + jitter` and rebuild the queue.
    pub async fn reschedule_all(&self) {
        {
            let mut registry = self.registry.write().await;
            let count = registry.reschedule_all(Utc::now(), new_domain_jitter);
            info!(domains = count, "rescheduled all domains");
        }
        self.scheduler.rebuild_from_registry().await;
    }
}

fn new_domain_jitter() -> chrono::Duration {
    chrono::Duration::seconds(rand::rng().random_range(1..=NEW_DOMAIN_JITTER_MAX_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::common::entity::DomainName;
    use domain::registry::entity::DomainEntry;
    use ports::test_utils::NoopMetrics;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    /// Scripted list source: each fetch pops the next response.
    struct ScriptedSource {
        responses: Mutex<Vec<Result<Vec<DomainEntry>, MonitorError>>>,
    }

    impl DomainListSource for ScriptedSource {
        fn fetch<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<DomainEntry>, MonitorError>> + Send + 'a>>
        {
            Box::pin(async {
                let mut responses = self.responses.lock().unwrap();
                if responses.is_empty() {
                    Ok(vec![])
                } else {
                    responses.remove(0)
                }
            })
        }
    }

    fn name(s: &str) -> DomainName {
        DomainName::parse(s).unwrap()
    }

    fn entry(s: &str, priority: bool) -> DomainEntry {
        DomainEntry {
            name: name(s),
            priority,
        }
    }

    fn reconciler_with(
        responses: Vec<Result<Vec<DomainEntry>, MonitorError>>,
    ) -> (Reconciler, Arc<RwLock<DomainRegistry>>) {
        let registry = Arc::new(RwLock::new(DomainRegistry::new()));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&registry),
            Arc::new(NoopMetrics),
            1,
            16,
        ));
        let mut reconciler = Reconciler::new(
            Arc::new(ScriptedSource {
                responses: Mutex::new(responses),
            }),
            Arc::clone(&registry),
            scheduler,
            Arc::new(NoopMetrics),
            Duration::from_secs(300),
        );
        // Keep tests fast.
        reconciler.retry = RetryConfig {
            max_retries: 1,
            backoff_schedule: vec![Duration::from_millis(1)],
            timeout: Duration::from_millis(100),
        };
        (reconciler, registry)
    }

    #[tokio::test]
    async fn refresh_populates_registry() {
        let (reconciler, registry) =
            reconciler_with(vec![Ok(vec![entry("a.com", true), entry("b.com", false)])]);

        let report = reconciler.refresh_once().await.unwrap();
        assert_eq!(report.added.len(), 2);

        let registry = registry.read().await;
        assert_eq!(registry.len(), 2);
        assert!(registry.get(&name("a.com")).unwrap().priority);
    }

    #[tokio::test]
    async fn fetch_failure_preserves_registry() {
        let (reconciler, registry) = reconciler_with(vec![
            Ok(vec![entry("a.com", false)]),
            Err(MonitorError::Network("down".to_string())),
            Err(MonitorError::Network("still down".to_string())),
        ]);

        reconciler.refresh_once().await.unwrap();
        let result = reconciler.refresh_once().await;
        assert!(result.is_err());

        let registry = registry.read().await;
        assert_eq!(registry.len(), 1, "registry must survive fetch failures");
    }

    #[tokio::test]
    async fn transient_fetch_failure_is_retried() {
        let (reconciler, registry) = reconciler_with(vec![
            Err(MonitorError::RemoteFailure("503".to_string())),
            Ok(vec![entry("a.com", false)]),
        ]);

        reconciler.refresh_once().await.unwrap();
        assert_eq!(registry.read().await.len(), 1);
    }

    #[tokio::test]
    async fn empty_list_needs_two_fetches_to_clear() {
        let (reconciler, registry) = reconciler_with(vec![
            Ok(vec![entry("a.com", false)]),
            Ok(vec![]),
            Ok(vec![]),
        ]);

        reconciler.refresh_once().await.unwrap();
        let first_empty = reconciler.refresh_once().await.unwrap();
        assert!(first_empty.empty_deferred);
        assert_eq!(registry.read().await.len(), 1);

        let second_empty = reconciler.refresh_once().await.unwrap();
        assert!(!second_empty.empty_deferred);
        assert_eq!(registry.read().await.len(), 0);
    }
}
