use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::common::entity::{DomainName, VerdictStatus};
use crate::common::error::MonitorError;

use super::entity::{DomainEntry, MonitoredDomain, ReconcileReport};

/// The authoritative in-memory map of monitored domains.
///
/// Keyed by normalised name (a `BTreeMap`, so iteration order is
/// deterministic). Only the monitor task mutates the registry; readers
/// receive cloned snapshots.
#[derive(Debug, Default)]
pub struct DomainRegistry {
    domains: BTreeMap<DomainName, MonitoredDomain>,
    /// Consecutive empty list fetches. Deletions from an empty list are
    /// honoured only on the second one.
    empty_fetch_streak: u32,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry from a loaded state snapshot. Duplicate names
    /// collapse (last wins) — the snapshot writer never produces them.
    pub fn load(&mut self, domains: Vec<MonitoredDomain>) {
        for domain in domains {
            self.domains.insert(domain.name.clone(), domain);
        }
    }

    pub fn get(&self, name: &DomainName) -> Option<&MonitoredDomain> {
        self.domains.get(name)
    }

    pub fn get_mut(&mut self, name: &DomainName) -> Option<&mut MonitoredDomain> {
        self.domains.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonitoredDomain> {
        self.domains.values()
    }

    pub fn priority_count(&self) -> usize {
        self.domains.values().filter(|d| d.priority).count()
    }

    pub fn in_flight_count(&self) -> usize {
        self.domains.values().filter(|d| d.in_flight).count()
    }

    /// Domain counts grouped by last verdict, for `/status` and metrics.
    pub fn counts_by_verdict(&self) -> BTreeMap<VerdictStatus, usize> {
        let mut counts = BTreeMap::new();
        for domain in self.domains.values() {
            *counts.entry(domain.last_verdict).or_insert(0) += 1;
        }
        counts
    }

    /// Claim a domain for checking. Per-domain serialisation: a second
    /// claim while in flight is an error, as is claiming a domain that is
    /// about to be removed.
    pub fn mark_in_flight(&mut self, name: &DomainName) -> Result<(), MonitorError> {
        let domain = self
            .domains
            .get_mut(name)
            .ok_or_else(|| MonitorError::DomainNotFound(name.to_string()))?;
        if domain.in_flight {
            return Err(MonitorError::Fatal(format!(
                "double dispatch for in-flight domain '{name}'"
            )));
        }
        if domain.pending_removal {
            return Err(MonitorError::DomainNotFound(name.to_string()));
        }
        domain.in_flight = true;
        Ok(())
    }

    /// Release a domain after its check settled. Returns `true` when the
    /// domain was deleted because a removal had been deferred; the caller
    /// must then discard the check's results without posting callbacks.
    pub fn complete_in_flight(&mut self, name: &DomainName) -> bool {
        let Some(domain) = self.domains.get_mut(name) else {
            return true;
        };
        domain.in_flight = false;
        if domain.pending_removal {
            self.domains.remove(name);
            return true;
        }
        false
    }

    /// Merge a list fetch into the registry.
    ///
    /// - additions start at `now` plus a caller-supplied jitter,
    /// - removals are deferred while in flight,
    /// - priority flips never touch timers,
    /// - an empty list must repeat before deletions are honoured.
    pub fn reconcile(
        &mut self,
        entries: &[DomainEntry],
        now: DateTime<Utc>,
        mut initial_jitter: impl FnMut() -> Duration,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        if entries.is_empty() {
            self.empty_fetch_streak += 1;
            if self.empty_fetch_streak < 2 {
                report.empty_deferred = true;
                return report;
            }
        } else {
            self.empty_fetch_streak = 0;
        }

        let incoming: BTreeMap<&DomainName, bool> =
            entries.iter().map(|e| (&e.name, e.priority)).collect();

        // Removals first, so a re-add in the same fetch is an update.
        let stale: Vec<DomainName> = self
            .domains
            .keys()
            .filter(|name| !incoming.contains_key(*name))
            .cloned()
            .collect();
        for name in stale {
            let domain = self.domains.get_mut(&name).expect("key just listed");
            if domain.in_flight {
                domain.pending_removal = true;
                report.deferred.push(name);
            } else {
                self.domains.remove(&name);
                report.removed.push(name);
            }
        }

        for (name, priority) in incoming {
            match self.domains.get_mut(name) {
                Some(existing) => {
                    // A deferred removal is cancelled by re-appearance.
                    existing.pending_removal = false;
                    if existing.priority != priority {
                        existing.priority = priority;
                        report.priority_changed.push(name.clone());
                    }
                }
                None => {
                    let next = now + initial_jitter();
                    self.domains
                        .insert(name.clone(), MonitoredDomain::new(name.clone(), priority, next));
                    report.added.push(name.clone());
                }
            }
        }

        report
    }

    /// Reset every domain's next check to `now` plus a small per-domain
    /// jitter. Backs the `/refresh` endpoint.
    pub fn reschedule_all(
        &mut self,
        now: DateTime<Utc>,
        mut jitter: impl FnMut() -> Duration,
    ) -> usize {
        let mut count = 0;
        for domain in self.domains.values_mut() {
            domain.next_check_at = now + jitter();
            count += 1;
        }
        count
    }

    /// Snapshot view for persistence: every domain, transient flags
    /// excluded by serde.
    pub fn snapshot(&self) -> Vec<MonitoredDomain> {
        self.domains.values().cloned().collect()
    }
}
