use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::entity::{DomainName, VerdictStatus};

/// One entry parsed from the remote list API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry {
    pub name: DomainName,
    pub priority: bool,
}

/// Full monitoring state for one domain.
///
/// Serialisable fields survive restarts through the state snapshot; the
/// runtime flags (`in_flight`, `pending_removal`, `deep_check`) are
/// reconstructed on boot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredDomain {
    pub name: DomainName,
    pub priority: bool,
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
    pub next_check_at: DateTime<Utc>,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub last_verdict: VerdictStatus,
    #[serde(default)]
    pub last_confidence: f64,
    #[serde(default)]
    pub last_reported_status: Option<VerdictStatus>,

    /// Escalation flag: run a full-depth check next cycle.
    #[serde(skip, default)]
    pub deep_check: bool,
    /// A worker currently holds this domain. At most one at a time.
    #[serde(skip, default)]
    pub in_flight: bool,
    /// Removal requested while in flight; honoured on completion.
    #[serde(skip, default)]
    pub pending_removal: bool,
}

impl MonitoredDomain {
    pub fn new(name: DomainName, priority: bool, next_check_at: DateTime<Utc>) -> Self {
        Self {
            name,
            priority,
            last_checked_at: None,
            next_check_at,
            consecutive_failures: 0,
            last_verdict: VerdictStatus::Unknown,
            last_confidence: 0.0,
            last_reported_status: None,
            deep_check: false,
            in_flight: false,
            pending_removal: false,
        }
    }
}

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<DomainName>,
    pub removed: Vec<DomainName>,
    /// Removals deferred because a check is in flight.
    pub deferred: Vec<DomainName>,
    pub priority_changed: Vec<DomainName>,
    /// The fetch was empty and deletions were withheld pending a second
    /// consecutive empty response.
    pub empty_deferred: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_flags_are_not_persisted() {
        let mut domain =
            MonitoredDomain::new(DomainName::parse("example.com").unwrap(), true, Utc::now());
        domain.in_flight = true;
        domain.pending_removal = true;
        domain.deep_check = true;

        let json = serde_json::to_string(&domain).unwrap();
        let restored: MonitoredDomain = serde_json::from_str(&json).unwrap();
        assert!(!restored.in_flight);
        assert!(!restored.pending_removal);
        assert!(!restored.deep_check);
        assert_eq!(restored.name, domain.name);
        assert!(restored.priority);
    }

    #[test]
    fn snapshot_roundtrip_preserves_monitoring_fields() {
        let mut domain =
            MonitoredDomain::new(DomainName::parse("example.com").unwrap(), false, Utc::now());
        domain.last_verdict = VerdictStatus::ConfirmedAvailable;
        domain.last_confidence = 0.95;
        domain.last_reported_status = Some(VerdictStatus::ConfirmedAvailable);
        domain.consecutive_failures = 3;

        let json = serde_json::to_string(&domain).unwrap();
        let restored: MonitoredDomain = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, domain);
    }
}
