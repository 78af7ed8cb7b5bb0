use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};

use crate::common::entity::DomainName;

/// One scheduled check. Entries are immutable once pushed; rescheduling a
/// domain pushes a fresh entry and the old one is dropped lazily when it
/// fails validation on pop.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueEntry {
    due_at: DateTime<Utc>,
    seq: u64,
    name: DomainName,
}

// Min-heap by (due_at, seq): BinaryHeap is a max-heap, so invert.
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_at
            .cmp(&self.due_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Time-ordered due queue with two tiers.
///
/// Fairness: when more entries are due than workers can take, priority-tier
/// domains dispatch first; within a tier, the oldest-scheduled entry wins
/// (`seq` breaks exact-timestamp ties in insertion order).
///
/// Stale entries (domain rescheduled, removed, or already in flight) are
/// invalidated lazily: `pop_due` and `next_due_at` hand each candidate to a
/// caller-supplied validator and silently drop rejects.
#[derive(Debug, Default)]
pub struct ScheduleQueue {
    priority: BinaryHeap<QueueEntry>,
    normal: BinaryHeap<QueueEntry>,
    seq: u64,
}

impl ScheduleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: DomainName, due_at: DateTime<Utc>, priority: bool) {
        self.seq += 1;
        let entry = QueueEntry {
            due_at,
            seq: self.seq,
            name,
        };
        if priority {
            self.priority.push(entry);
        } else {
            self.normal.push(entry);
        }
    }

    /// Total entries, stale ones included.
    pub fn len(&self) -> usize {
        self.priority.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priority.is_empty() && self.normal.is_empty()
    }

    /// Pop the next due domain, priority tier first.
    ///
    /// `is_live` receives `(name, due_at)` and must return `false` for
    /// entries that no longer reflect the registry (superseded reschedule,
    /// removed domain, in-flight domain).
    pub fn pop_due(
        &mut self,
        now: DateTime<Utc>,
        mut is_live: impl FnMut(&DomainName, DateTime<Utc>) -> bool,
    ) -> Option<DomainName> {
        for heap in [&mut self.priority, &mut self.normal] {
            while let Some(top) = heap.peek() {
                if !is_live(&top.name, top.due_at) {
                    heap.pop();
                    continue;
                }
                if top.due_at > now {
                    break;
                }
                return heap.pop().map(|e| e.name);
            }
        }
        None
    }

    /// Earliest live due time across both tiers, for dispatcher sleeps.
    /// Prunes stale heads as a side effect.
    pub fn next_due_at(
        &mut self,
        mut is_live: impl FnMut(&DomainName, DateTime<Utc>) -> bool,
    ) -> Option<DateTime<Utc>> {
        let mut earliest: Option<DateTime<Utc>> = None;
        for heap in [&mut self.priority, &mut self.normal] {
            while let Some(top) = heap.peek() {
                if !is_live(&top.name, top.due_at) {
                    heap.pop();
                    continue;
                }
                earliest = Some(match earliest {
                    Some(current) => current.min(top.due_at),
                    None => top.due_at,
                });
                break;
            }
        }
        earliest
    }
}
