use serde::{Deserialize, Serialize};

use crate::common::entity::VerdictStatus;
use crate::probe::entity::{CheckOutcome, CheckResult, CheckerKind};

// Confidence ladder. Deeper layers speak with more authority; WHOIS
// confirmation grows with corroborating shallow evidence but never
// reaches certainty.
pub const LAYER1_TAKEN_CONFIDENCE: f64 = 0.7;
pub const RDAP_AVAILABLE_CONFIDENCE: f64 = 0.85;
pub const RDAP_TAKEN_CONFIDENCE: f64 = 0.9;
pub const WHOIS_TAKEN_CONFIDENCE: f64 = 0.95;
pub const CONFIRMED_BASE_CONFIDENCE: f64 = 0.85;
pub const CONFIRMED_CORROBORATION_STEP: f64 = 0.05;
pub const CONFIRMED_MAX_CONFIDENCE: f64 = 0.99;
/// An NXDOMAIN with every deeper oracle unreachable is a weak signal.
pub const DNS_ONLY_AVAILABLE_CONFIDENCE: f64 = 0.6;

/// The pipeline's final classification for one domain at one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    /// Agreement across layers and depth reached, in `[0, 1]`.
    pub confidence: f64,
    /// Every oracle result that fed this verdict, in execution order.
    pub contributing: Vec<CheckResult>,
}

impl Verdict {
    pub fn new(status: VerdictStatus, confidence: f64, contributing: Vec<CheckResult>) -> Self {
        debug_assert!((0.0..=1.0).contains(&confidence));
        Self {
            status,
            confidence,
            contributing,
        }
    }

    pub fn unknown(contributing: Vec<CheckResult>) -> Self {
        Self::new(VerdictStatus::Unknown, 0.0, contributing)
    }

    /// A `ConfirmedAvailable` verdict must be backed by at least one WHOIS
    /// result with outcome `Unregistered`.
    pub fn satisfies_confirmation_invariant(&self) -> bool {
        self.status != VerdictStatus::ConfirmedAvailable
            || self.contributing.iter().any(|r| {
                r.kind == CheckerKind::Whois && r.outcome == CheckOutcome::Unregistered
            })
    }
}

/// What the fusion engine wants after absorbing a layer's results.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerPlan {
    /// Short-circuit: the verdict is settled, skip deeper layers.
    Stop(Verdict),
    /// Evidence is insufficient or needs confirmation — run the next layer.
    Continue,
}

impl LayerPlan {
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop(_))
    }
}
