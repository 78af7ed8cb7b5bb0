use std::time::Duration;

use crate::common::entity::VerdictStatus;
use crate::common::error::MonitorError;

/// Per-domain check cadence under the global rate budget.
///
/// All intervals are pre-jitter; callers stretch the returned delay by a
/// factor in `[0.9, 1.1]` so the fleet never thunders in step.
#[derive(Debug, Clone, Copy)]
pub struct CadencePolicy {
    /// Base interval for non-priority domains.
    pub t_low: Duration,
    /// Base interval for priority domains. Must be shorter than `t_low`.
    pub t_high: Duration,
    /// Interval after `ConfirmedAvailable` — the system already reported.
    pub t_confirmed: Duration,
    /// Ceiling for exponential backoff.
    pub t_cap: Duration,
}

impl CadencePolicy {
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.t_low.is_zero() || self.t_high.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "check intervals must be greater than zero".to_string(),
            ));
        }
        if self.t_high >= self.t_low {
            return Err(MonitorError::InvalidConfig(format!(
                "T_HIGH ({:?}) must be shorter than T_LOW ({:?})",
                self.t_high, self.t_low
            )));
        }
        if self.t_cap < self.t_low {
            return Err(MonitorError::InvalidConfig(format!(
                "T_CAP ({:?}) must be at least T_LOW ({:?})",
                self.t_cap, self.t_low
            )));
        }
        Ok(())
    }

    pub fn base_interval(&self, priority: bool) -> Duration {
        if priority { self.t_high } else { self.t_low }
    }

    /// Delay until the next check, given the verdict the check produced
    /// and the failure streak *after* this check.
    ///
    /// - conclusive verdicts reschedule at the base interval,
    /// - `ConfirmedAvailable` stretches to `t_confirmed`,
    /// - `Unknown` backs off exponentially, capped at `t_cap`.
    pub fn next_delay(
        &self,
        verdict: VerdictStatus,
        priority: bool,
        consecutive_failures: u32,
    ) -> Duration {
        match verdict {
            VerdictStatus::ConfirmedAvailable => self.t_confirmed,
            VerdictStatus::LikelyTaken | VerdictStatus::LikelyAvailable => {
                self.base_interval(priority)
            }
            VerdictStatus::Unknown => {
                let base = self.base_interval(priority);
                // 2^n with saturation; the cap keeps the shift sane anyway.
                let factor = 1u32.checked_shl(consecutive_failures.min(16)).unwrap_or(u32::MAX);
                base.saturating_mul(factor).min(self.t_cap)
            }
        }
    }
}

/// Stretch `delay` by `factor`, expected in `[0.9, 1.1]` for ±10 % jitter.
pub fn apply_jitter(delay: Duration, factor: f64) -> Duration {
    debug_assert!((0.5..=1.5).contains(&factor));
    delay.mul_f64(factor.clamp(0.5, 1.5))
}
