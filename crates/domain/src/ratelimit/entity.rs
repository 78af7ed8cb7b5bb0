use crate::common::error::MonitorError;

/// Token-bucket parameters for one service class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketConfig {
    /// Refill rate in tokens per second.
    pub rate_per_sec: f64,
    /// Maximum tokens the bucket holds (burst size).
    pub capacity: f64,
}

impl BucketConfig {
    /// Build from a checks-per-minute budget. Capacity defaults to one
    /// second's worth of refill, floored at a single token so slow classes
    /// (e.g. WHOIS at 10/min) can still fire at all.
    pub fn per_minute(rate_per_minute: f64) -> Self {
        let rate_per_sec = rate_per_minute / 60.0;
        Self {
            rate_per_sec,
            capacity: rate_per_sec.max(1.0),
        }
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.rate_per_sec <= 0.0 || !self.rate_per_sec.is_finite() {
            return Err(MonitorError::InvalidConfig(format!(
                "rate must be positive, got {}",
                self.rate_per_sec
            )));
        }
        if self.capacity < 1.0 || !self.capacity.is_finite() {
            return Err(MonitorError::InvalidConfig(format!(
                "capacity must be at least 1, got {}",
                self.capacity
            )));
        }
        Ok(())
    }
}
