use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use domain::common::error::MonitorError;
use domain::ratelimit::engine::{AcquireOutcome, TokenBucket};
use domain::ratelimit::entity::BucketConfig;
use ports::secondary::metrics_port::MetricsPort;
use rand::Rng;

/// Small random addition to computed waits so callers that queued on the
/// same empty bucket don't all wake in the same instant.
const WAKE_JITTER_MAX: Duration = Duration::from_millis(100);

struct ClassGate {
    /// Held across the whole wait: tokio mutexes queue fairly, which gives
    /// strict FIFO service per class.
    fifo: tokio::sync::Mutex<()>,
    bucket: Mutex<TokenBucket>,
}

/// The single admission-control point for outbound traffic.
///
/// One token bucket per named service class (`dns`, `http`, `rdap`,
/// `whois`, plus one per remote-API host). `acquire` either returns
/// immediately or parks the caller until tokens refill or its deadline
/// passes. Waiters within a class are served first-come first-served.
pub struct RateLimiter {
    classes: HashMap<String, ClassGate>,
    epoch: Instant,
    metrics: Arc<dyn MetricsPort>,
}

impl RateLimiter {
    pub fn new(
        configs: impl IntoIterator<Item = (String, BucketConfig)>,
        metrics: Arc<dyn MetricsPort>,
    ) -> Self {
        let epoch = Instant::now();
        let classes = configs
            .into_iter()
            .map(|(name, config)| {
                let gate = ClassGate {
                    fifo: tokio::sync::Mutex::new(()),
                    bucket: Mutex::new(TokenBucket::new(config, 0.0)),
                };
                (name, gate)
            })
            .collect();
        Self {
            classes,
            epoch,
            metrics,
        }
    }

    fn now_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Take `n` tokens from `class`, waiting until they refill or
    /// `deadline` passes (`RateTimeout`). An unknown class is a wiring bug
    /// and fatal.
    pub async fn acquire(
        &self,
        class: &str,
        n: f64,
        deadline: Instant,
    ) -> Result<(), MonitorError> {
        let gate = self
            .classes
            .get(class)
            .ok_or_else(|| MonitorError::Fatal(format!("unknown rate-limit class '{class}'")))?;

        // Join the FIFO queue; give up if the deadline passes while queued.
        let _slot = tokio::time::timeout_at(deadline.into(), gate.fifo.lock())
            .await
            .map_err(|_| {
                self.metrics.record_rate_timeout(class);
                MonitorError::RateTimeout(class.to_string())
            })?;

        loop {
            let wait_secs = {
                let mut bucket = gate.bucket.lock().expect("bucket lock poisoned");
                match bucket.try_acquire(n, self.now_secs()) {
                    AcquireOutcome::Granted => return Ok(()),
                    AcquireOutcome::Wait(secs) => secs,
                }
            };

            let jitter = rand::rng().random_range(Duration::ZERO..WAKE_JITTER_MAX);
            let wake = Instant::now() + Duration::from_secs_f64(wait_secs) + jitter;
            if wake > deadline {
                self.metrics.record_rate_timeout(class);
                return Err(MonitorError::RateTimeout(class.to_string()));
            }
            tokio::time::sleep_until(wake.into()).await;
        }
    }

    /// Convenience for single-token acquisition with a relative deadline.
    pub async fn acquire_one(&self, class: &str, budget: Duration) -> Result<(), MonitorError> {
        self.acquire(class, 1.0, Instant::now() + budget).await
    }
}
