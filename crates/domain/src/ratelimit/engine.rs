use super::entity::BucketConfig;

/// What a bucket said about an acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcquireOutcome {
    /// Tokens were deducted; the caller may proceed immediately.
    Granted,
    /// Insufficient tokens; retry after the given number of seconds.
    Wait(f64),
}

/// Classical token bucket, pure math.
///
/// Time is passed in as monotonic seconds so the refill logic is fully
/// deterministic under test; the async gate in the application crate owns
/// the clock and the actual sleeping.
#[derive(Debug)]
pub struct TokenBucket {
    config: BucketConfig,
    tokens: f64,
    last_refill: f64,
}

impl TokenBucket {
    /// Starts full, anchored at `now` (monotonic seconds).
    pub fn new(config: BucketConfig, now: f64) -> Self {
        Self {
            config,
            tokens: config.capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: f64) {
        let elapsed = (now - self.last_refill).max(0.0);
        self.tokens = (self.tokens + elapsed * self.config.rate_per_sec).min(self.config.capacity);
        self.last_refill = now;
    }

    /// Try to take `n` tokens at time `now`. Requests above capacity are
    /// clamped so they can ever succeed.
    pub fn try_acquire(&mut self, n: f64, now: f64) -> AcquireOutcome {
        let n = n.min(self.config.capacity);
        self.refill(now);

        if self.tokens >= n {
            self.tokens -= n;
            return AcquireOutcome::Granted;
        }

        let deficit = n - self.tokens;
        AcquireOutcome::Wait(deficit / self.config.rate_per_sec)
    }

    pub fn available(&mut self, now: f64) -> f64 {
        self.refill(now);
        self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(rate_per_sec: f64, capacity: f64) -> TokenBucket {
        TokenBucket::new(
            BucketConfig {
                rate_per_sec,
                capacity,
            },
            0.0,
        )
    }

    // ── Basic acquire/refill ─────────────────────────────────────────

    #[test]
    fn starts_full() {
        let mut b = bucket(1.0, 5.0);
        for _ in 0..5 {
            assert_eq!(b.try_acquire(1.0, 0.0), AcquireOutcome::Granted);
        }
        assert!(matches!(b.try_acquire(1.0, 0.0), AcquireOutcome::Wait(_)));
    }

    #[test]
    fn refills_over_time() {
        let mut b = bucket(2.0, 4.0);
        for _ in 0..4 {
            b.try_acquire(1.0, 0.0);
        }
        assert!(matches!(b.try_acquire(1.0, 0.0), AcquireOutcome::Wait(_)));
        // 1 second at 2 tokens/sec refills two tokens.
        assert_eq!(b.try_acquire(1.0, 1.0), AcquireOutcome::Granted);
        assert_eq!(b.try_acquire(1.0, 1.0), AcquireOutcome::Granted);
        assert!(matches!(b.try_acquire(1.0, 1.0), AcquireOutcome::Wait(_)));
    }

    #[test]
    fn wait_hint_matches_deficit() {
        let mut b = bucket(0.5, 1.0);
        assert_eq!(b.try_acquire(1.0, 0.0), AcquireOutcome::Granted);
        let AcquireOutcome::Wait(secs) = b.try_acquire(1.0, 0.0) else {
            panic!("bucket should be empty");
        };
        // One token at 0.5 tokens/sec is a 2 second wait.
        assert!((secs - 2.0).abs() < 1e-9);
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let mut b = bucket(10.0, 3.0);
        assert_eq!(b.available(1000.0), 3.0);
    }

    #[test]
    fn oversized_requests_are_clamped() {
        let mut b = bucket(1.0, 2.0);
        assert_eq!(b.try_acquire(10.0, 0.0), AcquireOutcome::Granted);
        assert_eq!(b.available(0.0), 0.0);
    }

    #[test]
    fn clock_going_backwards_is_tolerated() {
        let mut b = bucket(1.0, 1.0);
        b.try_acquire(1.0, 100.0);
        // A non-monotonic now must not mint negative elapsed time.
        assert!(matches!(b.try_acquire(1.0, 50.0), AcquireOutcome::Wait(_)));
    }

    // ── Dispensation bound ───────────────────────────────────────────

    #[test]
    fn dispensed_tokens_bounded_by_capacity_plus_rate_window() {
        // Over any window W: granted ≤ capacity + rate·W.
        let rate = 5.0;
        let capacity = 10.0;
        let mut b = bucket(rate, capacity);
        let window = 8.0;
        let mut granted = 0u32;
        let mut t = 0.0;
        while t <= window {
            if b.try_acquire(1.0, t) == AcquireOutcome::Granted {
                granted += 1;
            }
            t += 0.01;
        }
        let bound = capacity + rate * window;
        assert!(
            f64::from(granted) <= bound + 1e-6,
            "granted {granted} exceeds bound {bound}"
        );
    }
}
