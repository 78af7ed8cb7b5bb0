use std::time::Duration;

use domain::common::error::MonitorError;

/// Configuration for retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (after the initial attempt).
    pub max_retries: usize,
    /// Backoff delays between retries. If fewer entries than `max_retries`,
    /// the last entry is repeated.
    pub backoff_schedule: Vec<Duration>,
    /// Timeout per individual attempt.
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_schedule: vec![
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(30),
            ],
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    fn backoff_for(&self, attempt: usize) -> Duration {
        self.backoff_schedule
            .get(attempt)
            .copied()
            .unwrap_or_else(|| {
                self.backoff_schedule
                    .last()
                    .copied()
                    .unwrap_or(Duration::from_secs(1))
            })
    }
}

/// Execute an async operation with retry and exponential backoff.
///
/// The closure `f` is called up to `1 + max_retries` times. Each attempt is
/// wrapped in a per-attempt timeout. Only transient errors
/// ([`MonitorError::is_transient`]) are retried; auth rejections, protocol
/// errors and the like surface immediately.
pub async fn retry_with_backoff<T, F, Fut>(config: &RetryConfig, mut f: F) -> Result<T, MonitorError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, MonitorError>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        let result = tokio::time::timeout(config.timeout, f()).await;

        match result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                if !e.is_transient() {
                    return Err(e);
                }
                last_error = Some(e);
            }
            Err(_elapsed) => {
                last_error = Some(MonitorError::Network("attempt timed out".to_string()));
            }
        }

        // Sleep before next retry (but not after the last attempt)
        if attempt < config.max_retries {
            let delay = config.backoff_for(attempt);
            tokio::time::sleep(delay).await;
        }
    }

    Err(last_error
        .unwrap_or_else(|| MonitorError::Network("all retries exhausted".to_string())))
}
