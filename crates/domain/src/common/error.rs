use thiserror::Error;

/// Error taxonomy shared across the whole service.
///
/// Checker-level failures never surface as errors — they become
/// `CheckOutcome::Inconclusive`/`Error` and stop at the pipeline. Everything
/// else is classified here so callers can decide between retry, drop, and
/// shutdown without string matching.
#[derive(Debug, Clone, Error)]
pub enum MonitorError {
    /// Rate limiter deadline exceeded. Retried at the next scheduling tick.
    #[error("rate limit wait timed out for class '{0}'")]
    RateTimeout(String),

    /// DNS/TCP/HTTP transport failure. Retried with backoff.
    #[error("network error: {0}")]
    Network(String),

    /// Transport succeeded but the payload could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Upstream returned 5xx or 429. Retried with backoff.
    #[error("remote failure: {0}")]
    RemoteFailure(String),

    /// Callback endpoint rejected our credentials (401/403). Not retried.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// State snapshot write/read failure. Next snapshot is still attempted.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid domain name: {0}")]
    InvalidDomain(String),

    #[error("domain not monitored: {0}")]
    DomainNotFound(String),

    /// Invariant violation or unrecoverable configuration. Triggers a
    /// graceful shutdown after a best-effort snapshot.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl MonitorError {
    /// Whether a retry with backoff is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RemoteFailure(_) | Self::RateTimeout(_)
        )
    }

    /// Short machine-readable kind label, used in metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateTimeout(_) => "rate_timeout",
            Self::Network(_) => "network",
            Self::Protocol(_) => "protocol",
            Self::RemoteFailure(_) => "remote_failure",
            Self::Auth(_) => "auth",
            Self::Persistence(_) => "persistence",
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidDomain(_) => "invalid_domain",
            Self::DomainNotFound(_) => "not_found",
            Self::Fatal(_) => "fatal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(MonitorError::Network("refused".into()).is_transient());
        assert!(MonitorError::RemoteFailure("503".into()).is_transient());
        assert!(MonitorError::RateTimeout("whois".into()).is_transient());
        assert!(!MonitorError::Auth("401".into()).is_transient());
        assert!(!MonitorError::Protocol("bad json".into()).is_transient());
        assert!(!MonitorError::Fatal("invariant".into()).is_transient());
    }

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(
            MonitorError::RateTimeout("dns".into()).kind(),
            "rate_timeout"
        );
        assert_eq!(MonitorError::Auth("x".into()).kind(), "auth");
        assert_eq!(MonitorError::Persistence("x".into()).kind(), "persistence");
    }

    #[test]
    fn display_includes_context() {
        let err = MonitorError::RateTimeout("whois".to_string());
        assert!(err.to_string().contains("whois"));
    }
}
