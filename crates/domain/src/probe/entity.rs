use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of availability oracles.
///
/// Dispatch is always by this tag — there is no runtime discovery of
/// checker implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckerKind {
    Dns,
    Http,
    Rdap,
    Whois,
}

impl CheckerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dns => "dns",
            Self::Http => "http",
            Self::Rdap => "rdap",
            Self::Whois => "whois",
        }
    }

    /// Pipeline layer: 1 = cheap (DNS, HTTP), 2 = RDAP, 3 = WHOIS.
    pub fn layer(self) -> u8 {
        match self {
            Self::Dns | Self::Http => 1,
            Self::Rdap => 2,
            Self::Whois => 3,
        }
    }

    pub const ALL: [Self; 4] = [Self::Dns, Self::Http, Self::Rdap, Self::Whois];
}

impl std::fmt::Display for CheckerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single oracle concluded about one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Registered,
    Unregistered,
    Inconclusive,
    Error,
}

impl CheckOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Unregistered => "unregistered",
            Self::Inconclusive => "inconclusive",
            Self::Error => "error",
        }
    }

    /// Value posted in per-check callback payloads. The callback API speaks
    /// availability, not registration: an unregistered domain is "available".
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::Registered => "unavailable",
            Self::Unregistered => "available",
            Self::Inconclusive => "unknown",
            Self::Error => "error",
        }
    }

    /// True when this outcome carries a usable registration signal.
    pub fn is_conclusive(self) -> bool {
        matches!(self, Self::Registered | Self::Unregistered)
    }
}

/// One oracle's output for one domain check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub kind: CheckerKind,
    pub outcome: CheckOutcome,
    /// Opaque structured attributes: registrar, event dates, nameservers,
    /// HTTP status codes. Shape varies per checker.
    #[serde(default)]
    pub details: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    pub fn new(kind: CheckerKind, outcome: CheckOutcome, started_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            outcome,
            details: serde_json::Value::Null,
            started_at,
            duration_ms: 0,
            error: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
