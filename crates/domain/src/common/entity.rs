use serde::{Deserialize, Serialize};

use super::error::MonitorError;

/// A normalised, validated domain name.
///
/// Normalisation lowercases the input and strips a single trailing dot.
/// Validation follows RFC 1035 label rules: 1–63 alphanumeric/hyphen
/// characters per label, no leading/trailing hyphen, 253 characters total,
/// at least two labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainName(String);

impl DomainName {
    pub fn parse(raw: &str) -> Result<Self, MonitorError> {
        let normalised = raw.trim().trim_end_matches('.').to_ascii_lowercase();

        if normalised.is_empty() {
            return Err(MonitorError::InvalidDomain("empty domain name".to_string()));
        }
        if normalised.len() > 253 {
            return Err(MonitorError::InvalidDomain(format!(
                "domain name too long: {} chars (max 253)",
                normalised.len()
            )));
        }
        if !normalised.is_ascii() {
            return Err(MonitorError::InvalidDomain(format!(
                "domain name must be ASCII (punycode-encode first): '{normalised}'"
            )));
        }

        let labels: Vec<&str> = normalised.split('.').collect();
        if labels.len() < 2 {
            return Err(MonitorError::InvalidDomain(format!(
                "domain name must have at least two labels: '{normalised}'"
            )));
        }
        for label in &labels {
            if label.is_empty() {
                return Err(MonitorError::InvalidDomain(format!(
                    "domain name has an empty label: '{normalised}'"
                )));
            }
            if label.len() > 63 {
                return Err(MonitorError::InvalidDomain(format!(
                    "label '{label}' exceeds 63 characters"
                )));
            }
            if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(MonitorError::InvalidDomain(format!(
                    "label '{label}' contains invalid characters"
                )));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(MonitorError::InvalidDomain(format!(
                    "label '{label}' must not start or end with a hyphen"
                )));
            }
        }

        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final label, e.g. `com` for `example.com`.
    pub fn tld(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for DomainName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Final classification of a domain at one moment in time.
///
/// Ordered by strength of the availability signal so that "previous verdict
/// was `LikelyAvailable` or better" is a plain comparison.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    #[default]
    Unknown,
    LikelyTaken,
    LikelyAvailable,
    ConfirmedAvailable,
}

impl VerdictStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::LikelyTaken => "likely_taken",
            Self::LikelyAvailable => "likely_available",
            Self::ConfirmedAvailable => "confirmed_available",
        }
    }

    /// True for the verdicts that trigger availability notifications.
    pub fn is_available_variant(self) -> bool {
        matches!(self, Self::LikelyAvailable | Self::ConfirmedAvailable)
    }
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
