//! Service configuration: environment parsing and validation.
//!
//! All configuration comes from environment variables (the service runs
//! under a supervisor that owns the `.env` handling). Parsing is separated
//! from lookup so tests can inject a map instead of touching the process
//! environment.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use domain::ratelimit::entity::BucketConfig;
use domain::schedule::entity::CadencePolicy;
use thiserror::Error;

use crate::constants::{
    DEFAULT_BIND_ADDRESS, DEFAULT_HTTP_PORT, DEFAULT_SHUTDOWN_GRACE, DEFAULT_STATE_DIR,
    DEFAULT_WORKERS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {var}")]
    Missing { var: &'static str },

    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },

    #[error("validation failed for {field}: {message}")]
    Validation { field: String, message: String },
}

// ── Log level / format ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(format!(
                "invalid log level '{s}': expected error|warn|info|debug|trace"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "pretty" => Ok(Self::Text),
            _ => Err(format!("invalid log format '{s}': expected json|text")),
        }
    }
}

// ── Config sections ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CallbackConfig {
    /// Endpoint for per-check results.
    pub url: String,
    /// Endpoint for availability events; defaults to `url`.
    pub available_url: String,
    pub auth_token: String,
    pub timeout: Duration,
    pub max_retries: usize,
}

#[derive(Debug, Clone)]
pub struct ListApiConfig {
    pub url: String,
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct StateConfig {
    pub dir: PathBuf,
    pub snapshot_interval: Duration,
}

/// Checks-per-minute budgets per service class. The oracle classes gate
/// probes; `callback` and `list_api` gate the remote-API hosts.
#[derive(Debug, Clone, Copy)]
pub struct RateConfig {
    pub dns: f64,
    pub http: f64,
    pub rdap: f64,
    pub whois: f64,
    pub callback: f64,
    pub list_api: f64,
}

impl RateConfig {
    pub const CLASSES: [&'static str; 6] =
        ["dns", "http", "rdap", "whois", "callback", "list_api"];

    pub fn bucket(self, class: &str) -> Option<BucketConfig> {
        let rate = match class {
            "dns" => self.dns,
            "http" => self.http,
            "rdap" => self.rdap,
            "whois" => self.whois,
            "callback" => self.callback,
            "list_api" => self.list_api,
            _ => return None,
        };
        Some(BucketConfig::per_minute(rate))
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub port: u16,
    pub bind_address: String,
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub instance_id: String,
    pub callback: CallbackConfig,
    pub list_api: ListApiConfig,
    pub state: StateConfig,
    pub rates: RateConfig,
    pub t_low: Duration,
    pub t_high: Duration,
    pub t_confirmed: Duration,
    pub t_cap: Duration,
    pub workers: usize,
    /// Overall deadline for one domain's full pipeline run.
    pub check_timeout: Duration,
    pub shutdown_grace: Duration,
    pub http: HttpConfig,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::Missing { var }),
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
            var,
            message: format!("{e}"),
        }),
        None => Ok(default),
    }
}

fn secs(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(parse_or(lookup, var, default)?))
}

impl MonitorConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Load from an arbitrary lookup function (injectable for tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let callback_url = required(&lookup, "API_CALLBACK_URL")?;
        let available_url = lookup("API_AVAILABLE_CALLBACK_URL")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| callback_url.clone(), |v| v.trim().to_string());

        let config = Self {
            instance_id: lookup("INSTANCE_ID")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "default".to_string()),
            callback: CallbackConfig {
                url: callback_url,
                available_url,
                auth_token: required(&lookup, "API_AUTH_TOKEN")?,
                timeout: secs(&lookup, "API_TIMEOUT", 30)?,
                max_retries: parse_or(&lookup, "API_MAX_RETRIES", 5)?,
            },
            list_api: ListApiConfig {
                url: required(&lookup, "DOMAIN_API_URL")?,
                refresh_interval: secs(&lookup, "DOMAIN_API_REFRESH_INTERVAL", 300)?,
            },
            state: StateConfig {
                dir: PathBuf::from(
                    lookup("STATE_DIR")
                        .filter(|v| !v.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_STATE_DIR.to_string()),
                ),
                snapshot_interval: secs(&lookup, "SNAPSHOT_INTERVAL", 300)?,
            },
            rates: RateConfig {
                dns: parse_or(&lookup, "RATE_DNS", 100.0)?,
                http: parse_or(&lookup, "RATE_HTTP", 60.0)?,
                rdap: parse_or(&lookup, "RATE_RDAP", 20.0)?,
                whois: parse_or(&lookup, "RATE_WHOIS", 10.0)?,
                callback: parse_or(&lookup, "RATE_CALLBACK", 600.0)?,
                list_api: parse_or(&lookup, "RATE_LIST_API", 60.0)?,
            },
            t_low: secs(&lookup, "T_LOW", 3600)?,
            t_high: secs(&lookup, "T_HIGH", 300)?,
            t_confirmed: secs(&lookup, "T_CONFIRMED", 14_400)?,
            t_cap: secs(&lookup, "T_CAP", 86_400)?,
            workers: parse_or(&lookup, "WORKERS", DEFAULT_WORKERS)?,
            check_timeout: secs(&lookup, "CHECK_TIMEOUT", 45)?,
            shutdown_grace: secs(
                &lookup,
                "SHUTDOWN_GRACE",
                DEFAULT_SHUTDOWN_GRACE.as_secs(),
            )?,
            http: HttpConfig {
                port: parse_or(&lookup, "HTTP_PORT", DEFAULT_HTTP_PORT)?,
                bind_address: lookup("BIND_ADDRESS")
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            },
            log_level: parse_or(&lookup, "LOG_LEVEL", LogLevel::Info)?,
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Json)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check_url(field: &str, url: &str) -> Result<(), ConfigError> {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Validation {
                    field: field.to_string(),
                    message: format!("must use http:// or https:// scheme, got '{url}'"),
                });
            }
            Ok(())
        }

        check_url("API_CALLBACK_URL", &self.callback.url)?;
        check_url("API_AVAILABLE_CALLBACK_URL", &self.callback.available_url)?;
        check_url("DOMAIN_API_URL", &self.list_api.url)?;

        let token = self.callback.auth_token.to_lowercase();
        if token.len() < 8
            || token.contains("your_token")
            || token.contains("replace_me")
            || token == "token"
        {
            return Err(ConfigError::Validation {
                field: "API_AUTH_TOKEN".to_string(),
                message: "token looks like a placeholder".to_string(),
            });
        }

        if self.workers == 0 {
            return Err(ConfigError::Validation {
                field: "WORKERS".to_string(),
                message: "worker pool must have at least one worker".to_string(),
            });
        }

        if self.list_api.refresh_interval.is_zero() {
            return Err(ConfigError::Validation {
                field: "DOMAIN_API_REFRESH_INTERVAL".to_string(),
                message: "refresh interval must be > 0".to_string(),
            });
        }

        if self.state.snapshot_interval.is_zero() {
            return Err(ConfigError::Validation {
                field: "SNAPSHOT_INTERVAL".to_string(),
                message: "snapshot interval must be > 0".to_string(),
            });
        }

        self.cadence_policy()
            .validate()
            .map_err(|e| ConfigError::Validation {
                field: "T_LOW/T_HIGH/T_CONFIRMED/T_CAP".to_string(),
                message: e.to_string(),
            })?;

        for (var, rate) in [
            ("RATE_DNS", self.rates.dns),
            ("RATE_HTTP", self.rates.http),
            ("RATE_RDAP", self.rates.rdap),
            ("RATE_WHOIS", self.rates.whois),
            ("RATE_CALLBACK", self.rates.callback),
            ("RATE_LIST_API", self.rates.list_api),
        ] {
            BucketConfig::per_minute(rate)
                .validate()
                .map_err(|e| ConfigError::Validation {
                    field: var.to_string(),
                    message: e.to_string(),
                })?;
        }

        Ok(())
    }

    pub fn cadence_policy(&self) -> CadencePolicy {
        CadencePolicy {
            t_low: self.t_low,
            t_high: self.t_high,
            t_confirmed: self.t_confirmed,
            t_cap: self.t_cap,
        }
    }

    /// Copy with the auth token masked, safe for logging.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let mut sanitized = self.clone();
        sanitized.callback.auth_token = "***".to_string();
        sanitized
    }
}
