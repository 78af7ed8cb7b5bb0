use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;
use domain::common::entity::DomainName;
use domain::probe::entity::{CheckOutcome, CheckResult, CheckerKind};
use ports::secondary::checker::Checker;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Registry WHOIS servers for the TLDs we most often watch. Anything else
/// goes through the IANA referral server.
const WHOIS_SERVERS: &[(&str, &str)] = &[
    ("com", "whois.verisign-grs.com"),
    ("net", "whois.verisign-grs.com"),
    ("org", "whois.publicinterestregistry.org"),
    ("info", "whois.nic.info"),
    ("biz", "whois.nic.biz"),
    ("io", "whois.nic.io"),
    ("co", "whois.nic.co"),
    ("ai", "whois.nic.ai"),
    ("dev", "whois.nic.google"),
    ("app", "whois.nic.google"),
    ("xyz", "whois.nic.xyz"),
    ("me", "whois.nic.me"),
    ("tv", "whois.nic.tv"),
    ("cc", "whois.nic.cc"),
    ("us", "whois.nic.us"),
    ("uk", "whois.nic.uk"),
    ("de", "whois.denic.de"),
    ("fr", "whois.nic.fr"),
    ("nl", "whois.domain-registry.nl"),
    ("eu", "whois.eu"),
    ("ca", "whois.cira.ca"),
];

const IANA_WHOIS: &str = "whois.iana.org";

/// Registry responses announcing that no registration exists. Wording is
/// TLD-specific; matching is case-insensitive substring.
const AVAILABLE_MARKERS: &[&str] = &[
    "no match for",
    "not found",
    "no data found",
    "no entries found",
    "domain not found",
    "domain available",
    "status: free",
    "status: available",
    "no object found",
    "object does not exist",
];

/// Response fields proving a live registration.
const REGISTERED_MARKERS: &[&str] = &["domain name:", "registrar:", "nserver:", "holder:"];

const RESPONSE_CAP: usize = 64 * 1024;

/// Layer-3 WHOIS oracle, the expensive one.
///
/// Plain TCP/43: connect to the TLD's registry server, send the name,
/// read the free-form response, pattern-match it. Only this oracle is
/// allowed to upgrade an availability verdict to confirmed.
pub struct WhoisChecker;

impl WhoisChecker {
    pub fn new() -> Self {
        Self
    }

    fn server_for(tld: &str) -> &'static str {
        WHOIS_SERVERS
            .iter()
            .find(|(t, _)| *t == tld)
            .map_or(IANA_WHOIS, |(_, server)| server)
    }

    async fn probe(&self, domain: &DomainName, budget: Duration) -> CheckResult {
        let started_at = Utc::now();
        let server = Self::server_for(domain.tld());
        let finish = |outcome: CheckOutcome, details: serde_json::Value| {
            let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
            CheckResult::new(CheckerKind::Whois, outcome, started_at)
                .with_details(details)
                .with_duration_ms(duration_ms)
        };

        let response = tokio::time::timeout(budget, query(server, domain.as_str())).await;
        match response {
            Ok(Ok(text)) => {
                let (outcome, mut details) = classify_response(&text);
                details["server"] = json!(server);
                finish(outcome, details)
            }
            Ok(Err(e)) => finish(
                CheckOutcome::Error,
                json!({ "server": server, "reason": e.to_string() }),
            ),
            Err(_) => finish(
                CheckOutcome::Inconclusive,
                json!({ "server": server, "reason": "timeout" }),
            ),
        }
    }
}

impl Default for WhoisChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker for WhoisChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Whois
    }

    fn check<'a>(
        &'a self,
        domain: &'a DomainName,
        budget: Duration,
    ) -> Pin<Box<dyn Future<Output = CheckResult> + Send + 'a>> {
        Box::pin(self.probe(domain, budget))
    }
}

/// One TCP/43 round trip: send the name, read until EOF (capped).
async fn query(server: &str, domain: &str) -> std::io::Result<String> {
    let mut stream = TcpStream::connect((server, 43)).await?;
    stream.write_all(format!("{domain}\r\n").as_bytes()).await?;
    stream.shutdown().await?;

    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        if raw.len() >= RESPONSE_CAP {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Pattern-match a WHOIS response into an outcome plus parsed fields.
fn classify_response(text: &str) -> (CheckOutcome, serde_json::Value) {
    // ASCII lowering keeps byte offsets aligned with the original text,
    // which the field extraction relies on.
    let lowered = text.to_ascii_lowercase();

    if AVAILABLE_MARKERS.iter().any(|m| lowered.contains(m)) {
        return (
            CheckOutcome::Unregistered,
            json!({ "reason": "no_match_marker" }),
        );
    }

    if REGISTERED_MARKERS.iter().any(|m| lowered.contains(m)) {
        let mut details = serde_json::Map::new();
        details.insert("reason".to_string(), json!("registration_fields"));
        if let Some(registrar) = field_value(&lowered, text, &["registrar:"]) {
            details.insert("registrar".to_string(), json!(registrar));
        }
        if let Some(created) = field_value(
            &lowered,
            text,
            &["creation date:", "created:", "registered on:"],
        ) {
            details.insert("created".to_string(), json!(created));
        }
        if let Some(expires) = field_value(
            &lowered,
            text,
            &["registry expiry date:", "expiry date:", "expires:", "expire:"],
        ) {
            details.insert("expires".to_string(), json!(expires));
        }
        return (CheckOutcome::Registered, serde_json::Value::Object(details));
    }

    (
        CheckOutcome::Inconclusive,
        json!({ "reason": "unrecognised_response" }),
    )
}

/// First value for any of `keys`, preserving the original casing.
fn field_value(lowered: &str, original: &str, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(pos) = lowered.find(key) {
            let rest = &original[pos + key.len()..];
            let value = rest.lines().next()?.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}
