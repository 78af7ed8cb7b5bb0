use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;
use domain::common::entity::DomainName;
use domain::probe::entity::{CheckOutcome, CheckResult, CheckerKind};
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::RecordType;
use ports::secondary::checker::Checker;
use serde_json::json;

/// Public resolvers used for probing: Google and Cloudflare anycast.
const PROBE_NAMESERVERS: [IpAddr; 4] = [
    IpAddr::V4(std::net::Ipv4Addr::new(8, 8, 8, 8)),
    IpAddr::V4(std::net::Ipv4Addr::new(8, 8, 4, 4)),
    IpAddr::V4(std::net::Ipv4Addr::new(1, 1, 1, 1)),
    IpAddr::V4(std::net::Ipv4Addr::new(1, 0, 0, 1)),
];

/// What one DNS query said, reduced to the bits the ruleset cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
enum QuerySignal {
    Records(Vec<String>),
    NxDomain,
    /// Name exists but carries no records of the queried type.
    Empty,
    ServFail,
    Timeout,
    Failed(String),
}

/// Layer-1 DNS oracle.
///
/// Resolves NS and A/AAAA against public resolvers. Rules:
/// - NS records present ⇒ registered (delegation exists),
/// - NXDOMAIN on both NS and addresses ⇒ unregistered,
/// - SERVFAIL or timeout ⇒ inconclusive,
/// - anything else broken ⇒ error.
pub struct DnsChecker {
    resolver: TokioAsyncResolver,
}

impl DnsChecker {
    pub fn new() -> Self {
        let config = ResolverConfig::from_parts(
            None,
            vec![],
            NameServerConfigGroup::from_ips_clear(&PROBE_NAMESERVERS, 53, true),
        );
        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(2);
        opts.attempts = 2;
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }

    /// Use a caller-built resolver (tests, alternative upstreams).
    pub fn with_resolver(resolver: TokioAsyncResolver) -> Self {
        Self { resolver }
    }

    async fn probe(&self, domain: &DomainName, budget: Duration) -> CheckResult {
        let started_at = Utc::now();

        let queries = async {
            let ns = self.resolver.lookup(domain.as_str(), RecordType::NS).await;
            let addr = self.resolver.lookup_ip(domain.as_str()).await;
            (ns_signal(ns), addr_signal(addr))
        };

        let (ns, addr) = match tokio::time::timeout(budget, queries).await {
            Ok(signals) => signals,
            Err(_) => (QuerySignal::Timeout, QuerySignal::Timeout),
        };

        let (outcome, details) = fuse_signals(&ns, &addr);
        let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
        let mut result = CheckResult::new(CheckerKind::Dns, outcome, started_at)
            .with_details(details)
            .with_duration_ms(duration_ms);
        if outcome == CheckOutcome::Error {
            if let QuerySignal::Failed(ref message) = ns {
                result = result.with_error(message.clone());
            } else if let QuerySignal::Failed(ref message) = addr {
                result = result.with_error(message.clone());
            }
        }
        result
    }
}

impl Default for DnsChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker for DnsChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Dns
    }

    fn check<'a>(
        &'a self,
        domain: &'a DomainName,
        budget: Duration,
    ) -> Pin<Box<dyn Future<Output = CheckResult> + Send + 'a>> {
        Box::pin(self.probe(domain, budget))
    }
}

fn ns_signal(result: Result<hickory_resolver::lookup::Lookup, ResolveError>) -> QuerySignal {
    match result {
        Ok(lookup) => {
            let servers: Vec<String> = lookup
                .iter()
                .filter_map(|r| r.as_ns().map(|ns| ns.to_string()))
                .collect();
            if servers.is_empty() {
                QuerySignal::Empty
            } else {
                QuerySignal::Records(servers)
            }
        }
        Err(e) => error_signal(&e),
    }
}

fn addr_signal(
    result: Result<hickory_resolver::lookup_ip::LookupIp, ResolveError>,
) -> QuerySignal {
    match result {
        Ok(lookup) => {
            let addrs: Vec<String> = lookup.iter().map(|ip| ip.to_string()).collect();
            if addrs.is_empty() {
                QuerySignal::Empty
            } else {
                QuerySignal::Records(addrs)
            }
        }
        Err(e) => error_signal(&e),
    }
}

fn error_signal(error: &ResolveError) -> QuerySignal {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => match response_code {
            ResponseCode::NXDomain => QuerySignal::NxDomain,
            ResponseCode::ServFail => QuerySignal::ServFail,
            _ => QuerySignal::Empty,
        },
        ResolveErrorKind::Timeout => QuerySignal::Timeout,
        _ => QuerySignal::Failed(error.to_string()),
    }
}

/// Pure fusion of the two query signals into an outcome.
fn fuse_signals(ns: &QuerySignal, addr: &QuerySignal) -> (CheckOutcome, serde_json::Value) {
    let mut details = json!({
        "query_types": ["NS", "A", "AAAA"],
    });

    match (ns, addr) {
        // A delegation is the strongest registration signal DNS offers.
        (QuerySignal::Records(servers), _) => {
            details["nameservers"] = json!(servers);
            (CheckOutcome::Registered, details)
        }
        // No delegation, but the apex resolves: registered.
        (_, QuerySignal::Records(addrs)) => {
            details["addresses"] = json!(addrs);
            (CheckOutcome::Registered, details)
        }
        (QuerySignal::NxDomain, QuerySignal::NxDomain) => {
            details["nxdomain"] = json!(true);
            (CheckOutcome::Unregistered, details)
        }
        (QuerySignal::ServFail, _) | (_, QuerySignal::ServFail) => {
            details["reason"] = json!("servfail");
            (CheckOutcome::Inconclusive, details)
        }
        (QuerySignal::Timeout, _) | (_, QuerySignal::Timeout) => {
            details["reason"] = json!("timeout");
            (CheckOutcome::Inconclusive, details)
        }
        (QuerySignal::Failed(message), _) | (_, QuerySignal::Failed(message)) => {
            details["reason"] = json!(message);
            (CheckOutcome::Error, details)
        }
        // NXDOMAIN on one query, empty answer on the other: the zone cut is
        // ambiguous, do not claim availability from DNS alone.
        _ => {
            details["reason"] = json!("no_answer");
            (CheckOutcome::Inconclusive, details)
        }
    }
}
