pub mod dns;
pub mod http;
pub mod rdap;
pub mod whois;

pub use dns::DnsChecker;
pub use http::HttpChecker;
pub use rdap::RdapChecker;
pub use whois::WhoisChecker;
