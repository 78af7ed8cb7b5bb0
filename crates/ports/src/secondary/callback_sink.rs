use std::future::Future;
use std::pin::Pin;

use domain::common::entity::DomainName;
use domain::common::error::MonitorError;
use domain::pipeline::entity::Verdict;
use domain::probe::entity::CheckResult;

/// Secondary port for the external callback API.
///
/// Two event kinds: one POST per completed oracle probe (`post_check`) and
/// one POST per availability transition (`post_availability`). Retry,
/// backoff and auth-pause policy live behind this port; callers only learn
/// the final classified outcome.
pub trait CallbackSink: Send + Sync {
    fn post_check<'a>(
        &'a self,
        domain: &'a DomainName,
        result: &'a CheckResult,
    ) -> Pin<Box<dyn Future<Output = Result<(), MonitorError>> + Send + 'a>>;

    fn post_availability<'a>(
        &'a self,
        domain: &'a DomainName,
        verdict: &'a Verdict,
    ) -> Pin<Box<dyn Future<Output = Result<(), MonitorError>> + Send + 'a>>;
}
