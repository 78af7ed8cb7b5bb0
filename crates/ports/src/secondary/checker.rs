use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use domain::common::entity::DomainName;
use domain::probe::entity::{CheckResult, CheckerKind};

/// Secondary port for a single availability oracle.
///
/// A checker is infallible at the type level: transport failures, parse
/// failures and timeouts all map into the result's `outcome`
/// (`Inconclusive`/`Error`) so nothing propagates past the pipeline.
///
/// Uses `Pin<Box<dyn Future>>` (instead of RPITIT) so the trait is
/// dyn-compatible and checkers can live behind `Arc<dyn Checker>`.
pub trait Checker: Send + Sync {
    /// Which oracle this is; also selects the rate-limit class.
    fn kind(&self) -> CheckerKind;

    /// Probe one domain. `budget` bounds the whole probe including
    /// connection setup; implementations must not block past it.
    fn check<'a>(
        &'a self,
        domain: &'a DomainName,
        budget: Duration,
    ) -> Pin<Box<dyn Future<Output = CheckResult> + Send + 'a>>;
}
