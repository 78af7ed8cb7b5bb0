use std::future::Future;
use std::pin::Pin;

use domain::common::error::MonitorError;
use domain::registry::entity::MonitoredDomain;

/// Secondary port for state persistence.
///
/// `save` must be atomic: a concurrent reader observes either the previous
/// or the new snapshot, never a partial blend. The in-flight set and rate
/// limiter state are intentionally outside the snapshot.
pub trait StateStore: Send + Sync {
    /// Load the last snapshot. Missing state is an empty vec, corruption
    /// is handled inside the adapter (quarantine + empty start); only I/O
    /// errors on an intact file surface as `Persistence`.
    fn load<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<MonitoredDomain>, MonitorError>> + Send + 'a>>;

    fn save<'a>(
        &'a self,
        domains: &'a [MonitoredDomain],
    ) -> Pin<Box<dyn Future<Output = Result<(), MonitorError>> + Send + 'a>>;

    /// Cheap probe backing `/health`: can we still write the state dir?
    fn is_writable<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}
