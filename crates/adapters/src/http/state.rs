use std::sync::Arc;

use application::monitor::MonitorHandle;
use infrastructure::metrics::MonitorMetrics;

/// Shared application state for the ops API server.
///
/// Passed to Axum handlers via `State(Arc<AppState>)`. The handle is a
/// read-only view of the running monitor plus the manual-refresh trigger;
/// handlers never mutate the registry directly.
pub struct AppState {
    pub handle: MonitorHandle,
    pub metrics: Arc<MonitorMetrics>,
    pub version: &'static str,
}

impl AppState {
    pub fn new(handle: MonitorHandle, metrics: Arc<MonitorMetrics>) -> Self {
        Self {
            handle,
            metrics,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
