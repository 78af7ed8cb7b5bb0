use crate::secondary::metrics_port::{
    CallbackMetrics, CheckMetrics, ListMetrics, ScheduleMetrics, StateMetrics, VerdictMetrics,
};

/// No-op implementation of all metrics sub-traits for use in tests.
///
/// All methods inherit the default no-op implementations from the sub-traits.
pub struct NoopMetrics;

impl CheckMetrics for NoopMetrics {}
impl VerdictMetrics for NoopMetrics {}
impl CallbackMetrics for NoopMetrics {}
impl ScheduleMetrics for NoopMetrics {}
impl ListMetrics for NoopMetrics {}
impl StateMetrics for NoopMetrics {}
