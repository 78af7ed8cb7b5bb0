use std::time::Duration;

/// Default ops API port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default bind address: localhost only. Set `BIND_ADDRESS=0.0.0.0` for
/// container deployments.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Default state directory.
pub const DEFAULT_STATE_DIR: &str = "/var/lib/domainwatch";

/// Worker pool size when `WORKERS` is unset.
pub const DEFAULT_WORKERS: usize = 8;

/// How long the monitor waits for in-flight checks on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
