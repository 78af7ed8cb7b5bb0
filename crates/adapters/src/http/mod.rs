pub mod domains_handler;
pub mod error;
pub mod health_handler;
pub mod metrics_handler;
pub mod refresh_handler;
pub mod router;
pub mod server;
pub mod state;
pub mod status_handler;

pub use router::build_router;
pub use server::run_http_server;
pub use state::AppState;
