pub mod callback_sink;
pub mod checker;
pub mod list_source;
pub mod metrics_port;
pub mod state_store;
