pub mod http_callback;

pub use http_callback::HttpCallbackSink;
