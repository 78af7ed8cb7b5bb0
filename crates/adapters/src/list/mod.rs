pub mod http_list_source;

pub use http_list_source::HttpListSource;
