pub mod http;

pub use http::HttpBrowserHost;
