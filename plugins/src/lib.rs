pub mod factory;
pub mod host;
pub mod http_client;
pub mod services;
pub mod sink;
