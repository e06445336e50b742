pub mod api;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod model;
pub mod protocol;
pub mod retry;
pub mod sink;
pub mod state;
pub mod tab;
