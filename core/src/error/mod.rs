#[allow(clippy::module_inception)]
pub mod error;
pub mod kind;

pub use error::{GatorError, HostError, TaskError};
pub use kind::{ErrorCode, ErrorKind};
