pub mod bus;
pub mod messages;

pub use bus::{MessageBus, ResultListeners};
pub use messages::{Message, Reply};
