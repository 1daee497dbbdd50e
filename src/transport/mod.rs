mod memory_transport;
mod push_transport;

pub use memory_transport::{InMemoryPushTransport, SentMessage};
pub use push_transport::{PushPayload, PushTransport};
