use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

/// Flat string-to-string data carried by a push message.
pub type PushPayload = BTreeMap<String, String>;

/// Topic-based push delivery. Each call is independent; the transport owns
/// any retry or ordering policy.
pub trait PushTransport: Send + Sync {
    /// Sends `payload` to every device subscribed to `topic` and returns the
    /// transport's receipt for the message.
    fn send(&self, topic: &str, payload: &PushPayload) -> Result<String>;
}

impl<T: PushTransport + ?Sized> PushTransport for Arc<T> {
    fn send(&self, topic: &str, payload: &PushPayload) -> Result<String> {
        (**self).send(topic, payload)
    }
}
