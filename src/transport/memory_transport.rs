use std::sync::{Arc, RwLock};

use anyhow::Result;
use uuid::Uuid;

use crate::transport::{PushPayload, PushTransport};

#[derive(Clone, Debug, PartialEq)]
pub struct SentMessage {
    pub topic: String,
    pub payload: PushPayload,
    pub receipt: String,
}

/// Records every message instead of delivering it. Clones share the same
/// outbox.
#[derive(Clone, Default)]
pub struct InMemoryPushTransport {
    sent: Arc<RwLock<Vec<SentMessage>>>,
}

impl InMemoryPushTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Result<Vec<SentMessage>> {
        let sent = self
            .sent
            .read()
            .map_err(|_| anyhow::anyhow!("Failed to acquire read lock"))?;
        Ok(sent.clone())
    }

    pub fn topics(&self) -> Result<Vec<String>> {
        Ok(self.sent()?.into_iter().map(|m| m.topic).collect())
    }
}

impl PushTransport for InMemoryPushTransport {
    fn send(&self, topic: &str, payload: &PushPayload) -> Result<String> {
        log::debug!("PUSH SEND: topic='{}', entries={}", topic, payload.len());
        let receipt = format!("messages/{}", Uuid::now_v7());
        let mut sent = self
            .sent
            .write()
            .map_err(|_| anyhow::anyhow!("Failed to acquire write lock"))?;
        sent.push(SentMessage {
            topic: topic.to_string(),
            payload: payload.clone(),
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }
}
