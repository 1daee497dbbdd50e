use std::{
    sync::{
        mpsc::{channel, Receiver, Sender},
        Arc, RwLock,
    },
    thread::{self, JoinHandle},
};

use anyhow::Result;

use crate::error::AlertError;
use crate::model::Record;

/// A watched record changed from `before` to `after`.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordUpdate {
    pub record_id: String,
    pub before: Record,
    pub after: Record,
}

impl RecordUpdate {
    pub fn new(record_id: &str, before: Record, after: Record) -> Self {
        Self {
            record_id: record_id.to_string(),
            before,
            after,
        }
    }

    /// Builds an update from the raw before/after documents delivered by a
    /// record store.
    pub fn from_documents(
        record_id: &str,
        before: &serde_json::Value,
        after: &serde_json::Value,
        id_field: &str,
    ) -> Result<Self, AlertError> {
        Ok(Self::new(
            record_id,
            Record::from_document(before, id_field)?,
            Record::from_document(after, id_field)?,
        ))
    }
}

/// Fans record updates out to every live observer. Clones share observers;
/// observers whose receiver was dropped are cleaned up on the next publish.
#[derive(Clone, Default)]
pub struct RecordFeed {
    senders: Arc<RwLock<Vec<Sender<RecordUpdate>>>>,
}

impl RecordFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `update` and returns how many observers received it.
    pub fn publish(&self, update: RecordUpdate) -> Result<usize> {
        let mut senders = self
            .senders
            .write()
            .map_err(|_| anyhow::anyhow!("Failed to acquire write lock"))?;
        senders.retain(|tx| tx.send(update.clone()).is_ok());
        log::debug!(
            "FEED PUBLISH: record='{}', observers={}",
            update.record_id,
            senders.len()
        );
        Ok(senders.len())
    }

    pub fn observer(&self) -> Result<Receiver<RecordUpdate>> {
        let (tx, rx) = channel();
        self.senders
            .write()
            .map_err(|_| anyhow::anyhow!("Failed to acquire write lock"))?
            .push(tx);
        Ok(rx)
    }

    /// Runs `callback` on a background thread for every update. The thread
    /// exits once every clone of the feed has been dropped.
    pub fn observe(
        &self,
        mut callback: impl FnMut(RecordUpdate) + Send + 'static,
    ) -> Result<JoinHandle<()>> {
        let rx = self.observer()?;
        Ok(thread::spawn(move || {
            rx.iter().for_each(|update| callback(update));
        }))
    }
}
