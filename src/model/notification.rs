use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};
use crate::model::{fields, Diff};

/// One recipient's persisted view of one change event.
///
/// Constructed through [`Notification::build`] or parsed back from its stored
/// shape; in both cases the changes are non-empty and every key is a
/// recognized property field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredNotification")]
pub struct Notification {
    record_id: String,
    created_at: i64,
    changes: Diff,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient_id: Option<String>,
    is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    read_at: Option<i64>,
}

impl Notification {
    /// Builds an unread notification for `recipient_id` from an already
    /// filtered diff.
    pub fn build(
        record_id: &str,
        created_at: i64,
        changes: Diff,
        recipient_id: Option<&str>,
    ) -> Result<Self> {
        validate_changes(&changes)?;
        Ok(Self {
            record_id: record_id.to_string(),
            created_at,
            changes,
            recipient_id: recipient_id.map(str::to_string),
            is_read: false,
            read_at: None,
        })
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn changes(&self) -> &Diff {
        &self.changes
    }

    pub fn recipient_id(&self) -> Option<&str> {
        self.recipient_id.as_deref()
    }

    pub fn is_read(&self) -> bool {
        self.is_read
    }

    pub fn read_at(&self) -> Option<i64> {
        self.read_at
    }

    pub fn to_stored(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_stored(value: &serde_json::Value) -> anyhow::Result<Self> {
        Ok(Self::deserialize(value)?)
    }
}

fn validate_changes(changes: &Diff) -> Result<()> {
    if changes.is_empty() {
        return Err(AlertError::Precondition(
            "a notification needs at least one change".to_string(),
        ));
    }
    let invalid = fields::invalid_fields(changes.keys());
    if !invalid.is_empty() {
        return Err(AlertError::FieldValidation { invalid });
    }
    Ok(())
}

/// Epoch milliseconds as written by any producer: integers are taken as is,
/// floats are rounded.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Millis(i64),
    Fractional(f64),
}

impl Timestamp {
    fn millis(self) -> i64 {
        match self {
            Timestamp::Millis(ms) => ms,
            Timestamp::Fractional(ms) => ms.round() as i64,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredNotification {
    record_id: String,
    created_at: Timestamp,
    #[serde(default)]
    changes: Option<Diff>,
    #[serde(default)]
    recipient_id: Option<String>,
    #[serde(default)]
    is_read: Option<bool>,
    #[serde(default)]
    read_at: Option<Timestamp>,
}

impl TryFrom<StoredNotification> for Notification {
    type Error = AlertError;

    fn try_from(stored: StoredNotification) -> Result<Self> {
        let changes = stored.changes.unwrap_or_default();
        validate_changes(&changes)?;
        Ok(Self {
            record_id: stored.record_id,
            created_at: stored.created_at.millis(),
            changes,
            recipient_id: stored.recipient_id,
            is_read: stored.is_read.unwrap_or(false),
            read_at: stored.read_at.map(Timestamp::millis),
        })
    }
}
