use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A recipient's opt-in for one record. `alert_preferences` is `None` when
/// the stored subscription carries no preference set at all, which is a data
/// problem distinct from an empty set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub record_id: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    pub is_subscribed: bool,
    #[serde(default)]
    pub alert_preferences: Option<BTreeSet<String>>,
}

impl Subscription {
    pub fn new(record_id: &str, recipient_id: &str, preferences: &[&str]) -> Self {
        Self {
            record_id: record_id.to_string(),
            recipient_id: Some(recipient_id.to_string()),
            is_subscribed: true,
            alert_preferences: Some(preferences.iter().map(|p| p.to_string()).collect()),
        }
    }
}
