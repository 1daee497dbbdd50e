use crate::model::{Change, Diff};
use crate::transport::PushPayload;

/// Reserved payload key carrying the record id next to the field entries.
pub const RECORD_ID_KEY: &str = "recordId";

/// One-line human readable description of a change.
pub fn describe(change: &Change) -> String {
    match change {
        Change::Removed { .. } => "Removed".to_string(),
        Change::Added { new } => format!("New Attribute: {}", new),
        Change::Updated { old, new } => format!("Updated attribute from {} to {}", old, new),
    }
}

/// Push payload for a diff: every field described, plus the record id under
/// `RECORD_ID_KEY`. A field with the reserved name is shadowed by the id.
pub fn push_payload(diff: &Diff, record_id: &str) -> PushPayload {
    let mut payload: PushPayload = diff
        .iter()
        .map(|(field, change)| (field.clone(), describe(change)))
        .collect();
    payload.insert(RECORD_ID_KEY.to_string(), record_id.to_string());
    payload
}
