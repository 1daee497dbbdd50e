use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AlertError;
use crate::model::FieldValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

/// A single field's transition between two versions of a record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "StoredChange", try_from = "StoredChange")]
pub enum Change {
    Added { new: FieldValue },
    Updated { old: FieldValue, new: FieldValue },
    Removed { old: FieldValue },
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Added { .. } => ChangeKind::Added,
            Change::Updated { .. } => ChangeKind::Updated,
            Change::Removed { .. } => ChangeKind::Removed,
        }
    }

    pub fn old_value(&self) -> Option<&FieldValue> {
        match self {
            Change::Added { .. } => None,
            Change::Updated { old, .. } | Change::Removed { old } => Some(old),
        }
    }

    pub fn new_value(&self) -> Option<&FieldValue> {
        match self {
            Change::Added { new } | Change::Updated { new, .. } => Some(new),
            Change::Removed { .. } => None,
        }
    }
}

/// Persisted shape of a `Change`. Null and absent values are both omitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredChange {
    kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    old_value: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new_value: Option<FieldValue>,
}

fn sparse(value: Option<&FieldValue>) -> Option<FieldValue> {
    value.filter(|v| !v.is_null()).cloned()
}

impl From<Change> for StoredChange {
    fn from(change: Change) -> Self {
        StoredChange {
            kind: change.kind(),
            old_value: sparse(change.old_value()),
            new_value: sparse(change.new_value()),
        }
    }
}

impl TryFrom<StoredChange> for Change {
    type Error = AlertError;

    fn try_from(stored: StoredChange) -> Result<Self, Self::Error> {
        match stored.kind {
            ChangeKind::Added => {
                if stored.old_value.is_some() {
                    return Err(AlertError::InvalidChange(
                        "added change carries an oldValue".to_string(),
                    ));
                }
                let new = stored.new_value.ok_or_else(|| {
                    AlertError::InvalidChange("added change has no newValue".to_string())
                })?;
                Ok(Change::Added { new })
            }
            ChangeKind::Updated => Ok(Change::Updated {
                old: stored.old_value.unwrap_or(FieldValue::Null),
                new: stored.new_value.unwrap_or(FieldValue::Null),
            }),
            ChangeKind::Removed => {
                if stored.new_value.is_some() {
                    return Err(AlertError::InvalidChange(
                        "removed change carries a newValue".to_string(),
                    ));
                }
                Ok(Change::Removed {
                    old: stored.old_value.unwrap_or(FieldValue::Null),
                })
            }
        }
    }
}

/// Field name to `Change` for one change event. Keys are kept sorted so
/// iteration is deterministic; nothing downstream depends on the order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diff(BTreeMap<String, Change>);

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, change: Change) {
        self.0.insert(field.into(), change);
    }

    pub fn get(&self, field: &str) -> Option<&Change> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Change)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Change)> for Diff {
    fn from_iter<I: IntoIterator<Item = (String, Change)>>(iter: I) -> Self {
        Diff(iter.into_iter().collect())
    }
}

impl IntoIterator for Diff {
    type Item = (String, Change);
    type IntoIter = std::collections::btree_map::IntoIter<String, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
