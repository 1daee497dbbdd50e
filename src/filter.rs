use std::collections::BTreeSet;

use crate::error::{AlertError, Result};
use crate::model::Diff;

/// Restricts `diff` to the fields a subscriber asked to be alerted about.
///
/// A missing preference set means the subscription record is broken and is
/// reported rather than treated as "no preferences".
pub fn filter(diff: &Diff, preferences: Option<&BTreeSet<String>>) -> Result<Diff> {
    let preferences = preferences.ok_or_else(|| {
        AlertError::Precondition("alertPreferences missing on an active subscription".to_string())
    })?;

    Ok(diff
        .iter()
        .filter(|(field, _)| preferences.contains(*field))
        .map(|(field, change)| (field.clone(), change.clone()))
        .collect())
}
