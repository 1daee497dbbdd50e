use crate::error::{AlertError, Result};
use crate::model::{Change, Diff, FieldValue, Record};

/// Computes the field-level diff from `before` to `after`.
///
/// Fields that are absent or null before and non-null after are `Added`;
/// any other difference on a field present after is `Updated`. Fields that
/// disappear are reported as `Removed` only when no field was added or
/// updated: a record that both gains and loses fields reports just the gains.
pub fn compute(before: &Record, after: &Record, record_id: &str) -> Result<Diff> {
    if record_id != after.id || after.id != before.id {
        return Err(AlertError::IdentityMismatch {
            expected: record_id.to_string(),
            before: before.id.clone(),
            after: after.id.clone(),
        });
    }

    let mut diff = Diff::new();
    if before == after {
        return Ok(diff);
    }

    for (field, new) in &after.fields {
        // An absent field reads as null.
        let old = before.get(field).cloned().unwrap_or(FieldValue::Null);
        if old.is_null() && !new.is_null() {
            diff.insert(field.clone(), Change::Added { new: new.clone() });
        } else if old != *new {
            diff.insert(field.clone(), Change::Updated { old, new: new.clone() });
        }
    }

    if diff.is_empty() {
        for (field, old) in &before.fields {
            if !after.fields.contains_key(field) {
                diff.insert(field.clone(), Change::Removed { old: old.clone() });
            }
        }
    }

    log::debug!("DIFF: record={} changes={}", record_id, diff.len());
    Ok(diff)
}
