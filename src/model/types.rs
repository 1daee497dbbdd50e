use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};

/// A single loosely typed value held by a record field.
///
/// Equality is type sensitive: `Integer(1)` and `Float(1.0)` differ, as do
/// `Bool(true)` and `Integer(1)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(FieldValue::Null),
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(FieldValue::Integer)
                .or_else(|| n.as_f64().map(FieldValue::Float)),
            serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// One version of a watched record: its identifier plus every other field
/// it carries. A field mapped to `Null` is present-but-null, which is not the
/// same as the field being absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Builds a record from a raw JSON document. The identifier is read from
    /// `id_field` and is not kept among the fields. Only scalar values are
    /// accepted.
    pub fn from_document(document: &serde_json::Value, id_field: &str) -> Result<Self> {
        let object = document.as_object().ok_or_else(|| {
            AlertError::Precondition("record document must be a JSON object".to_string())
        })?;

        let id = object
            .get(id_field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AlertError::Precondition(format!("record document has no string '{}'", id_field))
            })?
            .to_string();

        let mut fields = BTreeMap::new();
        for (name, value) in object {
            if name == id_field {
                continue;
            }
            let value = FieldValue::from_json(value).ok_or_else(|| {
                AlertError::Precondition(format!("field '{}' of record {} is not a scalar", name, id))
            })?;
            fields.insert(name.clone(), value);
        }

        Ok(Self { id, fields })
    }
}
