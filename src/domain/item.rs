//! Transfer unit: one schemaless document

use crate::domain::{DumpError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single document moved between the store and a file.
///
/// Items are opaque ordered maps; only the `id` field (and, on upsert, the
/// partition key path) is ever looked at.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(Map<String, Value>);

impl Item {
    /// Create an item from a JSON object map
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Document id, if present and a string
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Resolve a partition key path such as `/tenant/region`
    ///
    /// Returns `None` when any segment along the path is missing.
    pub fn value_at_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.trim_start_matches('/').split('/');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Borrow the underlying fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the item and return its fields
    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    /// Compact JSON encoding of the item
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0).map_err(DumpError::from)
    }
}

impl TryFrom<Value> for Item {
    type Error = DumpError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(DumpError::Validation(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

impl From<Item> for Value {
    fn from(item: Item) -> Self {
        Value::Object(item.0)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
