//! Conversion between entities and stored rows.

use super::{Entity, KeyDescriptor};
use crate::core::{KeyValue, RepoError, Result};
use crate::storage::Row;

pub(crate) fn to_row<T: Entity>(entity: &T) -> Result<Row> {
    match serde_json::to_value(entity)? {
        serde_json::Value::Object(row) => Ok(row),
        other => Err(RepoError::Serialization(format!(
            "Entity '{}' must serialize to an object, got {}",
            T::type_name(),
            json_type_name(&other)
        ))),
    }
}

pub(crate) fn from_row<T: Entity>(row: &Row) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::Object(row.clone()))?)
}

/// Stored key of a row, `None` when absent or `null`.
pub(crate) fn row_key(row: &Row, key: &KeyDescriptor) -> Option<serde_json::Value> {
    row.get(key.property_name())
        .filter(|value| !value.is_null())
        .cloned()
}

pub(crate) fn key_of<T: Entity>(entity: &T, key: &KeyDescriptor) -> Result<Option<KeyValue>> {
    let row = to_row(entity)?;
    Ok(row
        .get(key.property_name())
        .and_then(|value| KeyValue::from_json(key.property_type(), value)))
}

/// Returns `entity` with its key field set to `value`.
pub(crate) fn with_key<T: Entity>(entity: T, key: &KeyDescriptor, value: &KeyValue) -> Result<T> {
    let mut row = to_row(&entity)?;
    row.insert(key.property_name().to_string(), value.to_json());
    from_row(&row)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
