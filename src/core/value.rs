use crate::core::{KeyKind, RepoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Value of an entity identifier.
///
/// Keys compare by value through their JSON form, so a `Guid` and the `Text`
/// holding the same hyphenated UUID address the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Int(i32),
    Guid(Uuid),
    Text(String),
}

impl KeyValue {
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Int(_) => KeyKind::Int,
            Self::Guid(_) => KeyKind::Guid,
            Self::Text(_) => KeyKind::String,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Guid(v) => serde_json::Value::String(v.to_string()),
            Self::Text(v) => serde_json::Value::String(v.clone()),
        }
    }

    /// Reads a key of the given kind out of a stored JSON value.
    ///
    /// Returns `None` for `null` and for values of the wrong shape.
    pub fn from_json(kind: KeyKind, value: &serde_json::Value) -> Option<Self> {
        match kind {
            KeyKind::Int => value
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Self::Int),
            KeyKind::Guid => value
                .as_str()
                .and_then(|v| Uuid::parse_str(v).ok())
                .map(Self::Guid),
            KeyKind::String => value.as_str().map(|v| Self::Text(v.to_string())),
            KeyKind::Unsupported => None,
        }
    }

    pub fn matches_json(&self, value: &serde_json::Value) -> bool {
        self.to_json() == *value
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Guid(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "'{}'", v),
        }
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<Uuid> for KeyValue {
    fn from(value: Uuid) -> Self {
        Self::Guid(value)
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<&KeyValue> for KeyValue {
    fn from(value: &KeyValue) -> Self {
        value.clone()
    }
}

fn key_mismatch(expected: KeyKind, actual: &KeyValue) -> RepoError {
    RepoError::Validation(format!(
        "Key value {} cannot be read as {}",
        actual, expected
    ))
}

impl TryFrom<KeyValue> for i32 {
    type Error = RepoError;

    fn try_from(value: KeyValue) -> Result<Self> {
        match value {
            KeyValue::Int(v) => Ok(v),
            other => Err(key_mismatch(KeyKind::Int, &other)),
        }
    }
}

impl TryFrom<KeyValue> for Uuid {
    type Error = RepoError;

    fn try_from(value: KeyValue) -> Result<Self> {
        match value {
            KeyValue::Guid(v) => Ok(v),
            KeyValue::Text(ref text) => {
                Uuid::parse_str(text).map_err(|_| key_mismatch(KeyKind::Guid, &value))
            }
            other => Err(key_mismatch(KeyKind::Guid, &other)),
        }
    }
}

impl TryFrom<KeyValue> for String {
    type Error = RepoError;

    fn try_from(value: KeyValue) -> Result<Self> {
        match value {
            KeyValue::Text(v) => Ok(v),
            KeyValue::Guid(v) => Ok(v.to_string()),
            other => Err(key_mismatch(KeyKind::String, &other)),
        }
    }
}

/// Rust types usable as the explicit identifier type of a
/// [`TypedRepositoryService`](crate::TypedRepositoryService).
pub trait KeyType:
    Into<KeyValue> + TryFrom<KeyValue, Error = RepoError> + Clone + Send + Sync + 'static
{
    const KIND: KeyKind;
}

impl KeyType for i32 {
    const KIND: KeyKind = KeyKind::Int;
}

impl KeyType for Uuid {
    const KIND: KeyKind = KeyKind::Guid;
}

impl KeyType for String {
    const KIND: KeyKind = KeyKind::String;
}
