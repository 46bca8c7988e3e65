use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage category of a persisted field, resolved at compile time from the
/// Rust field type through [`FieldType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Int32,
    Int64,
    Float,
    Boolean,
    Text,
    Guid,
    DateTime,
    Other,
}

impl FieldKind {
    /// Key category of a field of this kind. Only `i32`, UUID and string
    /// fields can carry an entity identifier.
    pub fn key_kind(self) -> KeyKind {
        match self {
            Self::Int32 => KeyKind::Int,
            Self::Guid => KeyKind::Guid,
            Self::Text => KeyKind::String,
            _ => KeyKind::Unsupported,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::Text => "TEXT",
            Self::Guid => "GUID",
            Self::DateTime => "DATETIME",
            Self::Other => "OTHER",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    Int,
    Guid,
    String,
    Unsupported,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Int => "Int32",
            Self::Guid => "Guid",
            Self::String => "String",
            Self::Unsupported => "Unsupported",
        };
        write!(f, "{}", name)
    }
}

/// Maps a Rust type to its [`FieldKind`].
///
/// Implemented for the primitive types an entity usually carries. Custom
/// field types implement it directly, typically with `FieldKind::Other`.
pub trait FieldType {
    const KIND: FieldKind;
}

macro_rules! impl_field_type {
    ($kind:ident: $($ty:ty),+ $(,)?) => {
        $(
            impl FieldType for $ty {
                const KIND: FieldKind = FieldKind::$kind;
            }
        )+
    };
}

impl_field_type!(Int32: i32);
impl_field_type!(Int64: i8, i16, i64, u8, u16, u32, u64, isize, usize);
impl_field_type!(Float: f32, f64);
impl_field_type!(Boolean: bool);
impl_field_type!(Text: String, char);
impl_field_type!(Guid: uuid::Uuid);
impl_field_type!(
    DateTime: chrono::DateTime<chrono::Utc>,
    chrono::NaiveDateTime,
    chrono::NaiveDate,
);
impl_field_type!(Other: serde_json::Value);

impl<T: FieldType> FieldType for Option<T> {
    const KIND: FieldKind = T::KIND;
}

impl<T> FieldType for Vec<T> {
    const KIND: FieldKind = FieldKind::Other;
}

impl<K, V> FieldType for std::collections::HashMap<K, V> {
    const KIND: FieldKind = FieldKind::Other;
}

impl<K, V> FieldType for std::collections::BTreeMap<K, V> {
    const KIND: FieldKind = FieldKind::Other;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_takes_inner_kind() {
        assert_eq!(<Option<i32> as FieldType>::KIND, FieldKind::Int32);
        assert_eq!(<Option<uuid::Uuid> as FieldType>::KIND, FieldKind::Guid);
    }

    #[test]
    fn test_only_int32_guid_and_text_are_key_kinds() {
        assert_eq!(FieldKind::Int32.key_kind(), KeyKind::Int);
        assert_eq!(FieldKind::Guid.key_kind(), KeyKind::Guid);
        assert_eq!(FieldKind::Text.key_kind(), KeyKind::String);
        assert_eq!(FieldKind::Int64.key_kind(), KeyKind::Unsupported);
        assert_eq!(FieldKind::Float.key_kind(), KeyKind::Unsupported);
    }
}
