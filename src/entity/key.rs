use super::{Entity, FieldDescriptor};
use crate::core::{KeyKind, RepoError, Result};

pub const INVALID_KEY_MESSAGE: &str =
    "Primary Key must be Int32, Guid, or String and named with ID in it";

/// Resolved identifier field of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    property_name: String,
    property_type: KeyKind,
}

impl KeyDescriptor {
    pub fn new(property_name: impl Into<String>, property_type: KeyKind) -> Self {
        Self {
            property_name: property_name.into(),
            property_type,
        }
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    pub fn property_type(&self) -> KeyKind {
        self.property_type
    }

    /// True when the descriptor names a usable identifier: the name contains
    /// `id` (any case) and the type is `Int`, `Guid` or `String`.
    pub fn is_valid(&self) -> bool {
        self.property_name.to_ascii_lowercase().contains("id")
            && self.property_type != KeyKind::Unsupported
    }
}

pub struct KeyResolver;

impl KeyResolver {
    /// Resolves and validates the key of `T`.
    pub fn resolve<T: Entity>() -> Result<KeyDescriptor> {
        Self::resolve_fields(&T::fields())
    }

    /// Picks the field marked as key, else the first declared field.
    ///
    /// The positional fallback is intentional: callers relying on it depend
    /// on field declaration order, not on the field being called `id`.
    pub fn resolve_fields(fields: &[FieldDescriptor]) -> Result<KeyDescriptor> {
        let field = fields
            .iter()
            .find(|field| field.key)
            .or_else(|| fields.first())
            .ok_or_else(|| RepoError::Validation(INVALID_KEY_MESSAGE.to_string()))?;

        let descriptor = KeyDescriptor::new(field.name, field.kind.key_kind());
        if !descriptor.is_valid() {
            return Err(RepoError::Validation(INVALID_KEY_MESSAGE.to_string()));
        }

        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldKind;

    #[test]
    fn test_marked_key_wins_over_position() {
        let fields = vec![
            FieldDescriptor::new("name", FieldKind::Text),
            FieldDescriptor::new("CustomerId", FieldKind::Guid).key(),
        ];
        let key = KeyResolver::resolve_fields(&fields).unwrap();
        assert_eq!(key.property_name(), "CustomerId");
        assert_eq!(key.property_type(), KeyKind::Guid);
    }

    #[test]
    fn test_first_declared_field_is_fallback() {
        let fields = vec![
            FieldDescriptor::new("Code_ID", FieldKind::Text),
            FieldDescriptor::new("id", FieldKind::Int32),
        ];
        let key = KeyResolver::resolve_fields(&fields).unwrap();
        assert_eq!(key.property_name(), "Code_ID");
        assert_eq!(key.property_type(), KeyKind::String);
    }

    #[test]
    fn test_first_field_without_id_in_name_is_rejected() {
        let fields = vec![
            FieldDescriptor::new("name", FieldKind::Text),
            FieldDescriptor::new("id", FieldKind::Int32),
        ];
        let err = KeyResolver::resolve_fields(&fields).unwrap_err();
        match err {
            RepoError::Validation(msg) => assert_eq!(msg, INVALID_KEY_MESSAGE),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_key_types_are_rejected() {
        for kind in [FieldKind::Int64, FieldKind::Float, FieldKind::Boolean] {
            let fields = vec![FieldDescriptor::new("id", kind)];
            assert!(matches!(
                KeyResolver::resolve_fields(&fields),
                Err(RepoError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_no_fields_is_rejected() {
        assert!(matches!(
            KeyResolver::resolve_fields(&[]),
            Err(RepoError::Validation(_))
        ));
    }
}
