//! Entity contracts: the metadata a type exposes so the repository can
//! persist it without per-entity code.

pub mod key;
pub mod naming;
pub(crate) mod row;

pub use key::{INVALID_KEY_MESSAGE, KeyDescriptor, KeyResolver};
pub use naming::{
    MIGRATION_CONTEXT_NAME, MIGRATION_NAMESPACE, default_table_name, migration_identity_key,
};

use crate::core::{FieldKind, FieldType};
use crate::migration::MigrationPlan;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Describes one declared field of an entity, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Column name: the field's serde name, after `rename` and `rename_all`.
    pub name: &'static str,
    pub kind: FieldKind,
    /// Explicitly designated as the entity identifier.
    pub key: bool,
    /// Excluded from persistence. The derive only accepts this on fields
    /// that load without a stored value: `Option`, `#[serde(default)]` or
    /// `#[serde(skip)]`.
    pub not_mapped: bool,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            key: false,
            not_mapped: false,
        }
    }

    /// Descriptor whose kind is taken from the Rust type `F`.
    pub fn of<F: FieldType>(name: &'static str) -> Self {
        Self::new(name, F::KIND)
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn not_mapped(mut self) -> Self {
        self.not_mapped = true;
        self
    }
}

/// Core trait for types persisted through a repository.
///
/// Normally implemented with `#[derive(Entity)]`:
///
/// ```
/// use memorepo::Entity;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
/// struct Person {
///     #[entity(key)]
///     id: i32,
///     name: String,
/// }
///
/// assert_eq!(Person::table_name(), "Persons");
/// ```
///
/// Column names are the serialized names:
///
/// ```
/// use memorepo::Entity;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Entity)]
/// #[serde(rename_all = "PascalCase")]
/// struct Person {
///     id: i32,
///     name: String,
/// }
///
/// let names: Vec<_> = Person::fields().iter().map(|f| f.name).collect();
/// assert_eq!(names, ["Id", "Name"]);
/// ```
///
/// A not-mapped field that could not be loaded back is rejected:
///
/// ```compile_fail
/// use memorepo::Entity;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Entity)]
/// struct Account {
///     id: i32,
///     #[entity(not_mapped)]
///     cache: String,
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + 'static {
    /// Short type name used for table naming.
    fn type_name() -> &'static str;

    /// Declared fields in declaration order. The order matters: without an
    /// explicit key the first field is taken as the identifier.
    fn fields() -> Vec<FieldDescriptor>;

    fn table_name() -> String {
        default_table_name(Self::type_name())
    }

    /// Fully qualified type path, used to build the migration identity key.
    fn type_path() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn schema_version() -> u32 {
        1
    }

    fn migration_plan() -> MigrationPlan {
        MigrationPlan::new(Self::schema_version())
    }
}
