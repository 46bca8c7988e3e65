/// Namespace segment of migration identity keys.
pub const MIGRATION_NAMESPACE: &str = "memorepo";

/// Context segment of migration identity keys.
pub const MIGRATION_CONTEXT_NAME: &str = "PersistenceSession";

/// Table name for an entity type: the type name plus `s`.
///
/// No irregular plurals: `Person` maps to `Persons`.
pub fn default_table_name(type_name: &str) -> String {
    format!("{}s", type_name)
}

/// Key that disambiguates per-entity-type migration history.
///
/// Format: ``memorepo.PersistenceSession`1[<type path>]``
pub fn migration_identity_key(type_path: &str) -> String {
    format!(
        "{}.{}`1[{}]",
        MIGRATION_NAMESPACE, MIGRATION_CONTEXT_NAME, type_path
    )
}
