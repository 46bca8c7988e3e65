use crate::storage::{Column, TableSchema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Migration history entry for one entity type, keyed by its identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub identity_key: String,
    pub table_name: String,
    pub schema_version: u32,
    pub columns: Vec<Column>,
    pub applied_at: DateTime<Utc>,
}

impl MigrationRecord {
    pub fn new(identity_key: impl Into<String>, schema: &TableSchema, schema_version: u32) -> Self {
        Self {
            identity_key: identity_key.into(),
            table_name: schema.name().to_string(),
            schema_version,
            columns: schema.columns().to_vec(),
            applied_at: Utc::now(),
        }
    }
}

/// Difference between a stored table and the schema a model expects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    pub create_table: bool,
    pub added_columns: Vec<String>,
    pub dropped_columns: Vec<String>,
    pub changed_columns: Vec<String>,
}

impl SchemaDiff {
    pub fn between(stored: Option<&TableSchema>, model: &TableSchema) -> Self {
        let Some(stored) = stored else {
            return Self {
                create_table: true,
                added_columns: model.columns().iter().map(|c| c.name.clone()).collect(),
                ..Self::default()
            };
        };

        let mut diff = Self::default();
        for column in model.columns() {
            match stored.get_column(&column.name) {
                None => diff.added_columns.push(column.name.clone()),
                Some(existing) if existing != column => {
                    diff.changed_columns.push(column.name.clone())
                }
                Some(_) => {}
            }
        }
        for column in stored.columns() {
            if model.get_column(&column.name).is_none() {
                diff.dropped_columns.push(column.name.clone());
            }
        }
        diff
    }

    /// True when the stored table already matches the model.
    pub fn is_compatible(&self) -> bool {
        !self.create_table
            && self.added_columns.is_empty()
            && self.dropped_columns.is_empty()
            && self.changed_columns.is_empty()
    }
}

/// Outcome of one [`MigrationRunner::migrate`](super::MigrationRunner::migrate) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub identity_key: String,
    pub table_name: String,
    pub from_version: u32,
    pub to_version: u32,
    pub diff: SchemaDiff,
    /// False when the table was already up to date and nothing ran.
    pub applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldKind;

    fn schema(columns: Vec<Column>) -> TableSchema {
        TableSchema::new("Persons", columns)
    }

    #[test]
    fn test_missing_table_diff() {
        let model = schema(vec![Column::new("id", FieldKind::Int32).key()]);
        let diff = SchemaDiff::between(None, &model);
        assert!(diff.create_table);
        assert_eq!(diff.added_columns, vec!["id".to_string()]);
        assert!(!diff.is_compatible());
    }

    #[test]
    fn test_column_level_diff() {
        let stored = schema(vec![
            Column::new("id", FieldKind::Int32).key(),
            Column::new("age", FieldKind::Int32),
            Column::new("nick", FieldKind::Text),
        ]);
        let model = schema(vec![
            Column::new("id", FieldKind::Int32).key(),
            Column::new("age", FieldKind::Int64),
            Column::new("email", FieldKind::Text),
        ]);
        let diff = SchemaDiff::between(Some(&stored), &model);
        assert_eq!(diff.added_columns, vec!["email".to_string()]);
        assert_eq!(diff.dropped_columns, vec!["nick".to_string()]);
        assert_eq!(diff.changed_columns, vec!["age".to_string()]);
    }

    #[test]
    fn test_identical_schemas_are_compatible() {
        let model = schema(vec![Column::new("id", FieldKind::Guid).key()]);
        assert!(SchemaDiff::between(Some(&model.clone()), &model).is_compatible());
    }
}
