use super::record::{MigrationRecord, MigrationReport, SchemaDiff};
use crate::connection::DataSource;
use crate::core::Result;
use crate::entity::{Entity, KeyResolver, migration_identity_key};
use crate::storage::{Column, TableSchema};
use tracing::{Level, event, info_span};

/// Brings one entity type's table up to date on a given connection.
///
/// Each call targets exactly one table; migrating several entity types is
/// several independent calls with no shared transaction.
pub struct MigrationRunner;

impl MigrationRunner {
    /// Key under which the migration history of `T` is recorded.
    pub fn identity_key<T: Entity>() -> String {
        migration_identity_key(T::type_path())
    }

    /// Compares the stored table of `T` with its model schema and migration
    /// plan, and applies what is missing.
    ///
    /// Version baseline: the recorded history version when present;
    /// otherwise the plan's current version for a missing table or one that
    /// already matches the model, and version 1 for an existing table that
    /// differs from it. Tables recorded ahead of the plan are left alone.
    pub fn migrate<T: Entity>(
        data_source: &DataSource,
        connection_string: &str,
    ) -> Result<MigrationReport> {
        let key = KeyResolver::resolve::<T>()?;
        let model = TableSchema::for_entity::<T>(&key);
        let plan = T::migration_plan();
        plan.validate()?;

        let engine = data_source.engine_for_connection_string(connection_string)?;
        let identity_key = Self::identity_key::<T>();

        let span = info_span!(
            "migration.run",
            identity_key = %identity_key,
            table = %model.name(),
            catalog = %engine.catalog()
        );
        let _enter = span.enter();

        let stored = engine.table_schema(model.name())?;
        let history = engine.migration_record(&identity_key)?;
        let diff = SchemaDiff::between(stored.as_ref(), &model);
        let target = plan.current_version();

        let from_version = match &history {
            Some(record) => record.schema_version,
            None if stored.is_none() || diff.is_compatible() => target,
            None => 1,
        };

        let report = |applied: bool, diff: SchemaDiff| MigrationReport {
            identity_key: identity_key.clone(),
            table_name: model.name().to_string(),
            from_version,
            to_version: target,
            diff,
            applied,
        };

        if from_version > target {
            event!(
                Level::WARN,
                stored_version = from_version,
                plan_version = target,
                "table is ahead of the migration plan; skipped"
            );
            return Ok(report(false, diff));
        }

        if history.is_some() && diff.is_compatible() && from_version == target {
            event!(Level::DEBUG, version = target, "schema up to date");
            return Ok(report(false, diff));
        }

        // Row migrators see both the old and the new columns; dropped columns
        // go only after the whole chain ran.
        let chain = plan.resolve_chain(from_version)?;
        engine.apply_schema(&widened(stored.as_ref(), &model))?;
        for step in chain {
            if let Some(migrator) = step.row_migrator() {
                let rows = engine.rewrite_rows(model.name(), &**migrator)?;
                event!(
                    Level::DEBUG,
                    from = step.from_version,
                    to = step.to_version,
                    rows,
                    "row migration step applied"
                );
            }
        }
        engine.apply_schema(&model)?;
        engine.record_migration(MigrationRecord::new(&identity_key, &model, target))?;

        event!(
            Level::INFO,
            from_version,
            to_version = target,
            added = diff.added_columns.len(),
            dropped = diff.dropped_columns.len(),
            "migration applied"
        );
        Ok(report(true, diff))
    }
}

/// Model schema extended with the stored columns it no longer declares.
fn widened(stored: Option<&TableSchema>, model: &TableSchema) -> TableSchema {
    let mut columns = model.columns().to_vec();
    if let Some(stored) = stored {
        columns.extend(
            stored
                .columns()
                .iter()
                .filter(|column| model.get_column(&column.name).is_none())
                .map(|column| Column::new(column.name.clone(), column.kind)),
        );
    }
    TableSchema::new(model.name(), columns)
}
