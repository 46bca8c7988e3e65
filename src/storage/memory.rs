use super::command::StorageCommand;
use super::engine::{Change, StorageEngine};
use super::persistence::{DatabaseSnapshot, SnapshotManager};
use super::table::{Row, Table, TableSchema};
use crate::connection::ConnectionConfig;
use crate::core::{RepoError, Result};
use crate::migration::MigrationRecord;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{Level, event};

/// Process-local storage engine for one catalog.
///
/// Each commit takes the catalog write lock for its full change set, so a
/// commit is applied as a unit. Nothing spans two commits.
pub struct InMemoryStorage {
    config: ConnectionConfig,
    tables: RwLock<HashMap<String, Table>>,
    migrations: RwLock<HashMap<String, MigrationRecord>>,
}

impl InMemoryStorage {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(HashMap::new()),
            migrations: RwLock::new(HashMap::new()),
        }
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        let tables = self.tables.read()?;
        tables
            .get(table)
            .map(Table::row_count)
            .ok_or_else(|| table_not_found(table))
    }

    pub fn snapshot(&self) -> Result<DatabaseSnapshot> {
        let tables = self.tables.read()?.clone();
        let migrations = self.migrations.read()?.clone();
        Ok(DatabaseSnapshot::new(&self.config.database, tables, migrations))
    }

    fn backup(&self, catalog: &str, path: &std::path::Path) -> Result<usize> {
        if catalog != self.config.database {
            return Err(RepoError::Storage(format!(
                "Database '{}' does not exist on this connection",
                catalog
            )));
        }

        let snapshot = self.snapshot()?;
        SnapshotManager::new(path).save(&snapshot)?;
        event!(
            Level::INFO,
            catalog = %catalog,
            path = %path.display(),
            tables = snapshot.metadata.table_count,
            rows = snapshot.metadata.row_count,
            "backup written"
        );
        Ok(0)
    }
}

fn table_not_found(name: &str) -> RepoError {
    RepoError::Storage(format!("Table '{}' not found", name))
}

impl StorageEngine for InMemoryStorage {
    fn catalog(&self) -> &str {
        &self.config.database
    }

    fn ensure_table(&self, schema: &TableSchema) -> Result<()> {
        let mut tables = self.tables.write()?;
        if !tables.contains_key(schema.name()) {
            event!(Level::DEBUG, table = %schema.name(), "table created");
            tables.insert(schema.name().to_string(), Table::new(schema.clone()));
        }
        Ok(())
    }

    fn table_schema(&self, table: &str) -> Result<Option<TableSchema>> {
        let tables = self.tables.read()?;
        Ok(tables.get(table).map(|t| t.schema().clone()))
    }

    fn scan_table(&self, table: &str) -> Result<Vec<Row>> {
        let tables = self.tables.read()?;
        tables
            .get(table)
            .map(Table::scan)
            .ok_or_else(|| table_not_found(table))
    }

    fn save_changes(&self, table: &str, changes: &[Change]) -> Result<usize> {
        let mut tables = self.tables.write()?;
        let target = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        // Validate against a scratch copy so a failing change leaves the
        // table as it was.
        let mut working = target.clone();
        let mut affected = 0usize;
        for change in changes {
            let hit = match change {
                Change::Insert { row } => {
                    working.insert(row.clone())?;
                    true
                }
                Change::Update { key, row } => working.replace_by_key(key, row.clone())?,
                Change::Delete { key } => working.delete_by_key(key),
            };
            if hit {
                affected += 1;
            }
        }

        *target = working;
        Ok(affected)
    }

    fn execute_command(&self, command: &str) -> Result<usize> {
        match StorageCommand::parse(command)? {
            StorageCommand::Backup { catalog, path } => self.backup(&catalog, &path),
        }
    }

    fn apply_schema(&self, schema: &TableSchema) -> Result<()> {
        let mut tables = self.tables.write()?;
        match tables.get_mut(schema.name()) {
            Some(table) => table.reshape(schema.clone()),
            None => {
                tables.insert(schema.name().to_string(), Table::new(schema.clone()));
            }
        }
        Ok(())
    }

    fn rewrite_rows(
        &self,
        table: &str,
        migrator: &dyn Fn(&mut Row) -> Result<()>,
    ) -> Result<usize> {
        let mut tables = self.tables.write()?;
        let target = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        let mut working = target.clone();
        let visited = working.rewrite_rows(migrator)?;
        *target = working;
        Ok(visited)
    }

    fn migration_record(&self, identity_key: &str) -> Result<Option<MigrationRecord>> {
        let migrations = self.migrations.read()?;
        Ok(migrations.get(identity_key).cloned())
    }

    fn record_migration(&self, record: MigrationRecord) -> Result<()> {
        let mut migrations = self.migrations.write()?;
        migrations.insert(record.identity_key.clone(), record);
        Ok(())
    }

    fn list_tables(&self) -> Vec<String> {
        self.tables
            .read()
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }
}
