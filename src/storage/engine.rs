use super::table::{Row, TableSchema};
use crate::core::Result;
use crate::migration::MigrationRecord;

/// A pending write recorded by a session and applied on commit.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Add a new row.
    Insert { row: Row },

    /// Overwrite the first row whose key equals `key` with `row`.
    Update { key: serde_json::Value, row: Row },

    /// Remove the first row whose key equals `key`.
    Delete { key: serde_json::Value },
}

/// Storage engine trait - allows pluggable storage backends.
///
/// The repository core only opens tables, fetches their rows, commits
/// change sets and issues raw commands; everything else belongs to the
/// engine.
pub trait StorageEngine: Send + Sync {
    /// Initial catalog (database) name of the connection.
    fn catalog(&self) -> &str;

    /// Create the table if it does not exist yet. Existing tables are left
    /// untouched.
    fn ensure_table(&self, schema: &TableSchema) -> Result<()>;

    /// Stored schema of a table, `None` if the table does not exist.
    fn table_schema(&self, table: &str) -> Result<Option<TableSchema>>;

    /// All rows of a table in storage order.
    fn scan_table(&self, table: &str) -> Result<Vec<Row>>;

    /// Apply a change set and return the number of rows affected. Changes
    /// that match no row count as zero.
    fn save_changes(&self, table: &str, changes: &[Change]) -> Result<usize>;

    /// Execute a raw engine command such as a backup statement.
    fn execute_command(&self, command: &str) -> Result<usize>;

    /// Create the table or reshape an existing one to `schema`.
    fn apply_schema(&self, schema: &TableSchema) -> Result<()>;

    /// Run `migrator` over every row of `table`, returning the rows visited.
    fn rewrite_rows(&self, table: &str, migrator: &dyn Fn(&mut Row) -> Result<()>)
    -> Result<usize>;

    fn migration_record(&self, identity_key: &str) -> Result<Option<MigrationRecord>>;

    fn record_migration(&self, record: MigrationRecord) -> Result<()>;

    fn list_tables(&self) -> Vec<String>;
}
