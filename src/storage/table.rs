use crate::core::{FieldKind, RepoError, Result};
use crate::entity::{Entity, KeyDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored row: column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: FieldKind,
    pub key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            key: false,
        }
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Schema of the table backing `T`: every declared field except the
    /// ones excluded from persistence, with the resolved key flagged. The
    /// key column is always kept.
    pub fn for_entity<T: Entity>(key: &KeyDescriptor) -> Self {
        let columns = T::fields()
            .into_iter()
            .filter_map(|field| {
                let is_key = field.name == key.property_name();
                if field.not_mapped && !is_key {
                    return None;
                }
                let column = Column::new(field.name, field.kind);
                Some(if is_key { column.key() } else { column })
            })
            .collect();
        Self::new(T::table_name(), columns)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same columns under another table name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn key_column(&self) -> Option<&Column> {
        self.columns.iter().find(|col| col.key)
    }
}

/// Rows of one table, kept in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<u64, Row>,
    next_row_id: u64,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 0,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn scan(&self) -> Vec<Row> {
        self.rows.values().cloned().collect()
    }

    pub fn insert(&mut self, row: Row) -> Result<u64> {
        let row = self.conform(row)?;
        let id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(id, row);
        Ok(id)
    }

    /// Overwrites the first row whose key equals `key`. Every column is
    /// written, not only the changed ones.
    pub fn replace_by_key(&mut self, key: &serde_json::Value, row: Row) -> Result<bool> {
        let row = self.conform(row)?;
        let Some(id) = self.find_by_key(key) else {
            return Ok(false);
        };
        self.rows.insert(id, row);
        Ok(true)
    }

    /// Removes the first row whose key equals `key`.
    pub fn delete_by_key(&mut self, key: &serde_json::Value) -> bool {
        match self.find_by_key(key) {
            Some(id) => self.rows.remove(&id).is_some(),
            None => false,
        }
    }

    /// Reshapes the table to `schema`: new columns are filled with `null`,
    /// dropped columns are removed from every row.
    pub fn reshape(&mut self, schema: TableSchema) {
        for row in self.rows.values_mut() {
            row.retain(|name, _| schema.get_column(name).is_some());
            for column in schema.columns() {
                row.entry(column.name.clone())
                    .or_insert(serde_json::Value::Null);
            }
        }
        self.schema = schema;
    }

    /// Applies `migrator` to every row, in order. Returns the number of rows
    /// visited.
    pub fn rewrite_rows(
        &mut self,
        migrator: &dyn Fn(&mut Row) -> Result<()>,
    ) -> Result<usize> {
        for row in self.rows.values_mut() {
            migrator(row)?;
        }
        Ok(self.rows.len())
    }

    fn find_by_key(&self, key: &serde_json::Value) -> Option<u64> {
        let key_column = self.schema.key_column()?;
        self.rows
            .iter()
            .find(|(_, row)| row.get(&key_column.name) == Some(key))
            .map(|(id, _)| *id)
    }

    /// Keeps only known columns, fills missing ones with `null` and rejects a
    /// missing key.
    fn conform(&self, mut row: Row) -> Result<Row> {
        row.retain(|name, _| self.schema.get_column(name).is_some());
        for column in self.schema.columns() {
            let value = row
                .entry(column.name.clone())
                .or_insert(serde_json::Value::Null);
            if column.key && value.is_null() {
                return Err(RepoError::Storage(format!(
                    "Key column '{}' of table '{}' cannot be NULL",
                    column.name, self.schema.name
                )));
            }
        }
        Ok(row)
    }
}
