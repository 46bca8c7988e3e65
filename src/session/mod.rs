//! Scoped storage sessions.
//!
//! A [`PersistenceSession`] is a short-lived view of one entity table: it
//! loads rows lazily, records pending changes and applies them on
//! [`save_changes`](PersistenceSession::save_changes). It is released when
//! dropped, on every exit path.

use crate::connection::DataSource;
use crate::core::{KeyValue, Result};
use crate::entity::row::{from_row, row_key, to_row};
use crate::entity::{Entity, KeyDescriptor};
use crate::storage::{Change, Row, StorageEngine, TableSchema};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{Level, event};

pub struct PersistenceSession<T: Entity> {
    connection_key: String,
    schema: TableSchema,
    key: KeyDescriptor,
    engine: Arc<dyn StorageEngine>,
    tracked: Option<Vec<Row>>,
    pending: Vec<Change>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> PersistenceSession<T> {
    /// Opens a session for `T` on the connection named `connection_key`.
    pub fn open(
        data_source: &DataSource,
        connection_key: &str,
        key: &KeyDescriptor,
    ) -> Result<Self> {
        let engine = data_source.engine_for_key(connection_key)?;
        Self::open_on(engine, connection_key, TableSchema::for_entity::<T>(key), key)
    }

    /// Opens a session on an already resolved engine and table.
    ///
    /// The table is created when missing; an existing table keeps its
    /// stored shape.
    pub fn open_on(
        engine: Arc<dyn StorageEngine>,
        connection_key: &str,
        schema: TableSchema,
        key: &KeyDescriptor,
    ) -> Result<Self> {
        engine.ensure_table(&schema)?;
        event!(
            Level::TRACE,
            connection = %connection_key,
            table = %schema.name(),
            "session opened"
        );
        Ok(Self {
            connection_key: connection_key.to_string(),
            schema,
            key: key.clone(),
            engine,
            tracked: None,
            pending: Vec::new(),
            _entity: PhantomData,
        })
    }

    pub fn connection_key(&self) -> &str {
        &self.connection_key
    }

    pub fn table_name(&self) -> &str {
        self.schema.name()
    }

    pub fn catalog(&self) -> &str {
        self.engine.catalog()
    }

    pub fn key_descriptor(&self) -> &KeyDescriptor {
        &self.key
    }

    /// Entities of the table, materialized one by one while iterating.
    ///
    /// The iterator borrows the session and cannot outlive it; collect the
    /// results to keep them.
    pub fn entities(&mut self) -> Result<impl Iterator<Item = Result<T>> + '_> {
        let rows = self.load()?;
        Ok(rows.iter().map(from_row::<T>))
    }

    pub fn find_first(&mut self, predicate: impl Fn(&T) -> bool) -> Result<Option<T>> {
        for entity in self.entities()? {
            let entity = entity?;
            if predicate(&entity) {
                return Ok(Some(entity));
            }
        }
        Ok(None)
    }

    /// First entity whose key equals `id`, compared by value.
    pub fn find_by_key(&mut self, id: &KeyValue) -> Result<Option<T>> {
        let key_name = self.key.property_name().to_string();
        let rows = self.load()?;
        rows.iter()
            .find(|row| row.get(&key_name).is_some_and(|value| id.matches_json(value)))
            .map(from_row::<T>)
            .transpose()
    }

    /// Stage `entity` as added.
    pub fn add(&mut self, entity: &T) -> Result<()> {
        let row = to_row(entity)?;
        if let Some(tracked) = self.tracked.as_mut() {
            tracked.push(row.clone());
        }
        self.pending.push(Change::Insert { row });
        Ok(())
    }

    /// Stage `entity` as modified. On commit every column of the stored row
    /// is overwritten.
    pub fn attach_modified(&mut self, entity: &T) -> Result<()> {
        let row = to_row(entity)?;
        let key = row_key(&row, &self.key).unwrap_or(serde_json::Value::Null);
        self.stage_update(key, row);
        Ok(())
    }

    /// Stage a full overwrite of the row holding `target` with `entity`.
    pub fn replace(&mut self, target: &T, entity: &T) -> Result<()> {
        let target_row = to_row(target)?;
        let key = row_key(&target_row, &self.key).unwrap_or(serde_json::Value::Null);
        self.stage_update(key, to_row(entity)?);
        Ok(())
    }

    /// Stage `entity` as removed.
    pub fn remove(&mut self, entity: &T) -> Result<()> {
        let row = to_row(entity)?;
        let key = row_key(&row, &self.key).unwrap_or(serde_json::Value::Null);
        if let Some(tracked) = self.tracked.as_mut()
            && let Some(pos) = position_by_key(tracked, &self.key, &key)
        {
            tracked.remove(pos);
        }
        self.pending.push(Change::Delete { key });
        Ok(())
    }

    pub fn pending_changes(&self) -> &[Change] {
        &self.pending
    }

    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Reloads the tracked rows from storage. Pending changes stay queued.
    pub fn refresh(&mut self) -> Result<()> {
        self.tracked = Some(self.engine.scan_table(self.schema.name())?);
        Ok(())
    }

    /// Entities currently tracked by the session, loading them on first use.
    pub fn tracked_entities(&mut self) -> Result<Vec<T>> {
        self.entities()?.collect()
    }

    /// Commits pending changes and returns the number of rows affected.
    ///
    /// A change that matches no row contributes nothing, so a commit of a
    /// missing target reports zero. On error the changes stay pending.
    pub fn save_changes(&mut self) -> Result<usize> {
        let changes = std::mem::take(&mut self.pending);
        match self.engine.save_changes(self.schema.name(), &changes) {
            Ok(affected) => {
                event!(
                    Level::DEBUG,
                    table = %self.schema.name(),
                    changes = changes.len(),
                    affected,
                    "changes committed"
                );
                self.tracked = None;
                Ok(affected)
            }
            Err(err) => {
                event!(Level::WARN, table = %self.schema.name(), error = %err, "commit failed");
                self.pending = changes;
                Err(err)
            }
        }
    }

    /// Issues a raw command against the session's engine.
    pub fn execute_command(&self, command: &str) -> Result<usize> {
        self.engine.execute_command(command)
    }

    fn load(&mut self) -> Result<&mut Vec<Row>> {
        if self.tracked.is_none() {
            self.refresh()?;
        }
        Ok(self.tracked.get_or_insert_with(Vec::new))
    }

    fn stage_update(&mut self, key: serde_json::Value, row: Row) {
        if let Some(tracked) = self.tracked.as_mut()
            && let Some(pos) = position_by_key(tracked, &self.key, &key)
        {
            tracked[pos] = row.clone();
        }
        self.pending.push(Change::Update { key, row });
    }
}

impl<T: Entity> Drop for PersistenceSession<T> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            event!(
                Level::WARN,
                table = %self.schema.name(),
                discarded = self.pending.len(),
                "session released with uncommitted changes"
            );
        }
        event!(Level::TRACE, table = %self.schema.name(), "session released");
    }
}

fn position_by_key(rows: &[Row], key: &KeyDescriptor, value: &serde_json::Value) -> Option<usize> {
    rows.iter()
        .position(|row| row.get(key.property_name()) == Some(value))
}
