//! Polling change notifications.

use crate::connection::{DEFAULT_CONNECTION_KEY, DataSource};
use crate::core::{RepoError, Result};
use crate::entity::{Entity, KeyResolver};
use crate::session::PersistenceSession;
use crate::storage::TableSchema;
use tracing::{Level, event};

type Callback<T> = Box<dyn FnMut(&T) + Send>;
type Filter<T> = Box<dyn Fn(&T) -> bool + Send>;

/// Invokes a callback for the current entities of a table each time it is
/// polled.
///
/// The watcher does not diff: every poll reports every entity that passes
/// the filter, including ones already reported. It holds one session open
/// for its whole lifetime.
pub struct ChangeWatcher<T: Entity> {
    session: PersistenceSession<T>,
    callback: Callback<T>,
    filter: Option<Filter<T>>,
}

impl<T: Entity> ChangeWatcher<T> {
    pub fn builder() -> ChangeWatcherBuilder<T> {
        ChangeWatcherBuilder::default()
    }

    /// Reloads the table and calls the callback for each matching entity.
    ///
    /// Returns how many times the callback ran.
    pub fn check_changes(&mut self) -> Result<usize> {
        self.session.refresh()?;
        let mut invoked = 0;
        for entity in self.session.tracked_entities()? {
            if self.filter.as_ref().is_none_or(|filter| filter(&entity)) {
                (self.callback)(&entity);
                invoked += 1;
            }
        }
        event!(
            Level::DEBUG,
            table = %self.session.table_name(),
            invoked,
            "change poll finished"
        );
        Ok(invoked)
    }

    pub fn table_name(&self) -> &str {
        self.session.table_name()
    }
}

pub struct ChangeWatcherBuilder<T: Entity> {
    callback: Option<Callback<T>>,
    filter: Option<Filter<T>>,
    connection_key: String,
    table: Option<String>,
}

impl<T: Entity> Default for ChangeWatcherBuilder<T> {
    fn default() -> Self {
        Self {
            callback: None,
            filter: None,
            connection_key: DEFAULT_CONNECTION_KEY.to_string(),
            table: None,
        }
    }
}

impl<T: Entity> ChangeWatcherBuilder<T> {
    pub fn callback(mut self, callback: impl FnMut(&T) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn filter(mut self, filter: impl Fn(&T) -> bool + Send + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn connection_key(mut self, connection_key: impl Into<String>) -> Self {
        self.connection_key = connection_key.into();
        self
    }

    /// Watch `table` instead of the entity's default table.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Opens the watcher's session.
    ///
    /// Fails with [`RepoError::Reference`] when no callback was set.
    pub fn build(self, data_source: &DataSource) -> Result<ChangeWatcher<T>> {
        let callback = self.callback.ok_or_else(|| {
            RepoError::Reference(format!(
                "ChangeWatcher for {} requires a callback",
                T::type_name()
            ))
        })?;

        let key = KeyResolver::resolve::<T>()?;
        let mut schema = TableSchema::for_entity::<T>(&key);
        if let Some(table) = self.table {
            schema = schema.renamed(table);
        }

        let engine = data_source.engine_for_key(&self.connection_key)?;
        let session = PersistenceSession::open_on(engine, &self.connection_key, schema, &key)?;
        event!(
            Level::INFO,
            entity = T::type_name(),
            table = %session.table_name(),
            filtered = self.filter.is_some(),
            "change watcher started"
        );

        Ok(ChangeWatcher {
            session,
            callback,
            filter: self.filter,
        })
    }
}
