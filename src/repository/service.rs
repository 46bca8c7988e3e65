use crate::connection::{ConnectionConfig, DEFAULT_CONNECTION_KEY, DataSource};
use crate::core::{KeyKind, KeyValue, RepoError, Result};
use crate::entity::row::{key_of, with_key};
use crate::entity::{Entity, KeyDescriptor, KeyResolver};
use crate::migration::{MigrationReport, MigrationRunner};
use crate::session::PersistenceSession;
use crate::storage::{TableSchema, backup_command};
use chrono::Utc;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{Level, event, info_span};
use uuid::Uuid;

/// Generic CRUD surface for entity type `T`.
///
/// The service holds no session and no lock. Every call opens its own
/// [`PersistenceSession`], commits, and releases it before returning, so
/// one instance can be shared between threads.
///
/// Integer keys are generated as `get_all().len() + 1` in a separate read
/// before the insert commits. Two concurrent inserts can therefore compute
/// the same key, and an insert after a delete can reuse a live key; the
/// storage layer does not reject duplicates.
pub struct RepositoryService<T: Entity> {
    data_source: DataSource,
    connection_key: String,
    key: KeyDescriptor,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for RepositoryService<T> {
    fn clone(&self) -> Self {
        Self {
            data_source: self.data_source.clone(),
            connection_key: self.connection_key.clone(),
            key: self.key.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> std::fmt::Debug for RepositoryService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryService")
            .field("entity", &T::type_name())
            .field("connection_key", &self.connection_key)
            .field("key", &self.key)
            .finish()
    }
}

impl<T: Entity> RepositoryService<T> {
    /// Service on the `DefaultConnection`.
    ///
    /// Fails with [`RepoError::Validation`] when `T` has no usable key.
    pub fn new(data_source: &DataSource) -> Result<Self> {
        Self::with_connection(data_source, DEFAULT_CONNECTION_KEY)
    }

    pub fn with_connection(
        data_source: &DataSource,
        connection_key: impl Into<String>,
    ) -> Result<Self> {
        let key = KeyResolver::resolve::<T>()?;
        Ok(Self {
            data_source: data_source.clone(),
            connection_key: connection_key.into(),
            key,
            _entity: PhantomData,
        })
    }

    pub fn key_descriptor(&self) -> &KeyDescriptor {
        &self.key
    }

    pub fn connection_key(&self) -> &str {
        &self.connection_key
    }

    pub fn table_name(&self) -> String {
        T::table_name()
    }

    pub fn data_source(&self) -> &DataSource {
        &self.data_source
    }

    /// Runs `op` inside a fresh session that is released when `op` returns,
    /// successfully or not.
    fn with_session<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut PersistenceSession<T>) -> Result<R>,
    ) -> Result<R> {
        let span = info_span!(
            "repository.op",
            entity = T::type_name(),
            op,
            connection = %self.connection_key
        );
        let _enter = span.enter();
        let mut session = PersistenceSession::open(&self.data_source, &self.connection_key, &self.key)?;
        f(&mut session)
    }

    /// Commits and turns a zero-row commit into [`RepoError::Persistence`].
    fn commit(session: &mut PersistenceSession<T>) -> Result<usize> {
        let affected = session.save_changes()?;
        if affected == 0 {
            event!(Level::WARN, table = %session.table_name(), "commit affected no rows");
            return Err(RepoError::changes_not_saved());
        }
        Ok(affected)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get_all(&self) -> Result<Vec<T>> {
        self.with_session("get_all", |session| session.entities()?.collect())
    }

    /// First entity whose key equals `id`.
    pub fn get(&self, id: impl Into<KeyValue>) -> Result<Option<T>> {
        let id = id.into();
        self.with_session("get", |session| session.find_by_key(&id))
    }

    /// Like [`get`](Self::get), passing the result through `converter`.
    ///
    /// The converter also runs when nothing matched and receives `None`.
    pub fn get_with<R>(
        &self,
        id: impl Into<KeyValue>,
        converter: impl FnOnce(Option<T>) -> R,
    ) -> Result<R> {
        let found = self.get(id)?;
        Ok(converter(found))
    }

    /// First entity satisfying `predicate`.
    pub fn get_where(&self, predicate: impl Fn(&T) -> bool) -> Result<Option<T>> {
        self.with_session("get_where", |session| session.find_first(predicate))
    }

    /// Entities satisfying `predicate`, in storage order.
    ///
    /// Filtering runs lazily over the session's rows; the matches are
    /// collected before the session is released.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>> {
        self.with_session("filter", |session| {
            let mut matches = Vec::new();
            for entity in session.entities()? {
                let entity = entity?;
                if predicate(&entity) {
                    matches.push(entity);
                }
            }
            Ok(matches)
        })
    }

    /// Like [`filter`](Self::filter), with the entity's position in storage
    /// order passed to the predicate.
    pub fn filter_indexed(&self, predicate: impl Fn(&T, usize) -> bool) -> Result<Vec<T>> {
        self.with_session("filter_indexed", |session| {
            let mut matches = Vec::new();
            for (index, entity) in session.entities()?.enumerate() {
                let entity = entity?;
                if predicate(&entity, index) {
                    matches.push(entity);
                }
            }
            Ok(matches)
        })
    }

    pub fn first_or_default(&self, predicate: impl Fn(&T) -> bool) -> Result<Option<T>> {
        Ok(self.filter(predicate)?.into_iter().next())
    }

    // ------------------------------------------------------------------
    // Inserts
    // ------------------------------------------------------------------

    /// Persists `model` and returns its key.
    ///
    /// Key policy: integer keys get `get_all().len() + 1`, GUID keys a new
    /// random UUID, string keys are kept as supplied.
    pub fn insert(&self, model: T) -> Result<KeyValue> {
        let model = self.assign_key(model)?;
        self.with_session("insert", |session| {
            session.add(&model)?;
            Self::commit(session)?;
            key_of(&model, &self.key)?.ok_or_else(|| {
                RepoError::Persistence(format!(
                    "Inserted {} has no value in key '{}'",
                    T::type_name(),
                    self.key.property_name()
                ))
            })
        })
    }

    /// Inserts the converted model. A converter yielding `None` fails with
    /// [`RepoError::Reference`] and nothing is written.
    pub fn insert_with(&self, model: T, converter: impl FnOnce(T) -> Option<T>) -> Result<KeyValue> {
        let converted = converter(model).ok_or_else(|| converter_yielded_nothing::<T>("insert"))?;
        self.insert(converted)
    }

    /// Inserts every item in order, one commit per item.
    ///
    /// The first failure is returned; items inserted before it stay
    /// committed.
    pub fn insert_many(&self, models: impl IntoIterator<Item = T>) -> Result<Vec<KeyValue>> {
        models.into_iter().map(|model| self.insert(model)).collect()
    }

    pub fn insert_many_with(
        &self,
        models: impl IntoIterator<Item = T>,
        mut converter: impl FnMut(T) -> Option<T>,
    ) -> Result<Vec<KeyValue>> {
        models
            .into_iter()
            .map(|model| self.insert_with(model, &mut converter))
            .collect()
    }

    fn assign_key(&self, model: T) -> Result<T> {
        match self.key.property_type() {
            KeyKind::Int => {
                let next = i32::try_from(self.get_all()?.len() + 1).map_err(|_| {
                    RepoError::Persistence(format!("{} key space exhausted", T::type_name()))
                })?;
                with_key(model, &self.key, &KeyValue::Int(next))
            }
            KeyKind::Guid => with_key(model, &self.key, &KeyValue::Guid(Uuid::new_v4())),
            KeyKind::String | KeyKind::Unsupported => Ok(model),
        }
    }

    // ------------------------------------------------------------------
    // Deletes
    // ------------------------------------------------------------------

    /// Deletes the first entity whose key equals `id`.
    ///
    /// A missing entity is not checked up front: the commit affects no row
    /// and fails with [`RepoError::Persistence`].
    pub fn delete(&self, id: impl Into<KeyValue>) -> Result<()> {
        let id = id.into();
        self.with_session("delete", |session| {
            if let Some(target) = session.find_by_key(&id)? {
                session.remove(&target)?;
            }
            Self::commit(session).map(|_| ())
        })
    }

    /// Deletes the first entity satisfying `predicate`, with the same
    /// not-found failure as [`delete`](Self::delete).
    pub fn delete_where(&self, predicate: impl Fn(&T) -> bool) -> Result<()> {
        self.with_session("delete_where", |session| {
            if let Some(target) = session.find_first(predicate)? {
                session.remove(&target)?;
            }
            Self::commit(session).map(|_| ())
        })
    }

    /// Deletes every id in order; deletions before a failure stay committed.
    pub fn delete_many<K: Into<KeyValue>>(&self, ids: impl IntoIterator<Item = K>) -> Result<()> {
        for id in ids {
            self.delete(id)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// Overwrites the stored row with the same key as `model`. Every column
    /// is written, whether it changed or not.
    pub fn update(&self, model: T) -> Result<()> {
        self.with_session("update", |session| {
            session.attach_modified(&model)?;
            Self::commit(session).map(|_| ())
        })
    }

    pub fn update_with(&self, model: T, converter: impl FnOnce(T) -> Option<T>) -> Result<()> {
        let converted = converter(model).ok_or_else(|| converter_yielded_nothing::<T>("update"))?;
        self.update(converted)
    }

    /// Updates every item in order; updates before a failure stay committed.
    pub fn update_many(&self, models: impl IntoIterator<Item = T>) -> Result<()> {
        for model in models {
            self.update(model)?;
        }
        Ok(())
    }

    pub fn update_many_with(
        &self,
        models: impl IntoIterator<Item = T>,
        mut converter: impl FnMut(T) -> Option<T>,
    ) -> Result<()> {
        for model in models {
            self.update_with(model, &mut converter)?;
        }
        Ok(())
    }

    /// Overwrites the first row satisfying `predicate` with `model`.
    pub fn update_where(&self, predicate: impl Fn(&T) -> bool, model: T) -> Result<()> {
        self.with_session("update_where", |session| {
            if let Some(target) = session.find_first(predicate)? {
                session.replace(&target, &model)?;
            }
            Self::commit(session).map(|_| ())
        })
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Issues `BACKUP DATABASE {catalog} TO DISK = '{path}'` on this
    /// service's connection and returns the path used.
    ///
    /// Without a path the file goes to the connection's backup directory as
    /// `{catalog}_{yyyyMMddHHmmss}.bak`. The path is not checked; engine
    /// errors are returned as they are.
    pub fn backup(&self, path: Option<&Path>) -> Result<PathBuf> {
        self.with_session("backup", |session| {
            let catalog = session.catalog().to_string();
            let path = match path {
                Some(path) => path.to_path_buf(),
                None => self.default_backup_path(&catalog)?,
            };
            let command = backup_command(&catalog, &path);
            event!(Level::INFO, command = %command, "issuing backup");
            session.execute_command(&command)?;
            Ok(path)
        })
    }

    fn default_backup_path(&self, catalog: &str) -> Result<PathBuf> {
        let connection_string = self.data_source.connection_string(&self.connection_key)?;
        let config = ConnectionConfig::from_url(connection_string)?;
        let file_name = format!("{}_{}.bak", catalog, Utc::now().format("%Y%m%d%H%M%S"));
        Ok(config.backup_dir.join(file_name))
    }

    /// Brings the table of `T` up to date on `connection_string`.
    pub fn migrate(data_source: &DataSource, connection_string: &str) -> Result<MigrationReport> {
        MigrationRunner::migrate::<T>(data_source, connection_string)
    }

    /// Schema the service's sessions create for `T`.
    pub fn table_schema(&self) -> TableSchema {
        TableSchema::for_entity::<T>(&self.key)
    }
}

fn converter_yielded_nothing<T: Entity>(op: &str) -> RepoError {
    RepoError::Reference(format!(
        "Converter for {} {} returned no value",
        T::type_name(),
        op
    ))
}
