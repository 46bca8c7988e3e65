use super::RepositoryService;
use crate::connection::{DEFAULT_CONNECTION_KEY, DataSource};
use crate::core::{KeyType, RepoError, Result};
use crate::entity::{Entity, KeyDescriptor};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Repository whose identifiers are statically typed as `Id`.
///
/// Construction fails when `Id` does not match the kind of the resolved key
/// field, so `TypedRepositoryService<Person, Uuid>` over an integer-keyed
/// `Person` never exists.
pub struct TypedRepositoryService<T: Entity, Id: KeyType> {
    inner: RepositoryService<T>,
    _id: PhantomData<fn() -> Id>,
}

impl<T: Entity, Id: KeyType> Clone for TypedRepositoryService<T, Id> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _id: PhantomData,
        }
    }
}

impl<T: Entity, Id: KeyType> TypedRepositoryService<T, Id> {
    pub fn new(data_source: &DataSource) -> Result<Self> {
        Self::with_connection(data_source, DEFAULT_CONNECTION_KEY)
    }

    pub fn with_connection(
        data_source: &DataSource,
        connection_key: impl Into<String>,
    ) -> Result<Self> {
        let inner = RepositoryService::with_connection(data_source, connection_key)?;
        let key = inner.key_descriptor();
        if key.property_type() != Id::KIND {
            return Err(RepoError::Validation(format!(
                "Key '{}' of {} is {}, not {}",
                key.property_name(),
                T::type_name(),
                key.property_type(),
                Id::KIND
            )));
        }
        Ok(Self {
            inner,
            _id: PhantomData,
        })
    }

    pub fn key_descriptor(&self) -> &KeyDescriptor {
        self.inner.key_descriptor()
    }

    /// Untyped service backing this one.
    pub fn untyped(&self) -> &RepositoryService<T> {
        &self.inner
    }

    pub fn get_all(&self) -> Result<Vec<T>> {
        self.inner.get_all()
    }

    pub fn get(&self, id: Id) -> Result<Option<T>> {
        self.inner.get(id)
    }

    pub fn get_where(&self, predicate: impl Fn(&T) -> bool) -> Result<Option<T>> {
        self.inner.get_where(predicate)
    }

    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>> {
        self.inner.filter(predicate)
    }

    pub fn insert(&self, model: T) -> Result<Id> {
        Id::try_from(self.inner.insert(model)?)
    }

    pub fn insert_many(&self, models: impl IntoIterator<Item = T>) -> Result<Vec<Id>> {
        models.into_iter().map(|model| self.insert(model)).collect()
    }

    pub fn update(&self, model: T) -> Result<()> {
        self.inner.update(model)
    }

    pub fn update_many(&self, models: impl IntoIterator<Item = T>) -> Result<()> {
        self.inner.update_many(models)
    }

    /// Not available on typed repositories.
    pub fn update_where(&self, _predicate: impl Fn(&T) -> bool, _model: T) -> Result<()> {
        Err(RepoError::NotImplemented(
            "update_where on a typed repository".to_string(),
        ))
    }

    pub fn delete(&self, id: Id) -> Result<()> {
        self.inner.delete(id)
    }

    pub fn delete_where(&self, predicate: impl Fn(&T) -> bool) -> Result<()> {
        self.inner.delete_where(predicate)
    }

    pub fn delete_many(&self, ids: impl IntoIterator<Item = Id>) -> Result<()> {
        self.inner.delete_many(ids)
    }

    /// Not available on typed repositories.
    pub fn backup(&self, _path: Option<&Path>) -> Result<PathBuf> {
        Err(RepoError::NotImplemented(
            "backup on a typed repository".to_string(),
        ))
    }
}
