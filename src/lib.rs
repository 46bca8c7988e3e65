// ============================================================================
// memorepo Library
// ============================================================================

//! Generic repository layer over an embedded in-memory store.
//!
//! Entity types derive [`Entity`], and a [`RepositoryService`] gives them
//! CRUD, predicate queries, batch operations and backups. Every call runs in
//! its own short-lived [`PersistenceSession`].
//!
//! ```
//! use memorepo::{DataSource, Entity, KeyValue, RepositoryService};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! struct Person {
//!     id: i32,
//!     name: String,
//! }
//!
//! # fn main() -> memorepo::Result<()> {
//! let source = DataSource::in_memory("people");
//! let repo = RepositoryService::<Person>::new(&source)?;
//!
//! let id = repo.insert(Person { id: 0, name: "Ada".into() })?;
//! assert_eq!(id, KeyValue::Int(1));
//! assert_eq!(repo.get(1)?.map(|p| p.name), Some("Ada".to_string()));
//! # Ok(())
//! # }
//! ```

extern crate self as memorepo;

pub mod connection;
pub mod core;
pub mod entity;
pub mod migration;
pub mod prelude;
pub mod repository;
pub mod session;
pub mod storage;
pub mod watcher;

// Re-export main types for convenience
pub use crate::core::{
    DB_CHANGES_NOT_SAVED, FieldKind, FieldType, KeyKind, KeyType, KeyValue, RepoError, Result,
};
pub use entity::{Entity, FieldDescriptor, KeyDescriptor, KeyResolver};
pub use memorepo_derive::Entity;

pub use connection::{ConnectionConfig, ConnectionSettings, DEFAULT_CONNECTION_KEY, DataSource};
pub use migration::{MigrationPlan, MigrationReport, MigrationRunner, MigrationStep, SchemaDiff};
pub use repository::{RepositoryService, TypedRepositoryService};
pub use session::PersistenceSession;
pub use storage::{InMemoryStorage, Row, StorageEngine};
pub use watcher::{ChangeWatcher, ChangeWatcherBuilder};
