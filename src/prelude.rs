//! Imports for application code.
//!
//! `use memorepo::prelude::*;` brings in the derive, the services and the
//! error type. Storage and migration internals stay behind their modules.

pub use crate::{
    ChangeWatcher, DataSource, Entity, KeyValue, RepoError, RepositoryService, Result,
    TypedRepositoryService,
};
