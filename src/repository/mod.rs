//! Entity repositories.
//!
//! [`RepositoryService`] is the general surface keyed by [`KeyValue`](crate::KeyValue);
//! [`TypedRepositoryService`] pins the identifier to one Rust type.

pub mod service;
pub mod typed;

pub use service::RepositoryService;
pub use typed::TypedRepositoryService;
