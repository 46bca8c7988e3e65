use thiserror::Error;

/// Message carried by every commit that reports zero affected rows.
pub const DB_CHANGES_NOT_SAVED: &str = "DB changes not saved";

#[derive(Error, Debug)]
pub enum RepoError {
    /// The entity type has no usable primary key.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A commit reported zero affected rows.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A required converter result or callback was absent.
    #[error("Reference error: {0}")]
    Reference(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, RepoError>;

impl RepoError {
    pub fn changes_not_saved() -> Self {
        Self::Persistence(DB_CHANGES_NOT_SAVED.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for RepoError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Storage(format!("Lock poisoned: {}", err))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for RepoError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for RepoError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RepoError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(format!("I/O error: {}", err))
    }
}
