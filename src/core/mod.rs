pub mod error;
pub mod types;
pub mod value;

pub use error::{DB_CHANGES_NOT_SAVED, RepoError, Result};
pub use types::{FieldKind, FieldType, KeyKind};
pub use value::{KeyType, KeyValue};
