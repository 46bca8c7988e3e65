pub mod command;
pub mod engine;
pub mod memory;
pub mod persistence;
pub mod table;

pub use command::{StorageCommand, backup_command};
pub use engine::{Change, StorageEngine};
pub use memory::InMemoryStorage;
pub use persistence::{DatabaseSnapshot, SnapshotManager};
pub use table::{Column, Row, Table, TableSchema};
