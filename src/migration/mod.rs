//! Per-entity-type schema migrations.

pub mod plan;
pub mod record;
pub mod runner;

pub use plan::{MigrationPlan, MigrationStep, RowMigrationFn};
pub use record::{MigrationRecord, MigrationReport, SchemaDiff};
pub use runner::MigrationRunner;
