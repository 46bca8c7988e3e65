//! Backup files for the in-memory engine.

use crate::core::{RepoError, Result};
use crate::migration::MigrationRecord;
use crate::storage::table::Table;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ============================================================================
// Database Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: u32,
    pub catalog: String,
    pub tables: HashMap<String, Table>,
    pub migrations: HashMap<String, MigrationRecord>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: i64,
    pub row_count: usize,
    pub table_count: usize,
}

impl DatabaseSnapshot {
    pub fn new(
        catalog: impl Into<String>,
        tables: HashMap<String, Table>,
        migrations: HashMap<String, MigrationRecord>,
    ) -> Self {
        let row_count = tables.values().map(|t| t.row_count()).sum();
        let table_count = tables.len();

        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            catalog: catalog.into(),
            tables,
            migrations,
            metadata: SnapshotMetadata {
                created_at: Utc::now().timestamp_millis(),
                row_count,
                table_count,
            },
        }
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Writes the snapshot through a temp file in the target directory and
    /// renames it into place.
    pub fn save(&self, snapshot: &DatabaseSnapshot) -> Result<()> {
        let parent = match self.snapshot_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let serialized = rmp_serde::to_vec(snapshot)?;
        let temp_file = NamedTempFile::new_in(&parent)?;
        {
            let mut writer = BufWriter::new(temp_file.as_file());
            writer.write_all(&serialized)?;
            writer.flush()?;
        }
        temp_file.as_file().sync_all()?;
        temp_file.persist(&self.snapshot_path).map_err(|e| {
            RepoError::Storage(format!(
                "Failed to move backup into '{}': {}",
                self.snapshot_path.display(),
                e.error
            ))
        })?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<DatabaseSnapshot>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let mut reader = BufReader::new(File::open(&self.snapshot_path)?);
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let snapshot: DatabaseSnapshot = rmp_serde::from_slice(&data)?;
        Ok(Some(snapshot))
    }
}
