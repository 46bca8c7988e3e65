use crate::core::{RepoError, Result};
use crate::storage::Row;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A function responsible for migrating one stored row between versions.
pub type RowMigrationFn = Arc<dyn Fn(&mut Row) -> Result<()> + Send + Sync>;

/// Represents a single step in a migration plan.
#[derive(Clone)]
pub struct MigrationStep {
    pub from_version: u32,
    pub to_version: u32,
    pub(crate) row_migrator: Option<RowMigrationFn>,
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from_version", &self.from_version)
            .field("to_version", &self.to_version)
            .field("has_row_migrator", &self.row_migrator.is_some())
            .finish()
    }
}

impl MigrationStep {
    pub fn new(from_version: u32, to_version: u32) -> Self {
        Self {
            from_version,
            to_version,
            row_migrator: None,
        }
    }

    /// Adds a row migration function to the step.
    ///
    /// The function runs once the model's new columns exist (holding `null`)
    /// and before columns the model dropped are removed, so it can move
    /// values between them.
    pub fn with_row_migrator<F>(mut self, migrator: F) -> Self
    where
        F: Fn(&mut Row) -> Result<()> + Send + Sync + 'static,
    {
        self.row_migrator = Some(Arc::new(migrator));
        self
    }

    pub fn row_migrator(&self) -> Option<&RowMigrationFn> {
        self.row_migrator.as_ref()
    }
}

/// Versioned chain of row migrations for one entity type.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    current_version: u32,
    steps: Vec<MigrationStep>,
}

impl MigrationPlan {
    /// Creates a new empty migration plan for a target version.
    pub fn new(current_version: u32) -> Self {
        Self {
            current_version,
            steps: Vec::new(),
        }
    }

    pub fn current_version(&self) -> u32 {
        self.current_version
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Adds a migration step to the plan, validating it immediately.
    pub fn add_step(&mut self, step: MigrationStep) -> Result<()> {
        self.steps.push(step);
        self.validate()
    }

    pub fn with_step(mut self, step: MigrationStep) -> Result<Self> {
        self.add_step(step)?;
        Ok(self)
    }

    /// Helper to add a row-migration step.
    pub fn add_row_step<F>(&mut self, from_version: u32, to_version: u32, migrator: F) -> Result<()>
    where
        F: Fn(&mut Row) -> Result<()> + Send + Sync + 'static,
    {
        self.add_step(MigrationStep::new(from_version, to_version).with_row_migrator(migrator))
    }

    /// Validates the integrity of the migration plan.
    ///
    /// Checks for:
    /// - version validity (>= 1),
    /// - step direction (`from < to`),
    /// - step bounds (`to <= current`),
    /// - duplicate steps.
    pub fn validate(&self) -> Result<()> {
        if self.current_version == 0 {
            return Err(RepoError::Migration(
                "Schema version must be >= 1".to_string(),
            ));
        }

        let mut seen_from = HashSet::<u32>::new();
        for step in &self.steps {
            if step.from_version == 0 {
                return Err(RepoError::Migration(
                    "Migration 'from_version' must be >= 1".to_string(),
                ));
            }
            if step.to_version <= step.from_version {
                return Err(RepoError::Migration(format!(
                    "Migration step {} -> {} is invalid",
                    step.from_version, step.to_version
                )));
            }
            if step.to_version > self.current_version {
                return Err(RepoError::Migration(format!(
                    "Migration step {} -> {} exceeds current schema version {}",
                    step.from_version, step.to_version, self.current_version
                )));
            }
            if !seen_from.insert(step.from_version) {
                return Err(RepoError::Migration(format!(
                    "Duplicate migration step starting at version {}",
                    step.from_version
                )));
            }
        }

        Ok(())
    }

    /// Resolves ordered migration edges from `from_version` to the current
    /// version.
    pub fn resolve_chain(&self, from_version: u32) -> Result<Vec<&MigrationStep>> {
        if from_version > self.current_version {
            return Err(RepoError::Migration(format!(
                "Cannot migrate down from schema version {} to {}",
                from_version, self.current_version
            )));
        }

        let by_from: HashMap<u32, &MigrationStep> = self
            .steps
            .iter()
            .map(|step| (step.from_version, step))
            .collect();

        let mut cursor = from_version;
        let mut chain = Vec::new();
        while cursor < self.current_version {
            let step = by_from.get(&cursor).copied().ok_or_else(|| {
                RepoError::Migration(format!(
                    "Missing migration step starting at version {} for target {}",
                    cursor, self.current_version
                ))
            })?;
            chain.push(step);
            cursor = step.to_version;
        }

        Ok(chain)
    }
}
