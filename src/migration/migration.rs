//! Migration trait definition

use crate::executor::{DbError, StatementExecutor};
use std::path::{Path, PathBuf};

/// An executable schema change
///
/// `apply` receives the transactional handle of the run: everything it executes
/// commits or rolls back together with the ledger update for this migration.
/// There is no `down`; migrations only move forward.
///
/// Note: the `may` runtime schedules coroutines on blocking calls, so this is
/// synchronous, not async.
pub trait Migration: Send + Sync {
    /// Ledger name, `<timestamp>_<label>`
    fn name(&self) -> &str;

    /// Apply the schema change through `handle`
    fn apply(&self, handle: &dyn StatementExecutor) -> Result<(), DbError>;
}

/// A migration backed by a `.sql` file, read once at discovery
#[derive(Debug, Clone)]
pub struct SqlMigration {
    name: String,
    path: PathBuf,
    sql: String,
}

impl SqlMigration {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            sql: sql.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl Migration for SqlMigration {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, handle: &dyn StatementExecutor) -> Result<(), DbError> {
        if self.sql.trim().is_empty() {
            log::debug!("{} is empty, nothing to execute", self.name);
            return Ok(());
        }
        handle.batch_execute(&self.sql)
    }
}

/// A migration backed by a closure, for code-defined schema changes
pub struct FnMigration<F> {
    name: String,
    body: F,
}

impl<F> FnMigration<F>
where
    F: Fn(&dyn StatementExecutor) -> Result<(), DbError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl<F> Migration for FnMigration<F>
where
    F: Fn(&dyn StatementExecutor) -> Result<(), DbError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, handle: &dyn StatementExecutor) -> Result<(), DbError> {
        (self.body)(handle)
    }
}
