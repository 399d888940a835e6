//! Migration-specific error types

use crate::executor::DbError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    /// Database execution error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Connection could not be established
    #[error("Connection error: {0}")]
    Connection(#[from] crate::connection::ConnectionError),

    /// Migrations directory is missing or not a directory
    #[error("Migrations directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Migrations directory or a file in it could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Migration name does not match `<timestamp>_<label>`
    #[error(
        "Invalid migration name '{0}': expected <YYYYMMDDHHMMSS[mmm]>_<label>, e.g. 20240101000000_init"
    )]
    InvalidName(String),

    /// Two units registered under the same name
    #[error("Migration '{0}' is already registered")]
    AlreadyRegistered(String),

    /// Pending migration has no executable body
    #[error("Migration '{0}' has no registered body; is its file missing from the migrations directory?")]
    MissingUnit(String),

    /// Ledger already holds a record with this name
    #[error("Ledger record '{0}' already exists")]
    DuplicateRecord(String),

    /// Ledger holds no record with this name
    #[error("Ledger record '{0}' not found")]
    RecordNotFound(String),

    /// Migration body failed; its transaction was rolled back
    #[error("Migration '{name}' failed during execution: {source}")]
    ExecutionFailed {
        name: String,
        #[source]
        source: Box<MigrationError>,
    },

    /// Migration body panicked or its coroutine could not be spawned
    #[error("Migration '{name}' aborted: {reason}")]
    Aborted { name: String, reason: String },

    /// Ledger table name is not a plain SQL identifier
    #[error("Invalid ledger table name '{0}'")]
    InvalidTableName(String),

    /// Write attempted through a ledger opened for reading only
    #[error("Ledger table '{0}' was opened read-only")]
    ReadOnlyLedger(String),

    /// Anything else, e.g. a poisoned lock in the in-memory ledger
    #[error("{0}")]
    Other(String),
}

impl MigrationError {
    /// Wraps a failure raised while applying the named migration
    pub fn execution(name: &str, source: MigrationError) -> Self {
        MigrationError::ExecutionFailed {
            name: name.to_string(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_failed_names_migration_and_cause() {
        let err = MigrationError::execution(
            "20240101000000_init",
            MigrationError::Database(DbError::Query("relation \"users\" already exists".into())),
        );
        let msg = err.to_string();
        assert!(msg.contains("20240101000000_init"));
        assert!(msg.contains("already exists"));
    }

    #[test]
    fn test_invalid_name_message_shows_expected_pattern() {
        let msg = MigrationError::InvalidName("init".into()).to_string();
        assert!(msg.contains("'init'"));
        assert!(msg.contains("20240101000000_init"));
    }
}
