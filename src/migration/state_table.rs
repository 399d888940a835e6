//! Ledger table management

use crate::executor::StatementExecutor;
use crate::migration::MigrationError;
use regex::Regex;
use std::sync::LazyLock;

/// Default ledger table name
pub const DEFAULT_LEDGER_TABLE: &str = "migration_history";

static IDENTIFIER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$"));

/// Returns `true` for a plain, unquoted SQL identifier
///
/// The ledger table name is interpolated into SQL, so nothing else is accepted.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.as_ref().is_ok_and(|re| re.is_match(name))
}

/// DDL for the ledger table
///
/// ```text
/// id            BIGSERIAL PRIMARY KEY
/// name          VARCHAR(255) NOT NULL UNIQUE
/// registered_at TIMESTAMPTZ  NOT NULL
/// executed_at   TIMESTAMPTZ  NULL      -- null: not run yet
/// deleted_at    TIMESTAMPTZ  NULL      -- non-null: tombstoned
/// ```
///
/// # Errors
///
/// Returns `MigrationError::InvalidTableName` for a non-identifier table name.
pub fn create_ledger_table_sql(table: &str) -> Result<String, MigrationError> {
    if !is_valid_identifier(table) {
        return Err(MigrationError::InvalidTableName(table.to_string()));
    }
    Ok(format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            registered_at TIMESTAMPTZ NOT NULL,
            executed_at TIMESTAMPTZ,
            deleted_at TIMESTAMPTZ
        )
        "#
    ))
}

/// Create the ledger table if it does not exist yet
///
/// # Errors
///
/// Returns an error for an invalid table name or a failing statement.
pub fn initialize_ledger_table(executor: &dyn StatementExecutor, table: &str) -> Result<(), MigrationError> {
    executor.batch_execute(&create_ledger_table_sql(table)?)?;
    Ok(())
}
