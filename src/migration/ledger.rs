//! The ledger store boundary
//!
//! The engine only talks to the ledger through these two traits. `PgLedger`
//! implements them over PostgreSQL, `MemoryLedger` in process.

use crate::executor::StatementExecutor;
use crate::migration::{MigrationError, MigrationRecord, RecordChanges};

/// Unit of work run inside [`LedgerStore::run_in_transaction`]
pub type TransactionWork<'w> = dyn FnMut(&dyn LedgerTransaction) -> Result<(), MigrationError> + 'w;

/// Persistent store of migration records
///
/// Implementations must be usable from several coroutines at once; each
/// `run_in_transaction` call gets a transaction of its own.
pub trait LedgerStore: Send + Sync {
    /// Every record, tombstoned ones included
    fn select_all(&self) -> Result<Vec<MigrationRecord>, MigrationError>;

    /// Insert a new record
    ///
    /// # Errors
    ///
    /// `MigrationError::DuplicateRecord` if the name already exists.
    fn insert(&self, record: &MigrationRecord) -> Result<(), MigrationError>;

    /// Update the record with this name, returning the number of rows touched
    fn update_by_name(&self, name: &str, changes: &RecordChanges) -> Result<u64, MigrationError>;

    /// Run `work` in one transaction: commit if it returns `Ok`, roll back otherwise
    fn run_in_transaction(&self, work: &mut TransactionWork<'_>) -> Result<(), MigrationError>;
}

/// Handle passed to transactional work
///
/// The same handle serves the migration's own statements (via [`schema`](Self::schema))
/// and the ledger update, which is what makes the two atomic.
pub trait LedgerTransaction {
    fn find_by_name(&self, name: &str) -> Result<Option<MigrationRecord>, MigrationError>;

    fn insert(&self, record: &MigrationRecord) -> Result<(), MigrationError>;

    fn update_by_name(&self, name: &str, changes: &RecordChanges) -> Result<u64, MigrationError>;

    /// Run `work` in a savepoint: its effects are undone if it fails, without
    /// aborting the enclosing transaction
    fn savepoint(&self, work: &mut TransactionWork<'_>) -> Result<(), MigrationError>;

    /// Statement executor bound to this transaction
    fn schema(&self) -> &dyn StatementExecutor;
}
