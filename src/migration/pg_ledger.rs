//! PostgreSQL-backed ledger

use crate::connection::{check_connection_health, connect, redact};
use crate::executor::{DbError, MayPostgresExecutor, StatementExecutor};
use crate::migration::ledger::TransactionWork;
use crate::migration::{
    initialize_ledger_table, is_valid_identifier, LedgerStore, LedgerTransaction, MigrationError,
    MigrationRecord, RecordChanges,
};
use crate::transaction::Transaction;
use may_postgres::types::ToSql;
use may_postgres::Row;

/// Ledger stored in a PostgreSQL table
///
/// Plain reads and writes share one connection. Every transaction opens a
/// dedicated connection, so migrations running in parallel coroutines never
/// interleave `BEGIN`/`COMMIT` on the same session.
pub struct PgLedger {
    url: String,
    table: String,
    executor: MayPostgresExecutor,
    read_only: bool,
}

impl PgLedger {
    /// Connect, verify the connection with `SELECT 1` and create the ledger table if needed
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid table name, an unreachable database, or
    /// a failing `CREATE TABLE`. All of these are configuration errors.
    pub fn connect(url: &str, table: &str) -> Result<Self, MigrationError> {
        let ledger = Self::open(url, table, false)?;
        initialize_ledger_table(&ledger.executor, table)?;
        Ok(ledger)
    }

    /// Connect for reading only: the ledger table is never created and every
    /// write is refused with `MigrationError::ReadOnlyLedger`
    ///
    /// A ledger table that does not exist yet reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid table name or an unreachable database.
    pub fn connect_read_only(url: &str, table: &str) -> Result<Self, MigrationError> {
        Self::open(url, table, true)
    }

    fn open(url: &str, table: &str, read_only: bool) -> Result<Self, MigrationError> {
        if !is_valid_identifier(table) {
            return Err(MigrationError::InvalidTableName(table.to_string()));
        }

        let client = connect(url)?;
        if !check_connection_health(&client)? {
            return Err(MigrationError::Other(format!(
                "health check against {} returned no rows",
                redact(url)
            )));
        }

        Ok(Self {
            url: url.to_string(),
            table: table.to_string(),
            executor: MayPostgresExecutor::new(client),
            read_only,
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn ensure_writable(&self) -> Result<(), MigrationError> {
        if self.read_only {
            return Err(MigrationError::ReadOnlyLedger(self.table.clone()));
        }
        Ok(())
    }

    fn table_exists(&self) -> Result<bool, MigrationError> {
        let rows = self.executor.query_all(
            "SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = lower($1)",
            &[&self.table],
        )?;
        Ok(!rows.is_empty())
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl LedgerStore for PgLedger {
    fn select_all(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        if self.read_only && !self.table_exists()? {
            log::debug!("ledger table {} does not exist yet", self.table);
            return Ok(Vec::new());
        }
        select_all(&self.executor, &self.table)
    }

    fn insert(&self, record: &MigrationRecord) -> Result<(), MigrationError> {
        self.ensure_writable()?;
        insert(&self.executor, &self.table, record)
    }

    fn update_by_name(&self, name: &str, changes: &RecordChanges) -> Result<u64, MigrationError> {
        self.ensure_writable()?;
        update_by_name(&self.executor, &self.table, name, changes)
    }

    fn run_in_transaction(&self, work: &mut TransactionWork<'_>) -> Result<(), MigrationError> {
        self.ensure_writable()?;
        let executor = MayPostgresExecutor::new(connect(&self.url)?);
        let tx = executor.begin().map_err(DbError::from)?;

        let outcome = work(&PgTransaction {
            tx: &tx,
            table: &self.table,
        });
        finish(tx, outcome)
    }
}

/// Commit on success, roll back on failure and hand the original error back
fn finish(tx: Transaction, outcome: Result<(), MigrationError>) -> Result<(), MigrationError> {
    match outcome {
        Ok(()) => {
            tx.commit().map_err(DbError::from)?;
            Ok(())
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback() {
                log::warn!("rollback after failure also failed: {rollback}");
            }
            Err(e)
        }
    }
}

struct PgTransaction<'a> {
    tx: &'a Transaction,
    table: &'a str,
}

impl LedgerTransaction for PgTransaction<'_> {
    fn find_by_name(&self, name: &str) -> Result<Option<MigrationRecord>, MigrationError> {
        let sql = format!(
            "SELECT name, registered_at, executed_at, deleted_at FROM {} WHERE name = $1",
            self.table
        );
        let rows = self.tx.query_all(&sql, &[&name])?;
        rows.first()
            .map(MigrationRecord::from_row)
            .transpose()
            .map_err(MigrationError::from)
    }

    fn insert(&self, record: &MigrationRecord) -> Result<(), MigrationError> {
        insert(self.tx, self.table, record)
    }

    fn update_by_name(&self, name: &str, changes: &RecordChanges) -> Result<u64, MigrationError> {
        update_by_name(self.tx, self.table, name, changes)
    }

    fn savepoint(&self, work: &mut TransactionWork<'_>) -> Result<(), MigrationError> {
        let nested = self.tx.begin_nested().map_err(DbError::from)?;
        let outcome = work(&PgTransaction {
            tx: &nested,
            table: self.table,
        });
        finish(nested, outcome)
    }

    fn schema(&self) -> &dyn StatementExecutor {
        self.tx
    }
}

/// Query access shared by the plain executor and transactions
trait Queryable: StatementExecutor {
    fn rows(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, DbError>;
}

impl Queryable for MayPostgresExecutor {
    fn rows(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, DbError> {
        self.query_all(query, params)
    }
}

impl Queryable for Transaction {
    fn rows(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, DbError> {
        self.query_all(query, params)
    }
}

fn select_all(db: &dyn Queryable, table: &str) -> Result<Vec<MigrationRecord>, MigrationError> {
    let sql = format!("SELECT name, registered_at, executed_at, deleted_at FROM {table} ORDER BY id");
    db.rows(&sql, &[])?
        .iter()
        .map(|row| MigrationRecord::from_row(row).map_err(MigrationError::from))
        .collect()
}

fn insert(db: &dyn StatementExecutor, table: &str, record: &MigrationRecord) -> Result<(), MigrationError> {
    // ON CONFLICT keeps a duplicate from aborting the surrounding transaction
    let sql = format!(
        "INSERT INTO {table} (name, registered_at, executed_at, deleted_at) \
         VALUES ($1, $2, $3, $4) ON CONFLICT (name) DO NOTHING"
    );
    let inserted = db.execute(
        &sql,
        &[
            &record.name,
            &record.registered_at,
            &record.executed_at,
            &record.deleted_at,
        ],
    )?;

    if inserted == 0 {
        return Err(MigrationError::DuplicateRecord(record.name.clone()));
    }
    Ok(())
}

fn update_by_name(
    db: &dyn StatementExecutor,
    table: &str,
    name: &str,
    changes: &RecordChanges,
) -> Result<u64, MigrationError> {
    let mut assignments = Vec::new();
    let mut params: Vec<&dyn ToSql> = vec![&name];

    if let Some(executed_at) = &changes.executed_at {
        params.push(executed_at);
        assignments.push(format!("executed_at = ${}", params.len()));
    }
    if let Some(deleted_at) = &changes.deleted_at {
        params.push(deleted_at);
        assignments.push(format!("deleted_at = ${}", params.len()));
    }
    if assignments.is_empty() {
        return Ok(0);
    }

    let sql = format!("UPDATE {table} SET {} WHERE name = $1", assignments.join(", "));
    Ok(db.execute(&sql, &params)?)
}
