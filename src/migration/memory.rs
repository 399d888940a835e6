//! In-process ledger
//!
//! Holds records and the log of committed schema statements in memory.
//! Transactions buffer their writes in a journal that is replayed on commit
//! and dropped on rollback, so atomicity can be observed without a database.
//! Faults can be injected to exercise error paths.

use crate::executor::{DbError, StatementExecutor};
use crate::migration::ledger::TransactionWork;
use crate::migration::{LedgerStore, LedgerTransaction, MigrationError, MigrationRecord, RecordChanges};
use may_postgres::types::ToSql;
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
    faults: Mutex<Faults>,
}

#[derive(Debug, Default, Clone)]
struct State {
    records: Vec<MigrationRecord>,
    statements: Vec<String>,
}

#[derive(Debug, Default)]
struct Faults {
    statements: Vec<String>,
    inserts: HashSet<String>,
    updates: HashSet<String>,
    select_all: bool,
    transactions: bool,
}

#[derive(Debug, Clone)]
enum Op {
    Insert(MigrationRecord),
    Update(String, RecordChanges),
    Statement(String),
}

fn poisoned<T>(_: T) -> MigrationError {
    MigrationError::Other("in-memory ledger lock poisoned".to_string())
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger pre-populated with `records`
    pub fn with_records(records: impl IntoIterator<Item = MigrationRecord>) -> Self {
        let ledger = Self::new();
        if let Ok(mut state) = ledger.state.lock() {
            state.records.extend(records);
        }
        ledger
    }

    /// Snapshot of all committed records
    pub fn records(&self) -> Vec<MigrationRecord> {
        self.state().map(|s| s.records.clone()).unwrap_or_default()
    }

    pub fn record(&self, name: &str) -> Option<MigrationRecord> {
        self.records().into_iter().find(|r| r.name == name)
    }

    /// Schema statements committed so far, in commit order
    pub fn statements(&self) -> Vec<String> {
        self.state().map(|s| s.statements.clone()).unwrap_or_default()
    }

    /// Statements containing `pattern` fail when executed
    pub fn fail_statements_containing(&self, pattern: impl Into<String>) -> &Self {
        if let Ok(mut faults) = self.faults.lock() {
            faults.statements.push(pattern.into());
        }
        self
    }

    /// Inserting a record with this name fails
    pub fn fail_insert_of(&self, name: impl Into<String>) -> &Self {
        if let Ok(mut faults) = self.faults.lock() {
            faults.inserts.insert(name.into());
        }
        self
    }

    /// Updating the record with this name fails
    pub fn fail_update_of(&self, name: impl Into<String>) -> &Self {
        if let Ok(mut faults) = self.faults.lock() {
            faults.updates.insert(name.into());
        }
        self
    }

    /// `select_all` fails, as with an unreachable database
    pub fn fail_select_all(&self) -> &Self {
        if let Ok(mut faults) = self.faults.lock() {
            faults.select_all = true;
        }
        self
    }

    /// Opening a transaction fails
    pub fn fail_transactions(&self) -> &Self {
        if let Ok(mut faults) = self.faults.lock() {
            faults.transactions = true;
        }
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, MigrationError> {
        self.state.lock().map_err(poisoned)
    }

    fn faults(&self) -> Result<MutexGuard<'_, Faults>, MigrationError> {
        self.faults.lock().map_err(poisoned)
    }

    fn check_insert(&self, name: &str) -> Result<(), MigrationError> {
        if self.faults()?.inserts.contains(name) {
            return Err(DbError::Query(format!("injected insert failure for '{name}'")).into());
        }
        Ok(())
    }

    fn check_update(&self, name: &str) -> Result<(), MigrationError> {
        if self.faults()?.updates.contains(name) {
            return Err(DbError::Query(format!("injected update failure for '{name}'")).into());
        }
        Ok(())
    }

    fn check_statement(&self, sql: &str) -> Result<(), DbError> {
        let faults = self
            .faults
            .lock()
            .map_err(|_| DbError::Other("in-memory ledger lock poisoned".to_string()))?;
        match faults.statements.iter().find(|p| sql.contains(p.as_str())) {
            Some(pattern) => Err(DbError::Query(format!("injected statement failure on '{pattern}'"))),
            None => Ok(()),
        }
    }

    /// Replays a journal onto `state`; nothing changes unless every op applies
    fn replay(state: &mut State, journal: &[Op]) -> Result<(), MigrationError> {
        let mut next = state.clone();
        for op in journal {
            match op {
                Op::Insert(record) => {
                    if next.records.iter().any(|r| r.name == record.name) {
                        return Err(MigrationError::DuplicateRecord(record.name.clone()));
                    }
                    next.records.push(record.clone());
                }
                Op::Update(name, changes) => {
                    for record in next.records.iter_mut().filter(|r| &r.name == name) {
                        record.apply(changes);
                    }
                }
                Op::Statement(sql) => next.statements.push(sql.clone()),
            }
        }
        *state = next;
        Ok(())
    }
}

impl LedgerStore for MemoryLedger {
    fn select_all(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        if self.faults()?.select_all {
            return Err(DbError::Other("injected select failure".to_string()).into());
        }
        Ok(self.state()?.records.clone())
    }

    fn insert(&self, record: &MigrationRecord) -> Result<(), MigrationError> {
        self.check_insert(&record.name)?;
        Self::replay(&mut *self.state()?, &[Op::Insert(record.clone())])
    }

    fn update_by_name(&self, name: &str, changes: &RecordChanges) -> Result<u64, MigrationError> {
        self.check_update(name)?;
        let mut state = self.state()?;
        let touched = state.records.iter().filter(|r| r.name == name).count() as u64;
        Self::replay(&mut state, &[Op::Update(name.to_string(), changes.clone())])?;
        Ok(touched)
    }

    fn run_in_transaction(&self, work: &mut TransactionWork<'_>) -> Result<(), MigrationError> {
        if self.faults()?.transactions {
            return Err(DbError::Other("injected transaction failure".to_string()).into());
        }

        let tx = MemoryTransaction {
            ledger: self,
            journal: RefCell::new(Vec::new()),
        };
        work(&tx)?;

        let journal = tx.journal.into_inner();
        Self::replay(&mut *self.state()?, &journal)
    }
}

struct MemoryTransaction<'a> {
    ledger: &'a MemoryLedger,
    journal: RefCell<Vec<Op>>,
}

impl MemoryTransaction<'_> {
    /// Committed records with this transaction's writes applied
    fn view(&self) -> Result<State, MigrationError> {
        let mut view = self.ledger.state()?.clone();
        MemoryLedger::replay(&mut view, &self.journal.borrow())?;
        Ok(view)
    }
}

impl LedgerTransaction for MemoryTransaction<'_> {
    fn find_by_name(&self, name: &str) -> Result<Option<MigrationRecord>, MigrationError> {
        Ok(self.view()?.records.into_iter().find(|r| r.name == name))
    }

    fn insert(&self, record: &MigrationRecord) -> Result<(), MigrationError> {
        self.ledger.check_insert(&record.name)?;
        if self.view()?.records.iter().any(|r| r.name == record.name) {
            return Err(MigrationError::DuplicateRecord(record.name.clone()));
        }
        self.journal.borrow_mut().push(Op::Insert(record.clone()));
        Ok(())
    }

    fn update_by_name(&self, name: &str, changes: &RecordChanges) -> Result<u64, MigrationError> {
        self.ledger.check_update(name)?;
        let touched = self.view()?.records.iter().filter(|r| r.name == name).count() as u64;
        if touched > 0 {
            self.journal
                .borrow_mut()
                .push(Op::Update(name.to_string(), changes.clone()));
        }
        Ok(touched)
    }

    fn savepoint(&self, work: &mut TransactionWork<'_>) -> Result<(), MigrationError> {
        let mark = self.journal.borrow().len();
        let outcome = work(self);
        if outcome.is_err() {
            self.journal.borrow_mut().truncate(mark);
        }
        outcome
    }

    fn schema(&self) -> &dyn StatementExecutor {
        self
    }
}

impl StatementExecutor for MemoryTransaction<'_> {
    fn execute(&self, query: &str, _params: &[&dyn ToSql]) -> Result<u64, DbError> {
        self.ledger.check_statement(query)?;
        self.journal.borrow_mut().push(Op::Statement(query.to_string()));
        Ok(0)
    }

    fn batch_execute(&self, sql: &str) -> Result<(), DbError> {
        self.execute(sql, &[]).map(|_| ())
    }
}
