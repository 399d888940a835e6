//! Full reconciliation cycles against the in-memory ledger

use chrono::Utc;
use driftguard::migration::{
    discover_migrations, DriftOutcome, MemoryLedger, MigrationRecord, Migrator, ScriptedPrompt,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    ledger: Arc<MemoryLedger>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_ledger(MemoryLedger::new())
    }

    fn with_ledger(ledger: MemoryLedger) -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
            ledger: Arc::new(ledger),
        }
    }

    fn script(&self, name: &str, sql: &str) -> &Self {
        fs::write(self.dir.path().join(format!("{name}.sql")), sql).expect("write migration");
        self
    }

    fn remove(&self, name: &str) {
        fs::remove_file(self.dir.path().join(format!("{name}.sql"))).expect("remove migration");
    }

    fn migrator(&self) -> Migrator {
        let registry = discover_migrations(self.dir.path()).expect("discovery");
        Migrator::new(self.ledger.clone(), registry)
    }

    fn executed(&self, name: &str) -> bool {
        self.ledger
            .record(name)
            .is_some_and(|r| r.executed_at.is_some())
    }
}

fn decline() -> ScriptedPrompt {
    ScriptedPrompt::answering("n")
}

#[test]
fn test_new_script_is_registered_and_executed() {
    let fx = Fixture::new();
    fx.script("20240101000000_init", "CREATE TABLE users (id INT)");

    let report = fx.migrator().run(&decline()).expect("run");

    assert_eq!(report.synced, vec!["20240101000000_init"]);
    assert!(report.is_success());
    let records = fx.ledger.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].executed_at.is_some());
    assert!(records[0].deleted_at.is_none());
    assert_eq!(fx.ledger.statements(), vec!["CREATE TABLE users (id INT)"]);
}

#[test]
fn test_registered_record_is_executed_without_sync() {
    let fx = Fixture::with_ledger(MemoryLedger::with_records([MigrationRecord::registered(
        "20240101000000_init",
        Utc::now(),
    )]));
    fx.script("20240101000000_init", "CREATE TABLE users (id INT)");

    let report = fx.migrator().run(&decline()).expect("run");

    assert!(report.synced.is_empty());
    assert_eq!(report.succeeded_count(), 1);
    assert!(fx.executed("20240101000000_init"));
    assert_eq!(fx.ledger.records().len(), 1);
}

#[test]
fn test_confirmed_deletion_is_tombstoned_once() {
    let fx = Fixture::with_ledger(MemoryLedger::with_records([MigrationRecord::executed(
        "20240101000000_old",
        Utc::now(),
    )]));

    let prompt = ScriptedPrompt::answering("y");
    let report = fx.migrator().run(&prompt).expect("run");

    assert!(matches!(&report.drift, DriftOutcome::Tombstoned { marked, failed }
        if marked == &vec!["20240101000000_old".to_string()] && failed.is_empty()));
    assert!(prompt.asked()[0].contains("20240101000000_old"));
    assert!(report.is_success());
    assert!(report.nothing_to_do());
    assert!(fx
        .ledger
        .record("20240101000000_old")
        .is_some_and(|r| r.is_tombstoned()));

    let prompt = ScriptedPrompt::answering("y");
    let again = fx.migrator().run(&prompt).expect("second run");
    assert!(prompt.asked().is_empty());
    assert!(again.reconciliation.pending_from_ledger.is_empty());
    assert!(again.reconciliation.deleted_from_disk.is_empty());
}

#[test]
fn test_failure_does_not_block_later_migration() {
    let fx = Fixture::with_ledger(MemoryLedger::with_records([
        MigrationRecord::registered("20240101000000_first", Utc::now()),
        MigrationRecord::registered("20240102000000_second", Utc::now()),
    ]));
    fx.ledger.fail_statements_containing("BROKEN");
    fx.script("20240101000000_first", "BROKEN SQL")
        .script("20240102000000_second", "CREATE TABLE b (id INT)");

    let report = fx.migrator().run(&decline()).expect("run");

    assert!(!report.is_success());
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.succeeded_count(), 1);
    assert!(!fx.executed("20240101000000_first"));
    assert!(fx.executed("20240102000000_second"));
}

#[test]
fn test_second_run_has_nothing_to_do() {
    let fx = Fixture::new();
    fx.script("20240101000000_a", "CREATE TABLE a (id INT)")
        .script("20240102000000_b", "CREATE TABLE b (id INT)");

    let first = fx.migrator().run(&decline()).expect("first run");
    assert_eq!(first.succeeded_count(), 2);

    let second = fx.migrator().run(&decline()).expect("second run");
    assert!(second.nothing_to_do());
    assert!(second.is_success());
    assert_eq!(fx.ledger.statements().len(), 2);
}

#[test]
fn test_failed_migration_leaves_no_partial_effects() {
    let fx = Fixture::new();
    fx.ledger.fail_statements_containing("INSERT INTO missing");
    fx.script(
        "20240101000000_partial",
        "CREATE TABLE a (id INT);\nINSERT INTO missing VALUES (1)",
    );

    let report = fx.migrator().run(&decline()).expect("run");
    assert!(!report.is_success());
    assert!(fx.ledger.statements().is_empty());
    assert!(!fx.executed("20240101000000_partial"));

    let status = fx.migrator().status().expect("status");
    assert_eq!(status.pending, vec!["20240101000000_partial"]);
}

#[test]
fn test_execution_follows_timestamp_order() {
    let fx = Fixture::new();
    fx.script("20240301000000_c", "-- c")
        .script("20240101000000000_a", "-- a")
        .script("20240201000000_b", "-- b");

    let report = fx.migrator().run(&decline()).expect("run");
    let order: Vec<_> = report.outcomes.iter().map(|o| o.name()).collect();
    assert_eq!(order, vec!["20240101000000000_a", "20240201000000_b", "20240301000000_c"]);
    assert_eq!(fx.ledger.statements(), vec!["-- a", "-- b", "-- c"]);
}

#[test]
fn test_declined_deletion_of_unexecuted_record_is_skipped() {
    let fx = Fixture::new();
    fx.script("20240101000000_draft", "CREATE TABLE draft (id INT)");
    fx.ledger.fail_statements_containing("draft");
    fx.migrator().run(&decline()).expect("first run");
    fx.remove("20240101000000_draft");

    let report = fx.migrator().run(&decline()).expect("second run");
    assert!(matches!(report.drift, DriftOutcome::Declined { .. }));
    assert_eq!(report.orphaned, vec!["20240101000000_draft"]);
    assert!(report.outcomes.is_empty());
    assert!(report.is_success());
}

#[test]
fn test_restored_script_of_tombstoned_record_is_not_rerun() {
    let fx = Fixture::new();
    fx.script("20240101000000_a", "CREATE TABLE a (id INT)");
    fx.migrator().run(&decline()).expect("first run");

    fx.remove("20240101000000_a");
    fx.migrator().run(&ScriptedPrompt::answering("yes")).expect("tombstone run");
    fx.script("20240101000000_a", "CREATE TABLE a (id INT)");

    let report = fx.migrator().run(&decline()).expect("third run");
    assert!(report.nothing_to_do());
    assert_eq!(fx.ledger.statements().len(), 1);
}

#[test]
fn test_concurrent_run_applies_everything() {
    let fx = Fixture::new();
    for i in 1..=6 {
        fx.script(&format!("2024010{i}000000_m{i}"), &format!("CREATE TABLE m{i} (id INT)"));
    }

    let report = fx
        .migrator()
        .with_concurrency(3)
        .run(&decline())
        .expect("run");

    assert!(report.is_success());
    assert_eq!(report.succeeded_count(), 6);
    let order: Vec<_> = report.outcomes.iter().map(|o| o.name().to_string()).collect();
    let expected: Vec<_> = (1..=6).map(|i| format!("2024010{i}000000_m{i}")).collect();
    assert_eq!(order, expected);
    assert!(fx.ledger.records().iter().all(|r| r.executed_at.is_some()));
}
