//! Migration execution
//!
//! Each migration runs in its own ledger transaction together with the
//! ledger update that marks it executed. Outcomes are collected, never
//! short-circuited.

use crate::migration::{LedgerStore, Migration, MigrationError, MigrationRecord, RecordChanges};
use chrono::Utc;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// Stack size for migration coroutines; driver calls need more than the default
const COROUTINE_STACK_SIZE: usize = 0x20000;

/// Result of applying one migration
#[derive(Debug)]
pub enum MigrationOutcome {
    Applied { name: String, elapsed_ms: u128 },
    /// The transaction was rolled back
    Failed { name: String, error: MigrationError },
}

impl MigrationOutcome {
    pub fn name(&self) -> &str {
        match self {
            MigrationOutcome::Applied { name, .. } | MigrationOutcome::Failed { name, .. } => name,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, MigrationOutcome::Applied { .. })
    }

    pub fn error(&self) -> Option<&MigrationError> {
        match self {
            MigrationOutcome::Failed { error, .. } => Some(error),
            MigrationOutcome::Applied { .. } => None,
        }
    }
}

/// Apply one migration and record it, atomically
///
/// Inside a single transaction: run the body, then insert the ledger row with
/// `executed_at = now()` or, if it exists, set `executed_at = now()` and clear
/// `deleted_at`. Any failure rolls the whole transaction back.
pub fn apply_migration(ledger: &dyn LedgerStore, unit: &dyn Migration) -> MigrationOutcome {
    let name = unit.name().to_string();
    let start = Instant::now();
    log::debug!("applying {name}");

    let result = ledger.run_in_transaction(&mut |tx| {
        unit.apply(tx.schema())?;

        let now = Utc::now();
        match tx.find_by_name(&name)? {
            None => tx.insert(&MigrationRecord::executed(name.as_str(), now)),
            Some(_) => tx
                .update_by_name(&name, &RecordChanges::executed(now))
                .map(|_| ()),
        }
    });

    match result {
        Ok(()) => {
            let elapsed_ms = start.elapsed().as_millis();
            log::info!("applied {name} ({elapsed_ms} ms)");
            MigrationOutcome::Applied { name, elapsed_ms }
        }
        Err(e) => {
            let error = MigrationError::execution(&name, e);
            log::error!("{error}");
            MigrationOutcome::Failed { name, error }
        }
    }
}

/// Apply `units` in the given order
///
/// With `concurrency <= 1` units run one after another. Otherwise up to
/// `concurrency` units run at a time, each in its own coroutine. Outcomes are
/// returned in the order of `units` either way; a panicking unit fails alone.
pub fn apply_all(
    ledger: Arc<dyn LedgerStore>,
    units: Vec<Arc<dyn Migration>>,
    concurrency: usize,
) -> Vec<MigrationOutcome> {
    if concurrency <= 1 {
        return units
            .iter()
            .map(|unit| guarded(ledger.as_ref(), unit.as_ref()))
            .collect();
    }

    let mut outcomes = Vec::with_capacity(units.len());
    for batch in units.chunks(concurrency) {
        let handles: Vec<_> = batch
            .iter()
            .map(|unit| {
                let name = unit.name().to_string();
                let ledger = Arc::clone(&ledger);
                let unit = Arc::clone(unit);
                let builder = may::coroutine::Builder::new()
                    .name(format!("migrate-{name}"))
                    .stack_size(COROUTINE_STACK_SIZE);
                let handle = may::go!(builder, move || guarded(ledger.as_ref(), unit.as_ref()));
                (name, handle)
            })
            .collect();

        for (name, handle) in handles {
            let outcome = match handle {
                Ok(handle) => handle.join().unwrap_or_else(|payload| aborted(name, payload.as_ref())),
                Err(e) => aborted(name, &format!("could not spawn coroutine: {e}")),
            };
            outcomes.push(outcome);
        }
    }
    outcomes
}

/// `apply_migration`, with a panic turned into a failed outcome
fn guarded(ledger: &dyn LedgerStore, unit: &dyn Migration) -> MigrationOutcome {
    panic::catch_unwind(AssertUnwindSafe(|| apply_migration(ledger, unit)))
        .unwrap_or_else(|payload| aborted(unit.name().to_string(), payload.as_ref()))
}

fn aborted(name: String, payload: &(dyn Any + Send)) -> MigrationOutcome {
    let reason = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panicked".to_string());

    let error = MigrationError::Aborted {
        name: name.clone(),
        reason,
    };
    log::error!("{error}");
    MigrationOutcome::Failed { name, error }
}
