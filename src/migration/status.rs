//! Run reports and read-only views of the ledger

use crate::migration::apply::MigrationOutcome;
use crate::migration::drift::DriftOutcome;
use crate::migration::reconcile::{reconcile, Reconciliation};
use crate::migration::{sort_for_execution, MigrationError, MigrationRecord};
use std::collections::BTreeSet;

/// Everything that happened during one `Migrator::run`
#[derive(Debug, Default)]
pub struct RunReport {
    pub reconciliation: Reconciliation,
    /// New disk names registered in the ledger
    pub synced: Vec<String>,
    /// New disk names that could not be registered; excluded from this run
    pub sync_failures: Vec<(String, MigrationError)>,
    pub drift: DriftOutcome,
    /// Pending names without a script, skipped
    pub orphaned: Vec<String>,
    /// Execution outcomes, in execution order
    pub outcomes: Vec<MigrationOutcome>,
}

impl RunReport {
    /// Nothing was pending
    #[must_use]
    pub fn nothing_to_do(&self) -> bool {
        self.outcomes.is_empty()
    }

    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.succeeded_count()
    }

    /// Every failure of the run: sync, tombstone and execution, in that order
    pub fn failures(&self) -> Vec<(&str, &MigrationError)> {
        let sync = self.sync_failures.iter().map(|(n, e)| (n.as_str(), e));
        let drift = self.drift.failures().iter().map(|(n, e)| (n.as_str(), e));
        let execution = self
            .outcomes
            .iter()
            .filter_map(|o| o.error().map(|e| (o.name(), e)));
        sync.chain(drift).chain(execution).collect()
    }

    /// Success only if nothing failed anywhere
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().is_empty()
    }
}

/// Read-only classification of every known migration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStatus {
    pub executed: Vec<String>,
    pub pending: Vec<String>,
    /// On disk but not yet registered
    pub new_on_disk: Vec<String>,
    /// Live ledger rows without a script
    pub deleted_from_disk: Vec<String>,
    pub tombstoned: Vec<String>,
    pub orphaned: Vec<String>,
}

impl LedgerStatus {
    #[must_use]
    pub fn new(disk: &BTreeSet<String>, records: &[MigrationRecord]) -> Self {
        let reconciliation = reconcile(disk, records);

        let mut executed: Vec<String> = records
            .iter()
            .filter(|r| r.executed_at.is_some() && !r.is_tombstoned())
            .map(|r| r.name.clone())
            .collect();
        let mut tombstoned: Vec<String> = records
            .iter()
            .filter(|r| r.is_tombstoned())
            .map(|r| r.name.clone())
            .collect();
        sort_for_execution(&mut executed);
        sort_for_execution(&mut tombstoned);

        Self {
            executed,
            orphaned: reconciliation.orphaned(),
            pending: reconciliation.pending_from_ledger,
            new_on_disk: reconciliation.new_on_disk,
            deleted_from_disk: reconciliation.deleted_from_disk,
            tombstoned,
        }
    }

    /// Names a run would try to execute
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.pending.len() + self.new_on_disk.len() - self.orphaned.len()
    }
}

/// What a run would do, computed without touching the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    /// New disk names that would be registered
    pub register: Vec<String>,
    /// Names that would be offered for tombstoning
    pub tombstone_candidates: Vec<String>,
    /// Pending names that would be skipped for lack of a script
    pub orphaned: Vec<String>,
    /// Names that would be executed, in order
    pub execute: Vec<String>,
}

impl MigrationPlan {
    #[must_use]
    pub fn new(reconciliation: &Reconciliation) -> Self {
        let orphaned = reconciliation.orphaned();
        let execute = reconciliation
            .execution_set()
            .into_iter()
            .filter(|name| !orphaned.contains(name))
            .collect();

        Self {
            register: reconciliation.new_on_disk.clone(),
            tombstone_candidates: reconciliation.deleted_from_disk.clone(),
            orphaned,
            execute,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.execute.is_empty() && self.tombstone_candidates.is_empty()
    }
}
