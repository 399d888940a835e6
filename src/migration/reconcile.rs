//! Disk/ledger reconciliation
//!
//! A pure comparison of the names found on disk with the ledger contents.

use crate::migration::{sort_for_execution, MigrationRecord};
use std::collections::BTreeSet;

/// Result of comparing disk names with ledger records
///
/// Every list is in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// On disk, never seen by the ledger
    pub new_on_disk: Vec<String>,
    /// In the ledger, not executed and not tombstoned
    pub pending_from_ledger: Vec<String>,
    /// Live (not tombstoned) ledger rows whose script is gone
    pub deleted_from_disk: Vec<String>,
}

impl Reconciliation {
    /// `new_on_disk ∪ pending_from_ledger`, in execution order
    #[must_use]
    pub fn execution_set(&self) -> Vec<String> {
        let union: BTreeSet<&String> = self
            .new_on_disk
            .iter()
            .chain(&self.pending_from_ledger)
            .collect();
        let mut names: Vec<String> = union.into_iter().cloned().collect();
        sort_for_execution(&mut names);
        names
    }

    /// Pending rows whose script no longer exists and therefore cannot run
    #[must_use]
    pub fn orphaned(&self) -> Vec<String> {
        let deleted: BTreeSet<&String> = self.deleted_from_disk.iter().collect();
        self.pending_from_ledger
            .iter()
            .filter(|name| deleted.contains(name))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn has_drift(&self) -> bool {
        !self.deleted_from_disk.is_empty()
    }
}

/// Compare the migrations directory with the ledger
#[must_use]
pub fn reconcile(disk: &BTreeSet<String>, records: &[MigrationRecord]) -> Reconciliation {
    let known: BTreeSet<&str> = records.iter().map(|r| r.name.as_str()).collect();

    let new_on_disk = disk
        .iter()
        .filter(|name| !known.contains(name.as_str()))
        .cloned()
        .collect();

    let pending_from_ledger = records
        .iter()
        .filter(|r| r.is_pending())
        .map(|r| r.name.clone())
        .collect();

    let deleted_from_disk = records
        .iter()
        .filter(|r| !r.is_tombstoned() && !disk.contains(&r.name))
        .map(|r| r.name.clone())
        .collect();

    let mut reconciliation = Reconciliation {
        new_on_disk,
        pending_from_ledger,
        deleted_from_disk,
    };
    sort_for_execution(&mut reconciliation.new_on_disk);
    sort_for_execution(&mut reconciliation.pending_from_ledger);
    sort_for_execution(&mut reconciliation.deleted_from_disk);
    reconciliation
}
