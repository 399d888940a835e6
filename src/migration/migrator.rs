//! Migrator - reconciliation and execution cycle

use crate::migration::apply::{apply_all, MigrationOutcome};
use crate::migration::drift::DriftHandler;
use crate::migration::prompt::OperatorPrompt;
use crate::migration::reconcile::{reconcile, Reconciliation};
use crate::migration::status::{LedgerStatus, MigrationPlan, RunReport};
use crate::migration::{LedgerStore, Migration, MigrationError, MigrationRecord, MigrationRegistry};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Brings the database in line with the registered migrations
///
/// The registry stands for the migrations directory: its names are the names
/// "on disk". A run goes through these steps:
///
/// 1. read the ledger and reconcile it with the registry
/// 2. register new names in the ledger
/// 3. offer names missing from disk for tombstoning
/// 4. skip pending names whose script is gone
/// 5. execute what is left, in timestamp order
///
/// Steps 2 to 5 never stop early; every failure lands in the [`RunReport`].
pub struct Migrator {
    ledger: Arc<dyn LedgerStore>,
    registry: MigrationRegistry,
    concurrency: usize,
}

impl Migrator {
    pub fn new(ledger: Arc<dyn LedgerStore>, registry: MigrationRegistry) -> Self {
        Self {
            ledger,
            registry,
            concurrency: 1,
        }
    }

    /// Run up to `concurrency` migrations at a time (1 = strictly sequential)
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Compare the registry with the ledger
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn reconcile(&self) -> Result<Reconciliation, MigrationError> {
        let records = self.ledger.select_all()?;
        Ok(reconcile(&self.registry.names(), &records))
    }

    /// Read-only status of every known migration
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn status(&self) -> Result<LedgerStatus, MigrationError> {
        let records = self.ledger.select_all()?;
        Ok(LedgerStatus::new(&self.registry.names(), &records))
    }

    /// What [`run`](Self::run) would do, without changing anything
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn plan(&self) -> Result<MigrationPlan, MigrationError> {
        Ok(MigrationPlan::new(&self.reconcile()?))
    }

    /// Run the full cycle
    ///
    /// `prompt` is consulted only if ledger rows have lost their script.
    ///
    /// # Errors
    ///
    /// Only a ledger read failure is returned as an error. Everything after
    /// that is reported per name in the `RunReport`; check
    /// [`RunReport::is_success`].
    pub fn run(&self, prompt: &dyn OperatorPrompt) -> Result<RunReport, MigrationError> {
        let reconciliation = self.reconcile()?;
        log::info!(
            "{} migration(s) on disk: {} new, {} pending, {} missing from disk",
            self.registry.len(),
            reconciliation.new_on_disk.len(),
            reconciliation.pending_from_ledger.len(),
            reconciliation.deleted_from_disk.len()
        );

        let mut report = RunReport {
            reconciliation: reconciliation.clone(),
            ..RunReport::default()
        };

        let excluded = self.sync(&reconciliation.new_on_disk, &mut report);

        report.drift = DriftHandler::new(self.ledger.as_ref(), prompt).handle(&reconciliation.deleted_from_disk);

        // Tombstoned names were dealt with by the drift handler
        let orphaned = reconciliation.orphaned();
        let tombstoned = report.drift.marked();
        report.orphaned = orphaned
            .iter()
            .filter(|name| !tombstoned.contains(name))
            .cloned()
            .collect();
        for name in &report.orphaned {
            log::warn!("{name} is pending but its script is missing, skipping it");
        }

        let planned: Vec<(String, Option<Arc<dyn Migration>>)> = reconciliation
            .execution_set()
            .into_iter()
            .filter(|name| !excluded.contains(name) && !orphaned.contains(name))
            .map(|name| {
                let unit = self.registry.get(&name);
                (name, unit)
            })
            .collect();

        if planned.is_empty() {
            log::info!("nothing to do, the database is up to date");
            return Ok(report);
        }

        report.outcomes = self.execute(planned);
        log::info!(
            "{} migration(s) succeeded, {} failed",
            report.succeeded_count(),
            report.failed_count()
        );
        Ok(report)
    }

    /// Register new names; returns those that could not be registered
    fn sync(&self, new_on_disk: &[String], report: &mut RunReport) -> BTreeSet<String> {
        let now = Utc::now();
        let mut excluded = BTreeSet::new();

        for name in new_on_disk {
            match self.ledger.insert(&MigrationRecord::registered(name.as_str(), now)) {
                Ok(()) => {
                    log::debug!("registered {name}");
                    report.synced.push(name.clone());
                }
                Err(e) => {
                    log::error!("could not register {name}, skipping it this run: {e}");
                    excluded.insert(name.clone());
                    report.sync_failures.push((name.clone(), e));
                }
            }
        }
        excluded
    }

    /// Execute the planned names, keeping their order in the outcomes
    fn execute(&self, planned: Vec<(String, Option<Arc<dyn Migration>>)>) -> Vec<MigrationOutcome> {
        let units: Vec<Arc<dyn Migration>> = planned.iter().filter_map(|(_, unit)| unit.clone()).collect();
        let mut applied = apply_all(Arc::clone(&self.ledger), units, self.concurrency).into_iter();

        planned
            .into_iter()
            .filter_map(|(name, unit)| match unit {
                Some(_) => applied.next(),
                None => {
                    let error = MigrationError::MissingUnit(name.clone());
                    log::error!("{error}");
                    Some(MigrationOutcome::Failed { name, error })
                }
            })
            .collect()
    }
}
