//! Confirmation and tombstoning of migrations removed from disk

use crate::migration::prompt::{is_affirmative, OperatorPrompt};
use crate::migration::{LedgerStore, MigrationError, RecordChanges};
use chrono::Utc;

/// What happened to the names found missing from disk
#[derive(Debug, Default)]
pub enum DriftOutcome {
    #[default]
    NoDrift,
    /// The operator said no; the ledger is untouched
    Declined { names: Vec<String> },
    /// The operator confirmed; each name was tombstoned or failed on its own
    Tombstoned {
        marked: Vec<String>,
        failed: Vec<(String, MigrationError)>,
    },
}

impl DriftOutcome {
    /// Names tombstoned by this run
    pub fn marked(&self) -> &[String] {
        match self {
            DriftOutcome::Tombstoned { marked, .. } => marked,
            _ => &[],
        }
    }

    /// Tombstone failures, empty unless the operator confirmed
    pub fn failures(&self) -> &[(String, MigrationError)] {
        match self {
            DriftOutcome::Tombstoned { failed, .. } => failed,
            _ => &[],
        }
    }
}

pub struct DriftHandler<'a> {
    ledger: &'a dyn LedgerStore,
    prompt: &'a dyn OperatorPrompt,
}

impl<'a> DriftHandler<'a> {
    pub fn new(ledger: &'a dyn LedgerStore, prompt: &'a dyn OperatorPrompt) -> Self {
        Self { ledger, prompt }
    }

    /// Ask whether `deleted` should be tombstoned and do so if confirmed
    ///
    /// A failed prompt counts as a refusal. Never returns an error: failures
    /// are carried per name in the outcome.
    pub fn handle(&self, deleted: &[String]) -> DriftOutcome {
        if deleted.is_empty() {
            return DriftOutcome::NoDrift;
        }

        log::warn!(
            "{} migration(s) recorded in the ledger are missing from disk: {}",
            deleted.len(),
            deleted.join(", ")
        );

        let question = format!(
            "The following migrations were removed from disk:\n  {}\nMark them as deleted in the ledger?",
            deleted.join("\n  ")
        );
        let confirmed = match self.prompt.ask(&question) {
            Ok(answer) => is_affirmative(&answer),
            Err(e) => {
                log::warn!("could not read an answer ({e}), assuming no");
                false
            }
        };

        if !confirmed {
            log::warn!("deletion not confirmed, ledger left unchanged");
            return DriftOutcome::Declined {
                names: deleted.to_vec(),
            };
        }

        self.tombstone(deleted)
    }

    /// One transaction, one savepoint per name
    fn tombstone(&self, deleted: &[String]) -> DriftOutcome {
        let changes = RecordChanges::tombstoned(Utc::now());
        let mut marked = Vec::new();
        let mut failed = Vec::new();

        let committed = self.ledger.run_in_transaction(&mut |tx| {
            marked.clear();
            failed.clear();
            for name in deleted {
                let outcome = tx.savepoint(&mut |sp| match sp.update_by_name(name, &changes)? {
                    0 => Err(MigrationError::RecordNotFound(name.clone())),
                    _ => Ok(()),
                });
                match outcome {
                    Ok(()) => marked.push(name.clone()),
                    Err(e) => failed.push((name.clone(), e)),
                }
            }
            Ok(())
        });

        if let Err(e) = committed {
            let cause = e.to_string();
            log::error!("tombstone transaction failed: {cause}");
            marked.clear();
            failed = deleted
                .iter()
                .map(|name| (name.clone(), MigrationError::Other(cause.clone())))
                .collect();
        }

        for (name, e) in &failed {
            log::error!("could not mark {name} as deleted: {e}");
        }
        if !marked.is_empty() {
            log::info!("marked {} migration(s) as deleted", marked.len());
        }

        DriftOutcome::Tombstoned { marked, failed }
    }
}
