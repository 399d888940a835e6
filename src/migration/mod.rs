//! Forward-only migration engine
//!
//! Migrations are `.sql` files named `<timestamp>_<label>.sql`. A ledger table
//! records every migration that was registered, executed or removed. Each run
//! reconciles the directory with the ledger:
//!
//! - new files are registered and executed
//! - registered but unexecuted migrations are executed
//! - ledger rows whose file disappeared are, after confirmation, tombstoned
//!
//! Every migration runs in its own transaction together with its ledger
//! update, so a failed migration leaves no trace.
//!
//! # Example
//!
//! ```rust,no_run
//! use driftguard::migration::{discover_migrations, AutoConfirm, MemoryLedger, Migrator};
//! use std::sync::Arc;
//!
//! let registry = discover_migrations("migrations")?;
//! let migrator = Migrator::new(Arc::new(MemoryLedger::new()), registry);
//! let report = migrator.run(&AutoConfirm)?;
//! assert!(report.is_success());
//! # Ok::<(), driftguard::migration::MigrationError>(())
//! ```

pub mod apply;
pub mod drift;
pub mod error;
pub mod file;
pub mod generate;
pub mod ledger;
pub mod memory;
pub mod migration;
pub mod migrator;
pub mod name;
pub mod pg_ledger;
pub mod prompt;
pub mod reconcile;
pub mod record;
pub mod registry;
pub mod state_table;
pub mod status;

pub use apply::{apply_all, apply_migration, MigrationOutcome};
pub use drift::{DriftHandler, DriftOutcome};
pub use error::MigrationError;
pub use file::{discover_migrations, list_migration_names, MIGRATION_EXTENSION};
pub use generate::{generate_migration, GeneratedMigration};
pub use ledger::{LedgerStore, LedgerTransaction, TransactionWork};
pub use memory::MemoryLedger;
pub use migration::{FnMigration, Migration, SqlMigration};
pub use migrator::Migrator;
pub use name::{sort_for_execution, MigrationName};
pub use pg_ledger::PgLedger;
pub use prompt::{is_affirmative, AutoConfirm, OperatorPrompt, ScriptedPrompt, StdinPrompt};
pub use reconcile::{reconcile, Reconciliation};
pub use record::{MigrationRecord, RecordChanges};
pub use registry::MigrationRegistry;
pub use state_table::{create_ledger_table_sql, initialize_ledger_table, is_valid_identifier, DEFAULT_LEDGER_TABLE};
pub use status::{LedgerStatus, MigrationPlan, RunReport};
