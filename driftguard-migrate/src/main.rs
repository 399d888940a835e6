//! driftguard migration CLI
//!
//! Reconciles a directory of `.sql` migrations with the ledger table and
//! applies what is pending. Exits 0 on success or when there is nothing to do,
//! 1 on any failure.

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use driftguard::connection::redact;
use driftguard::migration::{discover_migrations, Migrator, PgLedger};
use driftguard_migrate::cli::{resolve_database_url, Cli, Commands};
use driftguard_migrate::commands;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level())).init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    let settings = cli.settings()?;
    let url = resolve_database_url(&settings)?;
    log::debug!("using database {}", redact(&url));

    let command = cli.command();
    let table = &settings.database.ledger_table;
    let ledger = if command.is_read_only() {
        PgLedger::connect_read_only(&url, table)
    } else {
        PgLedger::connect(&url, table)
    }
    .with_context(|| format!("could not prepare the ledger at {}", redact(&url)))?;
    let ledger = Arc::new(ledger);
    let dir = &settings.migrations.dir;

    match command {
        Commands::Generate { label } => {
            commands::generate(dir, label.as_deref(), ledger.as_ref())?;
            Ok(true)
        }
        Commands::Status => {
            let registry = discover_migrations(dir)?;
            commands::status(&Migrator::new(ledger, registry))?;
            Ok(true)
        }
        Commands::Up(args) => {
            let registry = discover_migrations(dir)?;
            let migrator = Migrator::new(ledger, registry).with_concurrency(settings.effective_concurrency());
            commands::up(&migrator, &args)
        }
    }
}
