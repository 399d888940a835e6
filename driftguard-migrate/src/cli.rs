//! Command-line arguments and settings resolution

use clap::{Args, Parser, Subcommand};
use driftguard::config::DEFAULT_CONFIG_FILE;
use driftguard::connection::connection_string_from_env_parts;
use driftguard::Settings;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "driftguard-migrate")]
#[command(about = "Reconcile a migrations directory with its ledger and apply what is pending")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Database connection URL
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Migrations directory path
    #[arg(long, global = true)]
    pub migrations_dir: Option<PathBuf>,

    /// Settings file (default: config/driftguard.toml, if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Arguments for `up` when no subcommand is given
    #[command(flatten)]
    pub up: UpArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Register new migrations, handle removed ones and apply everything pending (default)
    Up(UpArgs),

    /// Show executed, pending, new and removed migrations
    Status,

    /// Generate a new, empty migration file and register it
    Generate {
        /// Descriptive label; a random one is used if omitted
        label: Option<String>,
    },
}

impl Commands {
    /// Commands that only read the ledger and must not create its table
    pub fn is_read_only(&self) -> bool {
        matches!(self, Commands::Status | Commands::Up(UpArgs { dry_run: true, .. }))
    }
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct UpArgs {
    /// Confirm removal of migrations missing from disk without asking
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Number of migrations to run at once (default: from settings, 1)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Show what would be done without touching the database
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(
        "Database URL not provided. Use --database-url, set database.url in the settings file, \
         DATABASE_URL, or DB_HOST/DB_PORT/DB_USERNAME/DB_PASSWORD/DB_NAME"
    )]
    MissingDatabaseUrl,

    #[error("Failed to load settings: {0}")]
    Settings(#[from] driftguard::config::ConfigError),
}

impl Cli {
    /// The command to run; `up` when none was given
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Up(self.up.clone()))
    }

    /// Log filter implied by `-v` / `-q`
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Settings from file and environment, with command-line overrides applied
    pub fn settings(&self) -> Result<Settings, CliError> {
        let mut settings = match &self.config {
            Some(path) => Settings::load_from(path, true)?,
            None => Settings::load_from(Path::new(DEFAULT_CONFIG_FILE), false)?,
        };

        if let Some(dir) = &self.migrations_dir {
            settings.migrations.dir = dir.clone();
        }
        if let Some(url) = &self.database_url {
            settings.database.url = Some(url.clone());
        }
        if let Commands::Up(UpArgs {
            concurrency: Some(n), ..
        }) = self.command()
        {
            settings.migrations.concurrency = n;
        }
        Ok(settings)
    }
}

/// Database URL: settings (which include `--database-url`), then
/// `DATABASE_URL`, then one assembled from `DB_*` parts
pub fn resolve_database_url(settings: &Settings) -> Result<String, CliError> {
    settings
        .database
        .url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .or_else(connection_string_from_env_parts)
        .filter(|url| !url.trim().is_empty())
        .ok_or(CliError::MissingDatabaseUrl)
}
