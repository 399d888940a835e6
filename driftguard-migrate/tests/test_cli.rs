//! Argument parsing, settings resolution and output of the migration CLI

use chrono::Utc;
use clap::Parser;
use driftguard::migration::{
    MemoryLedger, MigrationRecord, MigrationRegistry, Migrator, ScriptedPrompt, SqlMigration,
};
use driftguard::Settings;
use driftguard_migrate::cli::{resolve_database_url, Cli, CliError, Commands, UpArgs};
use driftguard_migrate::commands::{self, render_plan, render_report, render_status};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("driftguard-migrate").chain(args.iter().copied()))
        .expect("arguments parse")
}

fn plain() {
    colored::control::set_override(false);
}

fn registry(names: &[&str]) -> MigrationRegistry {
    let mut registry = MigrationRegistry::new();
    for name in names {
        registry
            .register(Arc::new(SqlMigration::new(*name, format!("{name}.sql"), "SELECT 1")))
            .expect("unique names");
    }
    registry
}

#[test]
fn test_no_subcommand_means_up() {
    let cli = parse(&[]);
    assert_eq!(cli.command(), Commands::Up(UpArgs::default()));
}

#[test]
fn test_up_flags_without_subcommand() {
    let cli = parse(&["--yes", "--concurrency", "4", "--dry-run"]);
    assert_eq!(
        cli.command(),
        Commands::Up(UpArgs {
            yes: true,
            concurrency: Some(4),
            dry_run: true,
        })
    );
}

#[test]
fn test_up_subcommand_with_global_flags_after_it() {
    let cli = parse(&["up", "-y", "--migrations-dir", "db/migs", "-v"]);
    assert!(matches!(cli.command(), Commands::Up(UpArgs { yes: true, .. })));
    assert_eq!(cli.migrations_dir, Some(PathBuf::from("db/migs")));
    assert_eq!(cli.log_level(), "debug");
}

#[test]
fn test_generate_label_is_optional() {
    assert_eq!(
        parse(&["generate", "add_users"]).command(),
        Commands::Generate {
            label: Some("add_users".to_string())
        }
    );
    assert_eq!(parse(&["generate"]).command(), Commands::Generate { label: None });
}

#[test]
fn test_status_subcommand() {
    assert_eq!(parse(&["status", "-q"]).command(), Commands::Status);
    assert_eq!(parse(&["status", "-q"]).log_level(), "error");
}

#[test]
fn test_status_and_dry_run_are_read_only() {
    assert!(parse(&["status"]).command().is_read_only());
    assert!(parse(&["--dry-run"]).command().is_read_only());
    assert!(parse(&["up", "--dry-run"]).command().is_read_only());
    assert!(!parse(&[]).command().is_read_only());
    assert!(!parse(&["up", "--yes"]).command().is_read_only());
    assert!(!parse(&["generate", "init"]).command().is_read_only());
}

#[test]
fn test_verbose_and_quiet_conflict() {
    assert!(Cli::try_parse_from(["driftguard-migrate", "-v", "-q"]).is_err());
}

#[test]
fn test_up_flags_rejected_with_other_subcommand() {
    assert!(Cli::try_parse_from(["driftguard-migrate", "--yes", "status"]).is_err());
}

#[test]
fn test_settings_file_and_flag_overrides() {
    let dir = TempDir::new().expect("tempdir");
    let file = dir.path().join("driftguard.toml");
    fs::write(
        &file,
        "[database]\nurl = \"postgres://file@db/app\"\nmax_connections = 2\n\n[migrations]\ndir = \"from_file\"\n",
    )
    .expect("write settings");
    let config = file.to_string_lossy().to_string();

    let settings = parse(&["--config", &config]).settings().expect("settings");
    assert_eq!(settings.database.url.as_deref(), Some("postgres://file@db/app"));
    assert_eq!(settings.migrations.dir, PathBuf::from("from_file"));

    let settings = parse(&[
        "--config",
        &config,
        "--database-url",
        "postgres://flag@db/app",
        "--migrations-dir",
        "from_flag",
        "--concurrency",
        "8",
    ])
    .settings()
    .expect("settings");
    assert_eq!(settings.database.url.as_deref(), Some("postgres://flag@db/app"));
    assert_eq!(settings.migrations.dir, PathBuf::from("from_flag"));
    assert_eq!(settings.effective_concurrency(), 2);
}

#[test]
fn test_missing_explicit_settings_file_is_error() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("absent.toml").to_string_lossy().to_string();
    assert!(matches!(
        parse(&["--config", &missing]).settings(),
        Err(CliError::Settings(_))
    ));
}

#[test]
fn test_database_url_from_settings_wins() {
    let mut settings = Settings::default();
    settings.database.url = Some("postgres://settings@db/app".to_string());
    assert_eq!(
        resolve_database_url(&settings).expect("url"),
        "postgres://settings@db/app"
    );
}

#[test]
fn test_dry_run_leaves_ledger_alone() {
    let ledger = Arc::new(MemoryLedger::new());
    let migrator = Migrator::new(ledger.clone(), registry(&["20240101000000_a"]));

    let ok = commands::up(
        &migrator,
        &UpArgs {
            dry_run: true,
            ..UpArgs::default()
        },
    )
    .expect("dry run");
    assert!(ok);
    assert!(ledger.records().is_empty());
}

#[test]
fn test_up_with_yes_tombstones_without_prompting() {
    let ledger = Arc::new(MemoryLedger::with_records([MigrationRecord::executed(
        "20240101000000_gone",
        Utc::now(),
    )]));
    let migrator = Migrator::new(ledger.clone(), registry(&["20240102000000_b"]));

    let ok = commands::up(
        &migrator,
        &UpArgs {
            yes: true,
            ..UpArgs::default()
        },
    )
    .expect("run");
    assert!(ok);
    assert!(ledger
        .record("20240101000000_gone")
        .is_some_and(|r| r.is_tombstoned()));
    assert!(ledger
        .record("20240102000000_b")
        .is_some_and(|r| r.executed_at.is_some()));
}

#[test]
fn test_up_reports_failure() {
    let ledger = Arc::new(MemoryLedger::new());
    ledger.fail_statements_containing("SELECT 1");
    let migrator = Migrator::new(ledger.clone(), registry(&["20240101000000_a"]));

    let ok = commands::up(&migrator, &UpArgs::default()).expect("run");
    assert!(!ok);
}

#[test]
fn test_render_report() {
    plain();
    let ledger = Arc::new(MemoryLedger::new());
    ledger.fail_statements_containing("BROKEN");
    let mut registry = registry(&["20240101000000_a"]);
    registry
        .register(Arc::new(SqlMigration::new("20240102000000_b", "b.sql", "BROKEN")))
        .expect("unique");

    let report = Migrator::new(ledger, registry)
        .run(&ScriptedPrompt::answering("n"))
        .expect("run");
    let out = render_report(&report);

    assert!(out.contains("registered 20240101000000_a"));
    assert!(out.contains("applied 20240101000000_a"));
    assert!(out.contains("failed 20240102000000_b"));
    assert!(out.contains("1 applied, 1 failed"));
}

#[test]
fn test_render_nothing_to_do() {
    plain();
    let ledger = Arc::new(MemoryLedger::new());
    let report = Migrator::new(ledger, MigrationRegistry::new())
        .run(&ScriptedPrompt::answering("n"))
        .expect("run");
    assert!(render_report(&report).contains("Nothing to do"));
}

#[test]
fn test_render_plan_and_status() {
    plain();
    let ledger = Arc::new(MemoryLedger::with_records([MigrationRecord::executed(
        "20240101000000_gone",
        Utc::now(),
    )]));
    let migrator = Migrator::new(ledger, registry(&["20240102000000_b", "20240103000000_c"]));

    let plan = render_plan(&migrator.plan().expect("plan"));
    assert!(plan.contains("Would ask to delete (1):\n  20240101000000_gone"));
    assert!(plan.contains("Would apply (2):\n  1. 20240102000000_b\n  2. 20240103000000_c"));

    let status = render_status(&migrator.status().expect("status"));
    assert!(status.contains("New on disk (2):"));
    assert!(status.contains("Summary: 0 executed, 2 to run, 1 missing from disk"));
}

#[test]
fn test_generate_writes_into_directory() {
    plain();
    let dir = TempDir::new().expect("tempdir");
    let ledger = MemoryLedger::new();
    commands::generate(dir.path(), Some("init"), &ledger).expect("generate");

    let files: Vec<_> = fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("_init.sql"));
    assert_eq!(ledger.records().len(), 1);
}
