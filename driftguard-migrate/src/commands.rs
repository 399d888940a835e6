//! Subcommand handlers and their terminal output

use crate::cli::UpArgs;
use colored::Colorize;
use driftguard::migration::{
    generate_migration, AutoConfirm, DriftOutcome, GeneratedMigration, LedgerStatus, LedgerStore,
    MigrationOutcome, MigrationPlan, Migrator, OperatorPrompt, RunReport, StdinPrompt,
};
use std::fmt::Write;
use std::path::Path;

/// `up`: run the cycle, or print the plan for `--dry-run`
///
/// Returns whether the run succeeded.
pub fn up(migrator: &Migrator, args: &UpArgs) -> anyhow::Result<bool> {
    if args.dry_run {
        print!("{}", render_plan(&migrator.plan()?));
        return Ok(true);
    }

    let prompt: &dyn OperatorPrompt = if args.yes { &AutoConfirm } else { &StdinPrompt };
    let report = migrator.run(prompt)?;
    print!("{}", render_report(&report));
    Ok(report.is_success())
}

pub fn status(migrator: &Migrator) -> anyhow::Result<()> {
    print!("{}", render_status(&migrator.status()?));
    Ok(())
}

pub fn generate(migrations_dir: &Path, label: Option<&str>, ledger: &dyn LedgerStore) -> anyhow::Result<()> {
    let GeneratedMigration { name, path } = generate_migration(migrations_dir, label, ledger)?;
    println!("{} {name}", "Generated".green().bold());
    println!("  {}", path.display());
    Ok(())
}

pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();

    for name in &report.synced {
        let _ = writeln!(out, "{} {name}", "registered".cyan());
    }

    match &report.drift {
        DriftOutcome::NoDrift => {}
        DriftOutcome::Declined { names } => {
            let _ = writeln!(
                out,
                "{} {} migration(s) missing from disk, left in the ledger",
                "kept".yellow(),
                names.len()
            );
        }
        DriftOutcome::Tombstoned { marked, .. } => {
            for name in marked {
                let _ = writeln!(out, "{} {name}", "deleted".yellow());
            }
        }
    }

    for name in &report.orphaned {
        let _ = writeln!(out, "{} {name} (script missing)", "skipped".yellow());
    }

    for outcome in &report.outcomes {
        if let MigrationOutcome::Applied { name, elapsed_ms } = outcome {
            let _ = writeln!(out, "{} {name} ({elapsed_ms} ms)", "applied".green());
        }
    }

    let failures = report.failures();
    for (name, error) in &failures {
        let _ = writeln!(out, "{} {name}: {error}", "failed".red().bold());
    }

    if report.nothing_to_do() && failures.is_empty() {
        let _ = writeln!(out, "{}", "Nothing to do, database is up to date".green());
    } else {
        let _ = writeln!(
            out,
            "\n{} applied, {} failed",
            report.succeeded_count().to_string().green(),
            failures.len().to_string().red()
        );
    }
    out
}

pub fn render_plan(plan: &MigrationPlan) -> String {
    let mut out = String::new();
    if plan.is_empty() && plan.register.is_empty() {
        let _ = writeln!(out, "Nothing to do");
        return out;
    }

    section(&mut out, "Would register", &plan.register);
    section(&mut out, "Would ask to delete", &plan.tombstone_candidates);
    section(&mut out, "Would skip (script missing)", &plan.orphaned);

    if !plan.execute.is_empty() {
        let _ = writeln!(out, "{} ({}):", "Would apply".bold(), plan.execute.len());
        for (i, name) in plan.execute.iter().enumerate() {
            let _ = writeln!(out, "  {}. {name}", i + 1);
        }
    }
    out
}

pub fn render_status(status: &LedgerStatus) -> String {
    let mut out = String::new();
    section(&mut out, &"Executed".green().to_string(), &status.executed);
    section(&mut out, &"Pending".yellow().to_string(), &status.pending);
    section(&mut out, &"New on disk".cyan().to_string(), &status.new_on_disk);
    section(&mut out, &"Missing from disk".red().to_string(), &status.deleted_from_disk);
    section(&mut out, "Deleted", &status.tombstoned);
    section(&mut out, &"Orphaned".red().to_string(), &status.orphaned);
    let _ = writeln!(
        out,
        "Summary: {} executed, {} to run, {} missing from disk",
        status.executed.len(),
        status.outstanding(),
        status.deleted_from_disk.len()
    );
    out
}

fn section(out: &mut String, title: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    let _ = writeln!(out, "{title} ({}):", names.len());
    for name in names {
        let _ = writeln!(out, "  {name}");
    }
}
