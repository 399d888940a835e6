//! Migration skeleton generation

use crate::migration::{LedgerStore, MigrationError, MigrationName, MigrationRecord, MIGRATION_EXTENSION};
use chrono::{DateTime, Utc};
use fake::faker::filesystem::en::FileName;
use fake::Fake;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A freshly generated migration
#[derive(Debug, Clone)]
pub struct GeneratedMigration {
    pub name: String,
    pub path: PathBuf,
}

/// Write `<YYYYMMDDHHMMSSmmm>_<label>.sql` into `migrations_dir` and register
/// it in the ledger as not yet executed
///
/// Without a label a random file-name-like word is used. The directory is
/// created if needed; an existing file is never overwritten.
///
/// # Errors
///
/// Returns an error if the label has no usable characters, the file cannot be
/// written, or the ledger insert fails. In the last case the file stays on
/// disk and is registered by the next run.
pub fn generate_migration(
    migrations_dir: &Path,
    label: Option<&str>,
    ledger: &dyn LedgerStore,
) -> Result<GeneratedMigration, MigrationError> {
    generate_migration_at(migrations_dir, label, ledger, Utc::now())
}

fn generate_migration_at(
    migrations_dir: &Path,
    label: Option<&str>,
    ledger: &dyn LedgerStore,
    now: DateTime<Utc>,
) -> Result<GeneratedMigration, MigrationError> {
    let label = match label {
        Some(label) => sanitize_label(label),
        None => random_label(),
    };
    let name = format!("{}_{label}", now.format("%Y%m%d%H%M%S%3f"));
    MigrationName::parse(&name)?;

    fs::create_dir_all(migrations_dir).map_err(|source| MigrationError::Unreadable {
        path: migrations_dir.to_path_buf(),
        source,
    })?;

    let path = migrations_dir.join(format!("{name}.{MIGRATION_EXTENSION}"));
    let unwritable = |source| MigrationError::Unreadable {
        path: path.clone(),
        source,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(unwritable)?;
    file.write_all(skeleton(&name, now).as_bytes())
        .map_err(unwritable)?;

    ledger.insert(&MigrationRecord::registered(name.as_str(), now))?;
    log::info!("generated {}", path.display());

    Ok(GeneratedMigration { name, path })
}

fn skeleton(name: &str, now: DateTime<Utc>) -> String {
    format!(
        "-- Migration: {name}\n-- Generated: {}\n\n",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

/// Keep ASCII alphanumerics, `-` and `_`; anything else becomes `_`
fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    cleaned
        .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}

fn random_label() -> String {
    let file: String = FileName().fake();
    let stem = file.split('.').next().unwrap_or_default();
    match sanitize_label(stem) {
        label if label.is_empty() => "migration".to_string(),
        label => label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::MemoryLedger;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9)
            .single()
            .expect("valid date")
            + chrono::Duration::milliseconds(42)
    }

    #[test]
    fn test_generates_file_and_registers_it() {
        let dir = TempDir::new().expect("tempdir");
        let ledger = MemoryLedger::new();

        let generated = generate_migration_at(dir.path(), Some("add users"), &ledger, at()).expect("generated");

        assert_eq!(generated.name, "20240305140709042_add_users");
        assert_eq!(generated.path, dir.path().join("20240305140709042_add_users.sql"));
        let body = fs::read_to_string(&generated.path).expect("file written");
        assert!(body.starts_with("-- Migration: 20240305140709042_add_users"));

        let record = ledger.record(&generated.name).expect("registered");
        assert!(record.is_pending());
    }

    #[test]
    fn test_random_label_is_a_valid_name() {
        let dir = TempDir::new().expect("tempdir");
        let ledger = MemoryLedger::new();

        let generated = generate_migration(dir.path(), None, &ledger).expect("generated");
        assert!(MigrationName::is_valid(&generated.name));
        assert!(generated.path.is_file());
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = TempDir::new().expect("tempdir");
        let nested = dir.path().join("db").join("migs");
        generate_migration(&nested, Some("init"), &MemoryLedger::new()).expect("generated");
        assert!(nested.is_dir());
    }

    #[test]
    fn test_never_overwrites() {
        let dir = TempDir::new().expect("tempdir");
        let ledger = MemoryLedger::new();
        generate_migration_at(dir.path(), Some("init"), &ledger, at()).expect("first");
        assert!(generate_migration_at(dir.path(), Some("init"), &ledger, at()).is_err());
    }

    #[test]
    fn test_unusable_label_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        assert!(matches!(
            generate_migration(dir.path(), Some("!!!"), &MemoryLedger::new()),
            Err(MigrationError::InvalidName(_))
        ));
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label(" create users.table "), "create_users_table");
        assert_eq!(sanitize_label("-_x-y"), "x-y");
        assert_eq!(sanitize_label("ünïcode"), "n_code");
    }
}
