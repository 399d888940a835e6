//! Migration file discovery

use crate::migration::{MigrationError, MigrationName, MigrationRegistry, SqlMigration};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension of migration scripts
pub const MIGRATION_EXTENSION: &str = "sql";

/// List migration names in a directory
///
/// Every `*.sql` file contributes its stem; other files are ignored.
///
/// # Errors
///
/// Returns errors if:
/// - The directory doesn't exist or can't be read
/// - A `.sql` file's stem is not a valid migration name
pub fn list_migration_names(migrations_dir: &Path) -> Result<BTreeSet<String>, MigrationError> {
    Ok(migration_paths(migrations_dir)?
        .into_iter()
        .map(|(name, _)| name)
        .collect())
}

/// Scan a directory once and bind each migration name to its SQL body
///
/// # Errors
///
/// Same as [`list_migration_names`], plus unreadable files.
pub fn discover_migrations(migrations_dir: impl AsRef<Path>) -> Result<MigrationRegistry, MigrationError> {
    let migrations_dir = migrations_dir.as_ref();
    let mut registry = MigrationRegistry::new();

    for (name, path) in migration_paths(migrations_dir)? {
        let sql = fs::read_to_string(&path).map_err(|source| MigrationError::Unreadable {
            path: path.clone(),
            source,
        })?;
        registry.register(Arc::new(SqlMigration::new(name, path, sql)))?;
    }

    log::debug!(
        "discovered {} migration(s) in {}",
        registry.len(),
        migrations_dir.display()
    );
    Ok(registry)
}

fn migration_paths(migrations_dir: &Path) -> Result<Vec<(String, PathBuf)>, MigrationError> {
    if !migrations_dir.is_dir() {
        return Err(MigrationError::DirectoryNotFound(migrations_dir.to_path_buf()));
    }

    let unreadable = |source| MigrationError::Unreadable {
        path: migrations_dir.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    for entry in fs::read_dir(migrations_dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();

        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some(MIGRATION_EXTENSION) {
            continue;
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| MigrationError::InvalidName(path.display().to_string()))?;
        let name = MigrationName::parse(stem)?;
        found.push((name.as_str().to_string(), path));
    }

    Ok(found)
}
