//! Layered settings: built-in defaults, an optional TOML file, then
//! `DRIFTGUARD__*` environment variables.

pub use ::config::ConfigError;
use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default settings file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config/driftguard.toml";

/// Root settings for a migration run
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Connection string; falls back to `DATABASE_URL` / `DB_*` when unset
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_ledger_table")]
    pub ledger_table: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MigrationsConfig {
    #[serde(default = "default_migrations_dir")]
    pub dir: PathBuf,
    /// How many migrations may run at once; 1 keeps strict timestamp order
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_max_connections() -> usize {
    10
}

fn default_ledger_table() -> String {
    "migration_history".to_string()
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_concurrency() -> usize {
    1
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            ledger_table: default_ledger_table(),
        }
    }
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_migrations_dir(),
            concurrency: default_concurrency(),
        }
    }
}

impl Settings {
    /// Load settings from `config/driftguard.toml` (optional) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE), false)
    }

    /// Load settings from the given file and the environment
    ///
    /// When `required` is false a missing file is skipped. A file that exists
    /// but cannot be parsed is always an error.
    pub fn load_from(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(Environment::with_prefix("DRIFTGUARD").separator("__"))
            .build()
            .map_err(|e| {
                ConfigError::Message(format!(
                    "failed to load settings from {}: {e}",
                    path.display()
                ))
            })?;

        settings.try_deserialize::<Settings>()?.validated()
    }

    /// Parse settings from a TOML string, without consulting the environment
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize::<Settings>()?
            .validated()
    }

    /// Concurrency actually used for a run: at least 1, at most the connection budget
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        self.migrations
            .concurrency
            .clamp(1, self.database.max_connections.max(1))
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if !crate::migration::is_valid_identifier(&self.database.ledger_table) {
            return Err(ConfigError::Message(format!(
                "database.ledger_table '{}' is not a valid SQL identifier",
                self.database.ledger_table
            )));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}
