//! Migration names: `<timestamp>_<label>` and their execution order

use crate::migration::MigrationError;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static NAME_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(\d{14}|\d{17})_([A-Za-z0-9][A-Za-z0-9_\-]*)$"));

fn name_pattern() -> Result<&'static Regex, MigrationError> {
    NAME_PATTERN
        .as_ref()
        .map_err(|e| MigrationError::Other(format!("invalid name pattern: {e}")))
}

/// A parsed migration name
///
/// The timestamp is either `YYYYMMDDHHMMSS` or `YYYYMMDDHHMMSSmmm`. Names
/// order by timestamp (normalised to milliseconds), then by the full name, so
/// a 14-digit and a 17-digit name for the same second still sort
/// deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MigrationName {
    full: String,
    millis: u64,
    label_start: usize,
}

impl MigrationName {
    /// Parse a filename stem
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidName` if the stem is not `<timestamp>_<label>`.
    pub fn parse(stem: &str) -> Result<Self, MigrationError> {
        let caps = name_pattern()?
            .captures(stem)
            .ok_or_else(|| MigrationError::InvalidName(stem.to_string()))?;
        let stamp = &caps[1];
        let label = caps
            .get(2)
            .ok_or_else(|| MigrationError::InvalidName(stem.to_string()))?;

        let digits: u64 = stamp
            .parse()
            .map_err(|_| MigrationError::InvalidName(stem.to_string()))?;
        let millis = if stamp.len() == 14 { digits * 1000 } else { digits };

        Ok(Self {
            full: stem.to_string(),
            millis,
            label_start: label.start(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }

    /// Timestamp prefix as written
    pub fn timestamp(&self) -> &str {
        &self.full[..self.label_start - 1]
    }

    /// Descriptive suffix after the timestamp
    pub fn label(&self) -> &str {
        &self.full[self.label_start..]
    }

    /// Returns `true` if `stem` is a well-formed migration name
    #[must_use]
    pub fn is_valid(stem: &str) -> bool {
        name_pattern().is_ok_and(|re| re.is_match(stem))
    }
}

impl Ord for MigrationName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.millis
            .cmp(&other.millis)
            .then_with(|| self.full.cmp(&other.full))
    }
}

impl PartialOrd for MigrationName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MigrationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

/// Sort names into execution order
///
/// Well-formed names come first in timestamp order; anything that does not
/// parse (only possible for rows written by other tools) follows in plain
/// lexical order.
pub fn sort_for_execution(names: &mut [String]) {
    names.sort_by(|a, b| match (MigrationName::parse(a), MigrationName::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
}
