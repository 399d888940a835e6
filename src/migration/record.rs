//! `MigrationRecord` - one row of the migration ledger

use chrono::{DateTime, Utc};

/// A row in the migration ledger
///
/// `executed_at == None` means the migration is known but has not run;
/// `deleted_at != None` is a tombstone: the script left the migrations
/// directory and an operator confirmed its removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Filename stem, `<timestamp>_<label>`
    pub name: String,
    pub registered_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MigrationRecord {
    /// A freshly registered record that has not run yet
    #[must_use]
    pub fn registered(name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            registered_at: at,
            executed_at: None,
            deleted_at: None,
        }
    }

    /// A record created at the moment its migration ran
    #[must_use]
    pub fn executed(name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            executed_at: Some(at),
            ..Self::registered(name, at)
        }
    }

    /// Known, not yet run, not tombstoned
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.executed_at.is_none() && self.deleted_at.is_none()
    }

    #[must_use]
    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Create a `MigrationRecord` from a database row
    ///
    /// Expected column order: `name`, `registered_at`, `executed_at`, `deleted_at`
    ///
    /// # Errors
    ///
    /// Returns `DbError` if a column is missing or has an unexpected type.
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, crate::DbError> {
        Ok(Self {
            name: row.try_get(0)?,
            registered_at: row.try_get(1)?,
            executed_at: row.try_get(2)?,
            deleted_at: row.try_get(3)?,
        })
    }

    /// Applies `changes` in place
    pub fn apply(&mut self, changes: &RecordChanges) {
        if let Some(executed_at) = changes.executed_at {
            self.executed_at = executed_at;
        }
        if let Some(deleted_at) = changes.deleted_at {
            self.deleted_at = deleted_at;
        }
    }
}

/// Column updates for `update_by_name`
///
/// The outer `Option` says whether the column is touched, the inner one is the
/// new nullable value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordChanges {
    pub executed_at: Option<Option<DateTime<Utc>>>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
}

impl RecordChanges {
    /// Mark executed and clear any tombstone
    #[must_use]
    pub fn executed(at: DateTime<Utc>) -> Self {
        Self {
            executed_at: Some(Some(at)),
            deleted_at: Some(None),
        }
    }

    /// Tombstone the record
    #[must_use]
    pub fn tombstoned(at: DateTime<Utc>) -> Self {
        Self {
            executed_at: None,
            deleted_at: Some(Some(at)),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executed_at.is_none() && self.deleted_at.is_none()
    }
}
