//! Name-keyed registry of executable migration units
//!
//! Built once at startup, usually by [`crate::migration::discover_migrations`];
//! the orchestrator never looks units up anywhere else.

use crate::migration::{Migration, MigrationError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Default, Clone)]
pub struct MigrationRegistry {
    units: BTreeMap<String, Arc<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit under its own name
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::AlreadyRegistered` if the name is taken.
    pub fn register(&mut self, unit: Arc<dyn Migration>) -> Result<(), MigrationError> {
        let name = unit.name().to_string();
        if self.units.contains_key(&name) {
            return Err(MigrationError::AlreadyRegistered(name));
        }
        self.units.insert(name, unit);
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::AlreadyRegistered` if the name is taken.
    pub fn with(mut self, unit: impl Migration + 'static) -> Result<Self, MigrationError> {
        self.register(Arc::new(unit))?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Migration>> {
        self.units.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// All registered names
    pub fn names(&self) -> BTreeSet<String> {
        self.units.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.units.keys()).finish()
    }
}
