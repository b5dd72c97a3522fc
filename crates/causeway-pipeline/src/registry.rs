//! Migration registry: the ordered batch a runner executes.

use std::sync::Arc;

use crate::error::PipelineError;
use crate::migration::{Migration, MigrationId};

/// Ordered collection of migrations.
///
/// Order is by id: numeric timestamp prefix first, then the full id
/// lexicographically. Later migrations may depend on earlier ones'
/// recorded variables, so the order is part of the contract.
#[derive(Default)]
pub struct MigrationRegistry {
    entries: Vec<Arc<dyn Migration>>,
}

impl MigrationRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration, keeping the registry sorted.
    ///
    /// # Errors
    /// [`PipelineError::DuplicateMigration`] if the id is already present.
    pub fn register(&mut self, migration: Arc<dyn Migration>) -> Result<(), PipelineError> {
        if self.get(migration.id()).is_some() {
            return Err(PipelineError::DuplicateMigration {
                id: migration.id().clone(),
            });
        }
        self.entries.push(migration);
        self.entries.sort_by(|a, b| a.id().order_key().cmp(&b.id().order_key()));
        Ok(())
    }

    /// Look up a migration by id.
    #[must_use]
    pub fn get(&self, id: &MigrationId) -> Option<&Arc<dyn Migration>> {
        self.entries.iter().find(|m| m.id() == id)
    }

    /// Iterate in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Migration>> {
        self.entries.iter()
    }

    /// Ids in execution order.
    #[must_use]
    pub fn ids(&self) -> Vec<MigrationId> {
        self.entries.iter().map(|m| m.id().clone()).collect()
    }

    /// Number of registered migrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
