//! Variable sets: values captured at prepare time, consumed read-only by
//! enact and verify.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use causeway_codec::{Address, Value};

use crate::error::PipelineError;
use crate::migration::MigrationId;

/// An immutable, named set of values produced by a migration's prepare
/// stage.
///
/// Built once through [`VariableSetBuilder`]; there is no mutation API. The
/// enact and verify stages receive it by shared reference only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSet {
    entries: BTreeMap<String, Value>,
}

impl VariableSet {
    /// Start building a variable set.
    #[must_use]
    pub fn builder() -> VariableSetBuilder {
        VariableSetBuilder::default()
    }

    /// Look up a value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Look up a value, failing with [`PipelineError::MissingVariable`].
    ///
    /// # Errors
    /// If the variable was not captured at prepare time.
    pub fn require(&self, name: &str) -> Result<&Value, PipelineError> {
        self.get(name).ok_or_else(|| PipelineError::MissingVariable {
            name: name.to_string(),
        })
    }

    /// Look up an address-typed value.
    ///
    /// # Errors
    /// If the variable is missing or is not an address.
    pub fn require_address(&self, name: &str) -> Result<Address, PipelineError> {
        self.require(name)?
            .as_address()
            .ok_or_else(|| PipelineError::MissingVariable {
                name: name.to_string(),
            })
    }

    /// Number of captured variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Builder for [`VariableSet`].
#[derive(Debug, Default)]
pub struct VariableSetBuilder {
    entries: BTreeMap<String, Value>,
}

impl VariableSetBuilder {
    /// Record a variable. Recording the same name twice keeps the last
    /// value.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    /// Finish, sealing the set.
    #[must_use]
    pub fn build(self) -> VariableSet {
        VariableSet {
            entries: self.entries,
        }
    }
}

/// Shared store mapping migration ids to their captured variable sets.
///
/// Written exactly once per migration run, after prepare fully succeeds;
/// read-only afterwards. Safe for concurrent use.
#[derive(Debug, Default)]
pub struct VariableStore {
    inner: DashMap<MigrationId, Arc<VariableSet>>,
}

impl VariableStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the variable set for a migration.
    ///
    /// # Errors
    /// [`PipelineError::VariablesAlreadyRecorded`] if a set already exists
    /// for this id.
    pub fn record(&self, id: &MigrationId, vars: Arc<VariableSet>) -> Result<(), PipelineError> {
        if self.inner.contains_key(id) {
            return Err(PipelineError::VariablesAlreadyRecorded { id: id.clone() });
        }
        self.inner.insert(id.clone(), vars);
        Ok(())
    }

    /// Fetch the recorded set for a migration, if any.
    #[must_use]
    pub fn get(&self, id: &MigrationId) -> Option<Arc<VariableSet>> {
        self.inner.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop the recorded set for a completed migration.
    pub fn discard(&self, id: &MigrationId) {
        self.inner.remove(id);
    }

    /// Number of recorded sets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
