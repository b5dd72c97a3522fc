//! Provisioner port: idempotent resource creation and lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use causeway_codec::{Address, DomainId, Value};

use crate::error::PortError;

/// Specification of a resource the pipeline needs to exist before a change
/// can be proposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Resource kind, e.g. `"price-feed"` or `"timelock"`.
    pub kind: String,
    /// Constructor arguments, ordered.
    pub args: Vec<Value>,
    /// Domain the resource must exist in.
    pub domain: DomainId,
}

impl ResourceSpec {
    /// Create a resource spec.
    pub fn new(kind: impl Into<String>, args: Vec<Value>, domain: impl Into<DomainId>) -> Self {
        Self {
            kind: kind.into(),
            args,
            domain: domain.into(),
        }
    }
}

/// Properties describing an existing resource, as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceProps {
    /// Resource kind.
    pub kind: String,
    /// Named properties.
    pub fields: BTreeMap<String, Value>,
}

/// Creates or looks up resources in the local domain.
///
/// `ensure` has upsert semantics: asking for a resource that already exists
/// returns the existing handle without creating a duplicate. That property
/// is what makes the prepare stage safe to rerun.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Ensure the specified resource exists, returning its stable handle.
    ///
    /// # Errors
    /// - [`PortError::InvalidSpec`] if the spec is invalid for the domain
    /// - [`PortError::Transport`] on transient backend failure
    async fn ensure(&self, spec: &ResourceSpec) -> Result<Address, PortError>;

    /// Describe an existing resource.
    ///
    /// # Errors
    /// [`PortError::NotFound`] if no resource exists at the handle.
    async fn describe(&self, handle: Address) -> Result<ResourceProps, PortError>;
}
