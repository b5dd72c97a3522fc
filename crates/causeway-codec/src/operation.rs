//! Operations, routing metadata, and selector declarations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::EncodingError;
use crate::value::{Address, Value, ValueKind};

/// Identifier of an execution domain (e.g. a network or region).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DomainId(pub String);

impl DomainId {
    /// Create a domain id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DomainId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One remote call to be bundled into a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Resource the call is directed at.
    pub target: Address,
    /// Named entry point on the target. The selector determines the
    /// expected argument arity and kinds (see [`SelectorTable`]).
    pub selector: String,
    /// Ordered call arguments.
    pub args: Vec<Value>,
}

impl Operation {
    /// Create a new operation.
    pub fn new(target: Address, selector: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            target,
            selector: selector.into(),
            args,
        }
    }
}

/// Routing metadata attached to every payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMeta {
    /// Destination execution domain.
    pub destination: DomainId,
    /// Resource budget granted to the remote application of the change.
    pub gas_budget: u64,
}

impl RouteMeta {
    /// Create routing metadata.
    pub fn new(destination: impl Into<DomainId>, gas_budget: u64) -> Self {
        Self {
            destination: destination.into(),
            gas_budget,
        }
    }
}

impl From<String> for DomainId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Declares, per selector, the argument kinds the encoder accepts.
///
/// Selector declarations play the role an interface description would in the
/// remote domain: a selector uniquely determines its expected signature, so
/// a mismatch is rejected before any bytes are produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorTable {
    entries: BTreeMap<String, Vec<ValueKind>>,
}

impl SelectorTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a selector's signature. Redeclaring replaces the previous
    /// signature.
    pub fn declare(&mut self, selector: impl Into<String>, kinds: &[ValueKind]) -> &mut Self {
        self.entries.insert(selector.into(), kinds.to_vec());
        self
    }

    /// Look up a selector's declared argument kinds.
    #[must_use]
    pub fn signature(&self, selector: &str) -> Option<&[ValueKind]> {
        self.entries.get(selector).map(Vec::as_slice)
    }

    /// Validate one operation against this table.
    ///
    /// # Errors
    /// - [`EncodingError::UnknownSelector`] if the selector is undeclared
    /// - [`EncodingError::ArityMismatch`] on argument count mismatch
    /// - [`EncodingError::KindMismatch`] on argument kind mismatch
    pub fn check(&self, op: &Operation) -> Result<(), EncodingError> {
        let expected = self
            .signature(&op.selector)
            .ok_or_else(|| EncodingError::UnknownSelector {
                selector: op.selector.clone(),
            })?;

        if expected.len() != op.args.len() {
            return Err(EncodingError::ArityMismatch {
                selector: op.selector.clone(),
                expected: expected.len(),
                actual: op.args.len(),
            });
        }

        for (index, (kind, arg)) in expected.iter().zip(&op.args).enumerate() {
            if arg.kind() != *kind {
                return Err(EncodingError::KindMismatch {
                    selector: op.selector.clone(),
                    index,
                    expected: *kind,
                    actual: arg.kind(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SelectorTable {
        let mut table = SelectorTable::new();
        table.declare(
            "updateAssetPriceFeed",
            &[ValueKind::Address, ValueKind::Address, ValueKind::Address],
        );
        table
    }

    #[test]
    fn test_check_accepts_matching_signature() {
        let op = Operation::new(
            Address([1; 20]),
            "updateAssetPriceFeed",
            vec![
                Value::Address(Address([2; 20])),
                Value::Address(Address([3; 20])),
                Value::Address(Address([4; 20])),
            ],
        );
        assert!(table().check(&op).is_ok());
    }

    #[test]
    fn test_check_rejects_unknown_selector() {
        let op = Operation::new(Address([1; 20]), "pause", vec![]);
        assert!(matches!(
            table().check(&op),
            Err(EncodingError::UnknownSelector { .. })
        ));
    }

    #[test]
    fn test_check_rejects_arity_mismatch() {
        let op = Operation::new(
            Address([1; 20]),
            "updateAssetPriceFeed",
            vec![Value::Address(Address([2; 20]))],
        );
        assert!(matches!(
            table().check(&op),
            Err(EncodingError::ArityMismatch {
                expected: 3,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_check_rejects_kind_mismatch() {
        let op = Operation::new(
            Address([1; 20]),
            "updateAssetPriceFeed",
            vec![
                Value::Address(Address([2; 20])),
                Value::Uint(9),
                Value::Address(Address([4; 20])),
            ],
        );
        assert!(matches!(
            table().check(&op),
            Err(EncodingError::KindMismatch { index: 1, .. })
        ));
    }
}
