//! Deterministic payload encoding.
//!
//! Wire layout (all integers big-endian):
//!
//! ```text
//! magic      "CWY1"                      4 bytes
//! version    u8                          1 byte
//! dest       u16 len + utf8 bytes
//! gas        u64
//! op count   u32
//! per op:
//!   target   20 bytes
//!   selector u16 len + utf8 bytes
//!   args     u16 count, then per arg: kind tag u8 + body
//! digest     sha256 of everything above  32 bytes
//! ```
//!
//! Value bodies: address = 20 bytes, uint = 16-byte u128, bool = 1 byte,
//! string/bytes = u32 len + raw bytes.

use sha2::{Digest, Sha256};

use crate::error::EncodingError;
use crate::operation::{Operation, RouteMeta, SelectorTable};
use crate::value::Value;

/// Payload magic bytes.
pub(crate) const MAGIC: [u8; 4] = *b"CWY1";

/// Current wire-format version.
pub(crate) const VERSION: u8 = 1;

/// Length of the SHA-256 digest trailer.
pub(crate) const DIGEST_LEN: usize = 32;

/// An encoded, self-checking proposal payload.
///
/// Opaque to the relay; only the codec reads its structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    bytes: Vec<u8>,
}

impl Payload {
    /// The raw payload bytes (body + digest trailer).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty. Encoded payloads never are; this exists
    /// for the conventional `len`/`is_empty` pair.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The digest trailer rendered as hex, for correlation in logs and
    /// duplicate-submission detection.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        let start = self.bytes.len().saturating_sub(DIGEST_LEN);
        hex::encode(&self.bytes[start..])
    }

    /// Consume into the raw byte vector.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encode an ordered operation sequence plus routing metadata.
///
/// Pure and deterministic: identical inputs yield byte-identical payloads.
///
/// # Errors
/// Any [`EncodingError`]: empty operation set, undeclared selector, arity or
/// kind mismatch, or a field exceeding its length prefix.
pub fn encode(
    ops: &[Operation],
    route: &RouteMeta,
    table: &SelectorTable,
) -> Result<Payload, EncodingError> {
    if ops.is_empty() {
        return Err(EncodingError::NoOperations);
    }
    for op in ops {
        table.check(op)?;
    }

    let mut out = Vec::with_capacity(128);
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);

    push_prefixed_u16(&mut out, "destination", route.destination.as_str().as_bytes())?;
    out.extend_from_slice(&route.gas_budget.to_be_bytes());

    let count = u32::try_from(ops.len()).map_err(|_| EncodingError::FieldTooLarge {
        field: "operations",
        actual: ops.len(),
        limit: u32::MAX as usize,
    })?;
    out.extend_from_slice(&count.to_be_bytes());

    for op in ops {
        out.extend_from_slice(op.target.as_bytes());
        push_prefixed_u16(&mut out, "selector", op.selector.as_bytes())?;

        let args = u16::try_from(op.args.len()).map_err(|_| EncodingError::FieldTooLarge {
            field: "arguments",
            actual: op.args.len(),
            limit: u16::MAX as usize,
        })?;
        out.extend_from_slice(&args.to_be_bytes());

        for arg in &op.args {
            push_value(&mut out, arg)?;
        }
    }

    let digest = Sha256::digest(&out);
    out.extend_from_slice(&digest);

    Ok(Payload { bytes: out })
}

fn push_prefixed_u16(
    out: &mut Vec<u8>,
    field: &'static str,
    bytes: &[u8],
) -> Result<(), EncodingError> {
    let len = u16::try_from(bytes.len()).map_err(|_| EncodingError::FieldTooLarge {
        field,
        actual: bytes.len(),
        limit: u16::MAX as usize,
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn push_prefixed_u32(
    out: &mut Vec<u8>,
    field: &'static str,
    bytes: &[u8],
) -> Result<(), EncodingError> {
    let len = u32::try_from(bytes.len()).map_err(|_| EncodingError::FieldTooLarge {
        field,
        actual: bytes.len(),
        limit: u32::MAX as usize,
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn push_value(out: &mut Vec<u8>, value: &Value) -> Result<(), EncodingError> {
    out.push(value.kind().tag());
    match value {
        Value::Address(a) => out.extend_from_slice(a.as_bytes()),
        Value::Uint(n) => out.extend_from_slice(&n.to_be_bytes()),
        Value::Bool(b) => out.push(u8::from(*b)),
        Value::Str(s) => push_prefixed_u32(out, "string value", s.as_bytes())?,
        Value::Bytes(b) => push_prefixed_u32(out, "bytes value", b)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Address, ValueKind};
    use pretty_assertions::assert_eq;

    fn table() -> SelectorTable {
        let mut table = SelectorTable::new();
        table.declare("setFeed", &[ValueKind::Address, ValueKind::Uint]);
        table
    }

    fn sample_ops() -> Vec<Operation> {
        vec![Operation::new(
            Address([0x11; 20]),
            "setFeed",
            vec![Value::Address(Address([0x22; 20])), Value::Uint(42)],
        )]
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let route = RouteMeta::new("base", 500_000);
        let a = encode(&sample_ops(), &route, &table()).unwrap();
        let b = encode(&sample_ops(), &route, &table()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.digest_hex(), b.digest_hex());
    }

    #[test]
    fn test_route_changes_change_the_bytes() {
        let ops = sample_ops();
        let a = encode(&ops, &RouteMeta::new("base", 500_000), &table()).unwrap();
        let b = encode(&ops, &RouteMeta::new("base", 500_001), &table()).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_empty_operation_set_is_rejected() {
        let route = RouteMeta::new("base", 1);
        assert_eq!(
            encode(&[], &route, &table()),
            Err(EncodingError::NoOperations)
        );
    }

    #[test]
    fn test_payload_starts_with_magic_and_version() {
        let route = RouteMeta::new("base", 1);
        let payload = encode(&sample_ops(), &route, &table()).unwrap();
        assert_eq!(&payload.as_bytes()[..4], b"CWY1");
        assert_eq!(payload.as_bytes()[4], VERSION);
    }

    #[test]
    fn test_validation_happens_before_any_bytes() {
        let route = RouteMeta::new("base", 1);
        let bad = vec![Operation::new(Address([1; 20]), "unknown", vec![])];
        assert!(matches!(
            encode(&bad, &route, &table()),
            Err(EncodingError::UnknownSelector { .. })
        ));
    }
}
