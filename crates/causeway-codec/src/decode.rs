//! Payload decoding: the inverse of [`crate::encode`].
//!
//! Exists for tests and for in-memory relay implementations that apply
//! payloads directly; production relays treat payloads as opaque bytes.

use sha2::{Digest, Sha256};

use crate::encode::{DIGEST_LEN, MAGIC, VERSION};
use crate::error::DecodeError;
use crate::operation::{DomainId, Operation, RouteMeta};
use crate::value::{Address, Value, ValueKind};

/// The structured content recovered from a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    /// Routing metadata.
    pub route: RouteMeta,
    /// The ordered operation sequence.
    pub ops: Vec<Operation>,
}

/// Decode payload bytes, verifying the digest trailer.
///
/// # Errors
/// Any [`DecodeError`]: bad magic, unsupported version, truncation, unknown
/// value tag, invalid UTF-8, digest mismatch, or trailing bytes.
pub fn decode(bytes: &[u8]) -> Result<DecodedPayload, DecodeError> {
    if bytes.len() < MAGIC.len() + 1 + DIGEST_LEN {
        return Err(DecodeError::Truncated { context: "header" });
    }

    let (body, trailer) = bytes.split_at(bytes.len() - DIGEST_LEN);
    let digest = Sha256::digest(body);
    if digest.as_slice() != trailer {
        return Err(DecodeError::DigestMismatch);
    }

    let mut reader = Reader { buf: body, pos: 0 };

    if reader.take(MAGIC.len(), "magic")? != MAGIC.as_slice() {
        return Err(DecodeError::BadMagic);
    }
    let version = reader.take_u8("version")?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let destination = reader.take_str_u16("destination")?;
    let gas_budget = reader.take_u64("gas budget")?;
    let op_count = reader.take_u32("operation count")?;

    let mut ops = Vec::with_capacity(op_count as usize);
    for _ in 0..op_count {
        ops.push(read_operation(&mut reader)?);
    }

    if reader.pos != body.len() {
        return Err(DecodeError::TrailingBytes);
    }

    Ok(DecodedPayload {
        route: RouteMeta {
            destination: DomainId::new(destination),
            gas_budget,
        },
        ops,
    })
}

fn read_operation(reader: &mut Reader<'_>) -> Result<Operation, DecodeError> {
    let target_bytes = reader.take(20, "target")?;
    let mut target = [0u8; 20];
    target.copy_from_slice(target_bytes);

    let selector = reader.take_str_u16("selector")?;
    let arg_count = reader.take_u16("argument count")?;

    let mut args = Vec::with_capacity(arg_count as usize);
    for _ in 0..arg_count {
        args.push(read_value(reader)?);
    }

    Ok(Operation {
        target: Address(target),
        selector,
        args,
    })
}

fn read_value(reader: &mut Reader<'_>) -> Result<Value, DecodeError> {
    let tag = reader.take_u8("value tag")?;
    let kind = ValueKind::from_tag(tag).ok_or(DecodeError::UnknownTag(tag))?;

    match kind {
        ValueKind::Address => {
            let bytes = reader.take(20, "address value")?;
            let mut addr = [0u8; 20];
            addr.copy_from_slice(bytes);
            Ok(Value::Address(Address(addr)))
        }
        ValueKind::Uint => {
            let bytes = reader.take(16, "uint value")?;
            let mut buf = [0u8; 16];
            buf.copy_from_slice(bytes);
            Ok(Value::Uint(u128::from_be_bytes(buf)))
        }
        ValueKind::Bool => Ok(Value::Bool(reader.take_u8("bool value")? != 0)),
        ValueKind::Str => {
            let len = reader.take_u32("string length")? as usize;
            let bytes = reader.take(len, "string value")?;
            let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 {
                context: "string value",
            })?;
            Ok(Value::Str(s.to_string()))
        }
        ValueKind::Bytes => {
            let len = reader.take_u32("bytes length")? as usize;
            Ok(Value::Bytes(reader.take(len, "bytes value")?.to_vec()))
        }
    }
}

/// Cursor over the payload body.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(DecodeError::Truncated { context })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(1, context)?[0])
    }

    fn take_u16(&mut self, context: &'static str) -> Result<u16, DecodeError> {
        let bytes = self.take(2, context)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn take_u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        let bytes = self.take(4, context)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take_u64(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        let bytes = self.take(8, context)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }

    fn take_str_u16(&mut self, context: &'static str) -> Result<String, DecodeError> {
        let len = self.take_u16(context)? as usize;
        let bytes = self.take(len, context)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8 { context })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;
    use crate::operation::SelectorTable;
    use pretty_assertions::assert_eq;

    fn table() -> SelectorTable {
        let mut table = SelectorTable::new();
        table.declare(
            "updateAssetPriceFeed",
            &[ValueKind::Address, ValueKind::Address, ValueKind::Address],
        );
        table.declare("setLimit", &[ValueKind::Uint, ValueKind::Bool]);
        table
    }

    #[test]
    fn test_round_trip_recovers_operations() {
        let comet = Address([0xc0; 20]);
        let ops = vec![
            Operation::new(
                comet,
                "updateAssetPriceFeed",
                vec![
                    Value::Address(Address([0xa1; 20])),
                    Value::Address(Address([0xa2; 20])),
                    Value::Address(Address([0xa3; 20])),
                ],
            ),
            Operation::new(comet, "setLimit", vec![Value::Uint(10), Value::Bool(true)]),
        ];
        let route = RouteMeta::new("base", 1_000_000);

        let payload = encode(&ops, &route, &table()).unwrap();
        let decoded = decode(payload.as_bytes()).unwrap();

        assert_eq!(decoded.route, route);
        assert_eq!(decoded.ops, ops);
    }

    #[test]
    fn test_flipped_byte_fails_digest_check() {
        let ops = vec![Operation::new(
            Address([1; 20]),
            "setLimit",
            vec![Value::Uint(1), Value::Bool(false)],
        )];
        let payload = encode(&ops, &RouteMeta::new("base", 1), &table()).unwrap();

        let mut bytes = payload.into_bytes();
        bytes[10] ^= 0xff;
        assert_eq!(decode(&bytes), Err(DecodeError::DigestMismatch));
    }

    #[test]
    fn test_short_input_is_truncated() {
        assert!(matches!(
            decode(b"CWY1"),
            Err(DecodeError::Truncated { .. })
        ));
    }
}
