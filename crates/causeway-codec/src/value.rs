//! Typed argument and observation values.
//!
//! `Value` is the common currency between the pipeline stages: operation
//! arguments are values, variable sets map names to values, and oracle reads
//! return values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValueParseError;

/// A 20-byte address-like resource handle, rendered as `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Raw bytes of the address.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The all-zero address, conventionally "not a real target".
    #[must_use]
    pub fn zero() -> Self {
        Self([0u8; 20])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = ValueParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| ValueParseError::InvalidAddress {
            input: s.to_string(),
        })?;
        let array: [u8; 20] =
            bytes
                .try_into()
                .map_err(|_| ValueParseError::InvalidAddress {
                    input: s.to_string(),
                })?;
        Ok(Self(array))
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Kind discriminant for [`Value`], used by selector declarations and by the
/// wire format's type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    /// 20-byte address.
    Address,
    /// Unsigned integer (u128 on the wire).
    Uint,
    /// Boolean flag.
    Bool,
    /// UTF-8 string.
    Str,
    /// Raw byte blob.
    Bytes,
}

impl ValueKind {
    /// Stable one-byte wire tag for this kind.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            ValueKind::Address => 0x01,
            ValueKind::Uint => 0x02,
            ValueKind::Bool => 0x03,
            ValueKind::Str => 0x04,
            ValueKind::Bytes => 0x05,
        }
    }

    /// Inverse of [`ValueKind::tag`].
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(ValueKind::Address),
            0x02 => Some(ValueKind::Uint),
            0x03 => Some(ValueKind::Bool),
            0x04 => Some(ValueKind::Str),
            0x05 => Some(ValueKind::Bytes),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Address => "address",
            ValueKind::Uint => "uint",
            ValueKind::Bool => "bool",
            ValueKind::Str => "string",
            ValueKind::Bytes => "bytes",
        };
        f.write_str(name)
    }
}

/// A typed value flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Address-like handle.
    Address(Address),
    /// Unsigned integer.
    Uint(u128),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl Value {
    /// The kind of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Address(_) => ValueKind::Address,
            Value::Uint(_) => ValueKind::Uint,
            Value::Bool(_) => ValueKind::Bool,
            Value::Str(_) => ValueKind::Str,
            Value::Bytes(_) => ValueKind::Bytes,
        }
    }

    /// Borrow as an address, if this is one.
    #[must_use]
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Value::Address(a) => Some(*a),
            _ => None,
        }
    }

    /// Borrow as an unsigned integer, if this is one.
    #[must_use]
    pub fn as_uint(&self) -> Option<u128> {
        match self {
            Value::Uint(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Address(a) => write!(f, "{a}"),
            Value::Uint(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

impl From<Address> for Value {
    fn from(value: Address) -> Self {
        Value::Address(value)
    }
}

impl From<u128> for Value {
    fn from(value: u128) -> Self {
        Value::Uint(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_address_round_trips_through_display() {
        let addr = Address([0xab; 20]);
        let rendered = addr.to_string();
        assert_eq!(rendered, format!("0x{}", "ab".repeat(20)));
        assert_eq!(rendered.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!("0xabcd".parse::<Address>().is_err());
        assert!("not hex".parse::<Address>().is_err());
    }

    #[test]
    fn test_kind_tags_are_stable() {
        for kind in [
            ValueKind::Address,
            ValueKind::Uint,
            ValueKind::Bool,
            ValueKind::Str,
            ValueKind::Bytes,
        ] {
            assert_eq!(ValueKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ValueKind::from_tag(0x7f), None);
    }

    #[test]
    fn test_value_reports_its_kind() {
        assert_eq!(Value::Uint(7).kind(), ValueKind::Uint);
        assert_eq!(Value::from("feed").kind(), ValueKind::Str);
        assert_eq!(Value::Bytes(vec![1, 2]).kind(), ValueKind::Bytes);
    }
}
