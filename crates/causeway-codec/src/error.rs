//! Codec error types.

use crate::value::ValueKind;

/// Failure to parse a textual value representation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueParseError {
    /// Input was not a 20-byte hex address.
    #[error("invalid address: {input}")]
    InvalidAddress {
        /// The offending input.
        input: String,
    },
}

/// Rejection raised while encoding an operation set into a payload.
///
/// All of these are programmer errors in the migration definition: the
/// operation list itself is malformed, so retrying cannot help.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// Selector is not declared in the selector table.
    #[error("unknown selector: {selector}")]
    UnknownSelector {
        /// Selector that was not found.
        selector: String,
    },

    /// Argument count does not match the selector declaration.
    #[error("arity mismatch for {selector}: expected {expected}, got {actual}")]
    ArityMismatch {
        /// Selector being encoded.
        selector: String,
        /// Declared argument count.
        expected: usize,
        /// Provided argument count.
        actual: usize,
    },

    /// Argument kind does not match the selector declaration.
    #[error("kind mismatch for {selector} arg {index}: expected {expected}, got {actual}")]
    KindMismatch {
        /// Selector being encoded.
        selector: String,
        /// Zero-based argument position.
        index: usize,
        /// Declared kind.
        expected: ValueKind,
        /// Provided kind.
        actual: ValueKind,
    },

    /// A payload must carry at least one operation.
    #[error("operation set is empty")]
    NoOperations,

    /// A length-prefixed field exceeds its wire-format bound.
    #[error("field too large: {field} is {actual} bytes, limit {limit}")]
    FieldTooLarge {
        /// Which field overflowed.
        field: &'static str,
        /// Actual byte length.
        actual: usize,
        /// Maximum representable length.
        limit: usize,
    },
}

/// Failure while decoding a payload back into operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Payload does not start with the expected magic.
    #[error("bad payload magic")]
    BadMagic,

    /// Unknown wire-format version byte.
    #[error("unsupported payload version: {0}")]
    UnsupportedVersion(u8),

    /// Payload ended before a field was complete.
    #[error("payload truncated while reading {context}")]
    Truncated {
        /// What was being read.
        context: &'static str,
    },

    /// Unknown value type tag.
    #[error("unknown value tag: {0:#04x}")]
    UnknownTag(u8),

    /// A string field held invalid UTF-8.
    #[error("invalid utf-8 in {context}")]
    InvalidUtf8 {
        /// What was being read.
        context: &'static str,
    },

    /// The digest trailer does not match the payload body.
    #[error("payload digest mismatch")]
    DigestMismatch,

    /// Bytes remained after the digest trailer.
    #[error("trailing bytes after payload")]
    TrailingBytes,
}
