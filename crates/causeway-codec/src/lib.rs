//! Causeway payload codec (causeway-codec)
//!
//! Builds the opaque, self-describing byte payload that carries a set of
//! remote operations (target, selector, arguments) plus routing metadata
//! into another execution domain.
//!
//! Two hard invariants hold for every payload:
//! - **Deterministic**: the same operation sequence and routing metadata
//!   always produce byte-identical payloads.
//! - **Self-checking**: every payload ends in a SHA-256 digest of its own
//!   body, so corruption is detectable without decoding.
//!
//! Encoding is a pure function with no I/O; all validation (unknown
//! selector, arity mismatch, argument kind mismatch) happens before any
//! bytes are emitted. The inverse lives in [`decode`] and is primarily for
//! tests and in-memory relay implementations that need to inspect what they
//! were asked to apply.

pub mod decode;
pub mod encode;
pub mod error;
pub mod operation;
pub mod value;

pub use decode::{decode, DecodedPayload};
pub use encode::{encode, Payload};
pub use error::{DecodeError, EncodingError};
pub use operation::{DomainId, Operation, RouteMeta, SelectorTable};
pub use value::{Address, Value, ValueKind};
