//! Oracle port: read-only view of remote state.

use async_trait::async_trait;

use causeway_codec::{Address, Value};

use crate::error::PortError;

/// Reads the current state of the target system.
///
/// Strictly read-only; the pipeline uses it for enactment polling and for
/// post-application verification. Reads must be safe to repeat arbitrarily
/// often.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Read `field` on `target`.
    ///
    /// # Errors
    /// - [`PortError::NotFound`] if the target or field does not exist
    /// - [`PortError::Transport`] on transient backend failure
    async fn read(&self, target: Address, field: &str) -> Result<Value, PortError>;
}
