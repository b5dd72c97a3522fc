//! Relay port: submits payloads into a remote execution domain.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use causeway_codec::{DomainId, Payload};

use crate::error::PortError;

/// Durable identifier for a submitted change request.
///
/// Issued by the relay on successful submission; stable for the lifetime of
/// the remote change request, so it can be reported to operators and used
/// to poll for enactment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalHandle {
    /// Relay-assigned proposal id.
    pub id: String,
    /// Domain the proposal was routed to.
    pub destination: DomainId,
}

impl ProposalHandle {
    /// Create a proposal handle.
    pub fn new(id: impl Into<String>, destination: impl Into<DomainId>) -> Self {
        Self {
            id: id.into(),
            destination: destination.into(),
        }
    }
}

impl fmt::Display for ProposalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.destination)
    }
}

/// Submits an opaque payload into a remote execution domain.
///
/// The payload format is pass-through: the relay never inspects it.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Submit a payload for application in `destination`.
    ///
    /// # Errors
    /// - [`PortError::Rejected`] if the relay refuses the submission
    /// - [`PortError::Transport`] on transient transport failure
    async fn submit(
        &self,
        payload: &Payload,
        destination: &DomainId,
        gas_budget: u64,
    ) -> Result<ProposalHandle, PortError>;
}
