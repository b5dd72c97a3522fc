//! Port error taxonomy.

use causeway_codec::{Address, DomainId};

/// Error raised by a capability port.
///
/// The one classification that matters to callers is transient vs.
/// domain-semantic: transient transport failures are eligible for bounded
/// retry, everything else propagates immediately.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// Transport-level failure (connection reset, timeout, gateway error).
    /// Retryable.
    #[error("transport failure: {message}")]
    Transport {
        /// Backend-provided detail.
        message: String,
    },

    /// The resource specification is invalid for the target domain.
    #[error("invalid resource spec for {domain}: {reason}")]
    InvalidSpec {
        /// Domain the spec was aimed at.
        domain: DomainId,
        /// Why the backend refused it.
        reason: String,
    },

    /// The relay rejected the submission (malformed payload, insufficient
    /// authorization, duplicate proposal).
    #[error("relay rejected submission: {reason}")]
    Rejected {
        /// Relay-provided reason.
        reason: String,
    },

    /// The oracle has no such target or field.
    #[error("not found: {target} field {field}")]
    NotFound {
        /// Target that was queried.
        target: Address,
        /// Field selector that was queried.
        field: String,
    },

    /// Any other backend failure that is not worth retrying.
    #[error("backend failure: {message}")]
    Backend {
        /// Backend-provided detail.
        message: String,
    },
}

impl PortError {
    /// Whether a bounded retry may help.
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Transport { .. })
    }

    /// Convenience constructor for transport failures.
    pub fn transport(message: impl Into<String>) -> Self {
        PortError::Transport {
            message: message.into(),
        }
    }

    /// Convenience constructor for relay rejections.
    pub fn rejected(reason: impl Into<String>) -> Self {
        PortError::Rejected {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_are_transient() {
        assert!(PortError::transport("connection reset").is_transient());
        assert!(!PortError::rejected("duplicate proposal").is_transient());
        assert!(!PortError::NotFound {
            target: Address::zero(),
            field: "priceFeed".into(),
        }
        .is_transient());
        assert!(!PortError::Backend {
            message: "boom".into()
        }
        .is_transient());
    }
}
