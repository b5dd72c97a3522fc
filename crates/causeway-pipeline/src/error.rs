//! Pipeline error taxonomy.
//!
//! The classification mirrors the propagation policy: transient transport
//! failures never reach this level (the port retry wrappers absorb them);
//! everything here either aborts the current migration or, for
//! [`PipelineError::EnactmentTimeout`], leaves it resumable.

use causeway_codec::EncodingError;
use causeway_ports::PortError;

use crate::migration::{MigrationId, Stage};

/// Error raised while driving a migration through its stages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// A prerequisite resource could not be created or found.
    #[error("provisioning failed: {source}")]
    Provision {
        /// Underlying port failure.
        source: PortError,
    },

    /// The operation set could not be encoded. Programmer error in the
    /// migration definition.
    #[error("payload encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    /// The relay refused or could not take the submission.
    #[error("submission failed: {source}")]
    Submission {
        /// Underlying port failure.
        source: PortError,
    },

    /// An oracle read failed during polling or verification.
    #[error("oracle read failed: {source}")]
    Oracle {
        /// Underlying port failure.
        source: PortError,
    },

    /// The remote domain did not apply the change within the poll budget.
    /// Not fatal: the proposal stands and polling may resume later.
    #[error("enactment not observed after {polls} polls over {waited_ms}ms")]
    EnactmentTimeout {
        /// Total time spent polling.
        waited_ms: u64,
        /// Number of polls performed.
        polls: u32,
    },

    /// A stage was driven out of order.
    #[error("illegal stage transition: {from:?} -> {to:?}")]
    StageOrder {
        /// Stage the run was in.
        from: Stage,
        /// Stage that was requested.
        to: Stage,
    },

    /// A variable required by enact or verify was not captured at prepare.
    #[error("missing variable: {name}")]
    MissingVariable {
        /// Variable name.
        name: String,
    },

    /// The variable store already holds a set for this migration.
    #[error("variables already recorded for {id}")]
    VariablesAlreadyRecorded {
        /// Migration whose variables were double-written.
        id: MigrationId,
    },

    /// A migration with this id is already registered.
    #[error("duplicate migration id: {id}")]
    DuplicateMigration {
        /// The duplicated id.
        id: MigrationId,
    },

    /// The run observed the cancellation signal.
    #[error("run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Wrap a port failure from the prepare stage.
    #[must_use]
    pub fn provision(source: PortError) -> Self {
        PipelineError::Provision { source }
    }

    /// Wrap a port failure from the enact stage.
    #[must_use]
    pub fn submission(source: PortError) -> Self {
        PipelineError::Submission { source }
    }

    /// Wrap a port failure from polling or verification reads.
    #[must_use]
    pub fn oracle(source: PortError) -> Self {
        PipelineError::Oracle { source }
    }

    /// Whether this error aborts the current migration for good, as opposed
    /// to leaving it in a state a later run can pick up.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PipelineError::EnactmentTimeout { .. } | PipelineError::Cancelled
        )
    }

    /// Whether re-running the whole migration later is safe and may succeed.
    ///
    /// Submission failures qualify because prepare is idempotent and no
    /// variable state is corrupted; encoding and ordering bugs do not.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Provision { .. }
                | PipelineError::Submission { .. }
                | PipelineError::Oracle { .. }
                | PipelineError::EnactmentTimeout { .. }
                | PipelineError::Cancelled
        )
    }

    /// Short stable kind tag for reports and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Provision { .. } => "provision",
            PipelineError::Encoding(_) => "encoding",
            PipelineError::Submission { .. } => "submission",
            PipelineError::Oracle { .. } => "oracle",
            PipelineError::EnactmentTimeout { .. } => "enactment-timeout",
            PipelineError::StageOrder { .. } => "stage-order",
            PipelineError::MissingVariable { .. } => "missing-variable",
            PipelineError::VariablesAlreadyRecorded { .. } => "variables-already-recorded",
            PipelineError::DuplicateMigration { .. } => "duplicate-migration",
            PipelineError::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_ports::PortError;

    #[test]
    fn test_timeout_and_cancel_are_non_fatal() {
        assert!(!PipelineError::EnactmentTimeout {
            waited_ms: 100,
            polls: 3
        }
        .is_fatal());
        assert!(!PipelineError::Cancelled.is_fatal());
        assert!(PipelineError::StageOrder {
            from: Stage::Pending,
            to: Stage::Applied
        }
        .is_fatal());
    }

    #[test]
    fn test_submission_failures_are_retryable() {
        let err = PipelineError::Submission {
            source: PortError::rejected("insufficient authorization"),
        };
        assert!(err.is_fatal());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_encoding_failures_are_not_retryable() {
        let err = PipelineError::Encoding(EncodingError::NoOperations);
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }
}
