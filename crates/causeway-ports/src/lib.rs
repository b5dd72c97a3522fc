//! Capability ports (causeway-ports)
//!
//! The three narrow interfaces the pipeline calls through, instead of
//! owning any backend itself:
//! - [`Provisioner`] - creates or looks up resources, idempotent upsert
//! - [`Relay`] - submits an opaque payload into a remote execution domain
//! - [`Oracle`] - reads current remote state for polling and verification
//!
//! Implementations are externally owned and injected; the pipeline never
//! takes over their lifetime. The [`retry`] module provides the
//! bounded-retry wrappers the runner installs around every port so that
//! transient transport failures are absorbed locally while domain-semantic
//! rejections surface immediately.

pub mod error;
pub mod oracle;
pub mod provisioner;
pub mod relay;
pub mod retry;

pub use error::PortError;
pub use oracle::Oracle;
pub use provisioner::{Provisioner, ResourceProps, ResourceSpec};
pub use relay::{ProposalHandle, Relay};
pub use retry::{RetryOracle, RetryPolicy, RetryProvisioner, RetryRelay};
