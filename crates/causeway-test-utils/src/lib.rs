//! Testing utilities for the Causeway workspace
//!
//! In-memory capability port implementations and fixture migrations, so
//! pipeline behavior can be exercised without live backends.

#![allow(missing_docs)]

pub mod migrations;
pub mod ports;

pub use migrations::{PriceFeedMigration, ScriptedMigration};
pub use ports::{MemoryProvisioner, MemoryRelay, RecordedSubmission, RejectingRelay, TableOracle};

/// Install a compact tracing subscriber for tests. Safe to call from every
/// test; only the first call wins.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
