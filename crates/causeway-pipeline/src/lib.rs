//! Causeway pipeline (causeway-pipeline)
//!
//! The staged change-orchestration engine:
//! 1. **prepare** - provision prerequisite resources, capture a variable set
//! 2. **enact** - encode the change into a payload and submit it via the relay
//! 3. **await** - poll until the remote domain applies the change
//! 4. **verify** - compare observed state against the values frozen at prepare
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use causeway_pipeline::prelude::*;
//!
//! let runner = Runner::new(provisioner, relay, oracle, RunnerConfig::default());
//! let mut registry = MigrationRegistry::new();
//! registry.register(Arc::new(my_migration))?;
//!
//! let report = runner.run_all(&registry).await;
//! println!("{}", report.generate_text());
//! ```

pub mod config;
pub mod error;
pub mod journal;
pub mod migration;
pub mod registry;
pub mod report;
pub mod runner;
pub mod vars;

pub use config::{PollPolicy, RunnerConfig};
pub use error::PipelineError;
pub use migration::{
    allowed_transitions, validate_transition, Migration, MigrationId, MigrationRun, Ports, Stage,
};
pub use registry::MigrationRegistry;
pub use report::{MigrationReport, ReportedError, RunReport, VerificationCheck, VerificationResult};
pub use runner::{CancelFlag, Runner};
pub use vars::{VariableSet, VariableSetBuilder, VariableStore};

/// Commonly used pipeline types.
pub mod prelude {
    pub use crate::config::{PollPolicy, RunnerConfig};
    pub use crate::error::PipelineError;
    pub use crate::journal::{StageJournal, StageOutcome};
    pub use crate::migration::{Migration, MigrationId, MigrationRun, Ports, Stage};
    pub use crate::registry::MigrationRegistry;
    pub use crate::report::{MigrationReport, RunReport, VerificationResult};
    pub use crate::runner::{CancelFlag, Runner};
    pub use crate::vars::{VariableSet, VariableStore};
    pub use causeway_codec::{Address, DomainId, Operation, RouteMeta, SelectorTable, Value};
    pub use causeway_ports::{Oracle, ProposalHandle, Provisioner, Relay, ResourceSpec};
}
