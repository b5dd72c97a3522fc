//! Migration identity, the four-stage lifecycle machine, and the
//! [`Migration`] trait migrations implement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use causeway_ports::{Oracle, ProposalHandle, Provisioner, Relay};

use crate::error::PipelineError;
use crate::report::VerificationResult;
use crate::vars::VariableSet;

/// Opaque, globally unique migration identifier.
///
/// By convention ids are `<unix-timestamp>_<snake_case_name>`, e.g.
/// `1724411762_change_feeds_to_api3`; the numeric prefix orders migrations
/// in a registry. Ids without the prefix are accepted and sort last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MigrationId(String);

impl MigrationId {
    /// Create an id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The numeric timestamp prefix, if the id carries one.
    #[must_use]
    pub fn timestamp(&self) -> Option<u64> {
        self.0.split('_').next().and_then(|head| head.parse().ok())
    }

    /// Registry ordering key: timestamp prefix first, then the full id.
    #[must_use]
    pub fn order_key(&self) -> (u64, &str) {
        (self.timestamp().unwrap_or(u64::MAX), self.as_str())
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MigrationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MigrationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle stage of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Nothing has run yet.
    Pending,
    /// prepare succeeded; variables are recorded.
    Prepared,
    /// enact succeeded; a proposal is in flight.
    Submitted,
    /// The remote domain reported the change applied.
    Applied,
    /// verify succeeded with all checks passing.
    Verified,
    /// A stage failed or verification did not pass.
    Failed,
}

impl Stage {
    /// Short lowercase name for logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Prepared => "prepared",
            Stage::Submitted => "submitted",
            Stage::Applied => "applied",
            Stage::Verified => "verified",
            Stage::Failed => "failed",
        }
    }
}

/// Stages a run may move to from `from`. Strictly forward; terminal stages
/// allow nothing.
#[must_use]
pub fn allowed_transitions(from: Stage) -> Vec<Stage> {
    use Stage::{Applied, Failed, Pending, Prepared, Submitted, Verified};
    match from {
        Pending => vec![Prepared, Failed],
        Prepared => vec![Submitted, Failed],
        Submitted => vec![Applied, Failed],
        Applied => vec![Verified, Failed],
        Verified | Failed => vec![],
    }
}

/// Validate a stage transition.
///
/// # Errors
/// [`PipelineError::StageOrder`] if the transition skips ahead, moves
/// backward, or leaves a terminal stage.
pub fn validate_transition(from: Stage, to: Stage) -> Result<(), PipelineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(PipelineError::StageOrder { from, to })
    }
}

/// The injected capability ports a migration calls through.
///
/// Shared, externally owned; the runner hands migrations a retry-wrapped
/// instance so individual migrations never deal with transient transport
/// failures themselves.
#[derive(Clone)]
pub struct Ports {
    /// Resource provisioning in the local domain.
    pub provisioner: Arc<dyn Provisioner>,
    /// Payload submission into the remote domain.
    pub relay: Arc<dyn Relay>,
    /// Read-only view of remote state.
    pub oracle: Arc<dyn Oracle>,
}

impl Ports {
    /// Bundle the three ports.
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        relay: Arc<dyn Relay>,
        oracle: Arc<dyn Oracle>,
    ) -> Self {
        Self {
            provisioner,
            relay,
            oracle,
        }
    }
}

impl fmt::Debug for Ports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ports").finish_non_exhaustive()
    }
}

/// One unit of change, written by migration authors.
///
/// Implementations hold their own parameters (addresses, caps, selectors)
/// and express the four stages against the injected ports. The runner, not
/// the migration, owns ordering, retry, polling, and reporting.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Unique identifier, used as the variable-store key and as the
    /// correlation token in logs and reports.
    fn id(&self) -> &MigrationId;

    /// Provision prerequisites and capture the values later stages and
    /// verification depend on. Must be idempotent: reruns against an
    /// already-provisioned backend return the same values.
    async fn prepare(&self, ports: &Ports) -> Result<VariableSet, PipelineError>;

    /// Build the operation list, encode it, and submit it through the
    /// relay. Receives the variable set read-only and must not assume it
    /// can be amended.
    async fn enact(
        &self,
        ports: &Ports,
        vars: &VariableSet,
    ) -> Result<ProposalHandle, PipelineError>;

    /// Non-blocking poll: has the remote domain applied the change yet?
    /// Pure read; called arbitrarily many times.
    async fn enacted(&self, ports: &Ports) -> Result<bool, PipelineError>;

    /// Compare observed remote state against the values captured at
    /// prepare time. Enumerates every failing pair, not just the first.
    async fn verify(
        &self,
        ports: &Ports,
        vars: &VariableSet,
    ) -> Result<VerificationResult, PipelineError>;
}

/// Stage cursor for one run of one migration.
///
/// Owns the variable set and proposal handle for the duration of the run
/// and refuses out-of-order stage calls.
pub struct MigrationRun {
    migration: Arc<dyn Migration>,
    stage: Stage,
    vars: Option<Arc<VariableSet>>,
    proposal: Option<ProposalHandle>,
}

impl MigrationRun {
    /// Fresh run at [`Stage::Pending`].
    #[must_use]
    pub fn new(migration: Arc<dyn Migration>) -> Self {
        Self {
            migration,
            stage: Stage::Pending,
            vars: None,
            proposal: None,
        }
    }

    /// Resume a run whose proposal was already submitted, e.g. after an
    /// earlier `EnactmentTimeout`. Starts at [`Stage::Submitted`].
    #[must_use]
    pub fn resumed(
        migration: Arc<dyn Migration>,
        vars: Arc<VariableSet>,
        proposal: ProposalHandle,
    ) -> Self {
        Self {
            migration,
            stage: Stage::Submitted,
            vars: Some(vars),
            proposal: Some(proposal),
        }
    }

    /// The migration's id.
    #[must_use]
    pub fn id(&self) -> &MigrationId {
        self.migration.id()
    }

    /// Current stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The proposal handle, once enact has succeeded.
    #[must_use]
    pub fn proposal(&self) -> Option<&ProposalHandle> {
        self.proposal.as_ref()
    }

    /// The captured variable set, once prepare has succeeded.
    #[must_use]
    pub fn vars(&self) -> Option<&Arc<VariableSet>> {
        self.vars.as_ref()
    }

    /// Run the prepare stage.
    ///
    /// The variable set is only stored (here and by the caller) after the
    /// stage fully succeeds, so a failed or cancelled prepare leaves no
    /// partial state behind.
    ///
    /// # Errors
    /// [`PipelineError::StageOrder`] out of order, or whatever prepare
    /// itself raises.
    pub async fn prepare(&mut self, ports: &Ports) -> Result<Arc<VariableSet>, PipelineError> {
        validate_transition(self.stage, Stage::Prepared)?;
        let vars = Arc::new(self.migration.prepare(ports).await?);
        self.vars = Some(Arc::clone(&vars));
        self.stage = Stage::Prepared;
        Ok(vars)
    }

    /// Run the enact stage.
    ///
    /// # Errors
    /// [`PipelineError::StageOrder`] if prepare has not produced a variable
    /// set, or whatever enact itself raises.
    pub async fn enact(&mut self, ports: &Ports) -> Result<ProposalHandle, PipelineError> {
        validate_transition(self.stage, Stage::Submitted)?;
        let vars = self.vars.as_ref().ok_or(PipelineError::StageOrder {
            from: self.stage,
            to: Stage::Submitted,
        })?;
        let proposal = self.migration.enact(ports, vars).await?;
        self.proposal = Some(proposal.clone());
        self.stage = Stage::Submitted;
        Ok(proposal)
    }

    /// One enactment poll. Does not advance the stage; call
    /// [`MigrationRun::mark_applied`] once it returns true.
    ///
    /// # Errors
    /// [`PipelineError::StageOrder`] unless the run is at
    /// [`Stage::Submitted`], or whatever the poll itself raises.
    pub async fn poll_enacted(&self, ports: &Ports) -> Result<bool, PipelineError> {
        if self.stage != Stage::Submitted {
            return Err(PipelineError::StageOrder {
                from: self.stage,
                to: Stage::Applied,
            });
        }
        self.migration.enacted(ports).await
    }

    /// Record that the remote domain applied the change.
    ///
    /// # Errors
    /// [`PipelineError::StageOrder`] out of order.
    pub fn mark_applied(&mut self) -> Result<(), PipelineError> {
        validate_transition(self.stage, Stage::Applied)?;
        self.stage = Stage::Applied;
        Ok(())
    }

    /// Run the verify stage. Advances to [`Stage::Verified`] only when all
    /// checks pass; a mismatch moves the run to [`Stage::Failed`] and is
    /// reported through the returned result rather than an error.
    ///
    /// # Errors
    /// [`PipelineError::StageOrder`] out of order, or whatever verify
    /// itself raises.
    pub async fn verify(&mut self, ports: &Ports) -> Result<VerificationResult, PipelineError> {
        validate_transition(self.stage, Stage::Verified)?;
        let vars = self.vars.as_ref().ok_or(PipelineError::StageOrder {
            from: self.stage,
            to: Stage::Verified,
        })?;
        let result = self.migration.verify(ports, vars).await?;
        self.stage = if result.passed() {
            Stage::Verified
        } else {
            Stage::Failed
        };
        Ok(result)
    }

    /// Move the run to [`Stage::Failed`]. Idempotent on terminal stages.
    pub fn fail(&mut self) {
        if !matches!(self.stage, Stage::Verified | Stage::Failed) {
            self.stage = Stage::Failed;
        }
    }
}

impl fmt::Debug for MigrationRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationRun")
            .field("id", self.migration.id())
            .field("stage", &self.stage)
            .field("proposal", &self.proposal)
            .finish_non_exhaustive()
    }
}
