//! The runner: drives migrations end-to-end, one at a time.
//!
//! The runner owns everything the migrations themselves must not: retry
//! wrapping of the capability ports, the enactment poll loop, cancellation,
//! the variable store, the stage journal, and report assembly. Migrations
//! only describe the change; the runner decides when each stage runs and
//! what happens when it fails.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, error, info};
use uuid::Uuid;

use causeway_ports::{
    Oracle, ProposalHandle, Provisioner, Relay, RetryOracle, RetryProvisioner, RetryRelay,
};

use crate::config::RunnerConfig;
use crate::error::PipelineError;
use crate::journal::{StageJournal, StageOutcome};
use crate::migration::{Migration, MigrationRun, Ports, Stage};
use crate::report::{MigrationReport, ReportedError, RunReport, VerificationResult};
use crate::vars::VariableStore;

/// Shared cancellation signal.
///
/// Checked before every stage and between enactment polls. Cancellation
/// never leaves a partially written variable set behind: the store is only
/// written after prepare fully succeeds.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Fresh, uncancelled flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives migrations through prepare → enact → await-application → verify.
///
/// Migrations in a batch run strictly sequentially: later migrations may
/// depend on earlier ones' recorded variables, so the default order is the
/// registry order and nothing runs concurrently.
pub struct Runner {
    ports: Ports,
    config: RunnerConfig,
    store: VariableStore,
    journal: StageJournal,
    cancel: CancelFlag,
}

impl Runner {
    /// Create a runner over the given port implementations.
    ///
    /// Every port is wrapped in the configured retry policy here; nothing
    /// downstream deals with transient transport failures.
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        relay: Arc<dyn Relay>,
        oracle: Arc<dyn Oracle>,
        config: RunnerConfig,
    ) -> Self {
        let ports = Ports::new(
            Arc::new(RetryProvisioner::new(provisioner, config.retry.clone())),
            Arc::new(RetryRelay::new(relay, config.retry.clone())),
            Arc::new(RetryOracle::new(oracle, config.retry.clone())),
        );
        Self {
            ports,
            config,
            store: VariableStore::new(),
            journal: StageJournal::new(),
            cancel: CancelFlag::new(),
        }
    }

    /// A handle to this runner's cancellation flag.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// The variable store.
    #[must_use]
    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    /// The stage journal.
    #[must_use]
    pub fn journal(&self) -> &StageJournal {
        &self.journal
    }

    /// Run every registered migration in order.
    ///
    /// A fatal error aborts the remaining stages of the migration it
    /// occurred in; the batch then continues with the next migration, and
    /// every migration contributes a complete report.
    pub async fn run_all(&self, registry: &crate::registry::MigrationRegistry) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, migrations = registry.len(), "batch starting");

        let mut migrations = Vec::with_capacity(registry.len());
        for migration in registry.iter() {
            migrations.push(self.run(Arc::clone(migration)).await);
        }

        let report = RunReport {
            run_id,
            migrations,
            started_at,
            finished_at: Utc::now(),
        };
        info!(%run_id, passed = report.passed(), "batch finished");
        report
    }

    /// Run a single migration end-to-end.
    pub async fn run(&self, migration: Arc<dyn Migration>) -> MigrationReport {
        let started_at = Utc::now();
        let mut run = MigrationRun::new(migration);
        info!(migration = %run.id(), "migration starting");

        // A fresh run supersedes whatever an earlier abandoned run of the
        // same migration left behind; within the run the store stays
        // write-once.
        self.store.discard(run.id());

        let (verification, errors) = self.drive(&mut run).await;
        self.release_if_terminal(&run);
        self.finish(run, verification, errors, started_at)
    }

    /// Resume a migration whose proposal was already submitted, re-running
    /// only the poll and verify stages.
    pub async fn resume(
        &self,
        migration: Arc<dyn Migration>,
        proposal: ProposalHandle,
    ) -> MigrationReport {
        let started_at = Utc::now();
        let id = migration.id().clone();

        let Some(vars) = self.store.get(&id) else {
            // No recorded variables means prepare never completed here.
            let err = PipelineError::StageOrder {
                from: Stage::Pending,
                to: Stage::Submitted,
            };
            let run = MigrationRun::new(migration);
            return self.finish(run, None, vec![ReportedError::from(&err)], started_at);
        };

        info!(migration = %id, %proposal, "resuming from submitted proposal");
        let mut run = MigrationRun::resumed(migration, vars, proposal);
        let (verification, errors) = self.drive_from_submitted(&mut run).await;
        self.release_if_terminal(&run);
        self.finish(run, verification, errors, started_at)
    }

    /// Variables live for the duration of a run and are released once it
    /// reaches a terminal stage. Timed-out and cancelled runs keep theirs
    /// so `resume` can pick up from the submitted proposal.
    fn release_if_terminal(&self, run: &MigrationRun) {
        if matches!(run.stage(), Stage::Verified | Stage::Failed) {
            self.store.discard(run.id());
        }
    }

    /// Drive a fresh run through all four stages.
    async fn drive(
        &self,
        run: &mut MigrationRun,
    ) -> (Option<VerificationResult>, Vec<ReportedError>) {
        // prepare
        match self.prepare_stage(run).await {
            Ok(()) => self
                .journal
                .append(run.id(), Stage::Prepared, StageOutcome::Ok),
            Err(err) => return (None, self.abort(run, Stage::Prepared, &err)),
        }

        // enact
        match self.enact_stage(run).await {
            Ok(()) => self
                .journal
                .append(run.id(), Stage::Submitted, StageOutcome::Ok),
            Err(err) => return (None, self.abort(run, Stage::Submitted, &err)),
        }

        self.drive_from_submitted(run).await
    }

    /// Poll and verify stages, shared between fresh and resumed runs.
    async fn drive_from_submitted(
        &self,
        run: &mut MigrationRun,
    ) -> (Option<VerificationResult>, Vec<ReportedError>) {
        // await application
        match self.await_enactment(run).await {
            Ok(()) => self
                .journal
                .append(run.id(), Stage::Applied, StageOutcome::Ok),
            Err(err) => return (None, self.abort(run, Stage::Applied, &err)),
        }

        // verify
        match self.verify_stage(run).await {
            Ok(result) => {
                let mut errors = Vec::new();
                if result.passed() {
                    self.journal
                        .append(run.id(), Stage::Verified, StageOutcome::Ok);
                    info!(migration = %run.id(), "migration verified");
                } else {
                    self.journal
                        .append(run.id(), Stage::Verified, StageOutcome::Failed);
                    let detail = result
                        .mismatches()
                        .map(|c| {
                            format!("{}: expected {}, actual {}", c.field, c.expected, c.actual)
                        })
                        .collect::<Vec<_>>()
                        .join("; ");
                    error!(migration = %run.id(), %detail, "verification mismatch");
                    errors.push(ReportedError {
                        kind: "verification-mismatch".to_string(),
                        message: format!("post-state does not match expectation: {detail}"),
                    });
                }
                (Some(result), errors)
            }
            Err(err) => (None, self.abort(run, Stage::Verified, &err)),
        }
    }

    async fn prepare_stage(&self, run: &mut MigrationRun) -> Result<(), PipelineError> {
        self.check_cancel()?;
        let vars = run.prepare(&self.ports).await?;
        debug!(migration = %run.id(), variables = vars.len(), "variables captured");
        self.store.record(run.id(), vars)?;
        Ok(())
    }

    async fn enact_stage(&self, run: &mut MigrationRun) -> Result<(), PipelineError> {
        self.check_cancel()?;
        let proposal = run.enact(&self.ports).await?;
        info!(migration = %run.id(), %proposal, "proposal submitted");
        Ok(())
    }

    /// Suspend-and-recheck loop: poll, sleep with backoff, re-poll, until
    /// the change is applied or the poll budget is spent.
    async fn await_enactment(&self, run: &mut MigrationRun) -> Result<(), PipelineError> {
        let policy = &self.config.poll;
        let start = Instant::now();
        let mut polls: u32 = 0;

        loop {
            self.check_cancel()?;
            polls += 1;
            if run.poll_enacted(&self.ports).await? {
                debug!(migration = %run.id(), polls, "enactment observed");
                run.mark_applied()?;
                return Ok(());
            }
            let waited = start.elapsed();
            if waited >= policy.timeout() {
                return Err(PipelineError::EnactmentTimeout {
                    waited_ms: waited.as_millis() as u64,
                    polls,
                });
            }
            let interval = policy.interval_for(polls - 1);
            debug!(
                migration = %run.id(),
                polls,
                next_poll_ms = interval.as_millis() as u64,
                "change not yet applied"
            );
            sleep(interval).await;
        }
    }

    async fn verify_stage(
        &self,
        run: &mut MigrationRun,
    ) -> Result<VerificationResult, PipelineError> {
        self.check_cancel()?;
        run.verify(&self.ports).await
    }

    /// Record a stage failure and flatten it into report errors.
    fn abort(
        &self,
        run: &mut MigrationRun,
        stage: Stage,
        err: &PipelineError,
    ) -> Vec<ReportedError> {
        let outcome = match err {
            PipelineError::Cancelled => StageOutcome::Cancelled,
            PipelineError::EnactmentTimeout { .. } => StageOutcome::TimedOut,
            _ => StageOutcome::Failed,
        };
        self.journal.append(run.id(), stage, outcome);
        error!(migration = %run.id(), stage = stage.as_str(), %err, "stage failed");
        if err.is_fatal() {
            run.fail();
        }
        vec![ReportedError::from(err)]
    }

    fn check_cancel(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn finish(
        &self,
        run: MigrationRun,
        verification: Option<VerificationResult>,
        errors: Vec<ReportedError>,
        started_at: chrono::DateTime<Utc>,
    ) -> MigrationReport {
        MigrationReport {
            id: run.id().clone(),
            stage_reached: run.stage(),
            proposal: run.proposal().cloned(),
            verification,
            errors,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
