//! Verification results and run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use uuid::Uuid;

use causeway_codec::Value;
use causeway_ports::ProposalHandle;

use crate::error::PipelineError;
use crate::migration::{MigrationId, Stage};

/// One (expected, actual) comparison from the verify stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationCheck {
    /// Field that was read.
    pub field: String,
    /// Value captured at prepare time.
    pub expected: Value,
    /// Value observed after application.
    pub actual: Value,
    /// Whether they matched.
    pub pass: bool,
}

/// Outcome of the verify stage: every comparison, pass and fail alike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    checks: Vec<VerificationCheck>,
}

impl VerificationResult {
    /// Empty result (vacuously passing).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a comparison; pass is `expected == actual`.
    pub fn check(&mut self, field: impl Into<String>, expected: Value, actual: Value) {
        let pass = expected == actual;
        self.checks.push(VerificationCheck {
            field: field.into(),
            expected,
            actual,
            pass,
        });
    }

    /// All recorded checks.
    #[must_use]
    pub fn checks(&self) -> &[VerificationCheck] {
        &self.checks
    }

    /// The failing checks.
    pub fn mismatches(&self) -> impl Iterator<Item = &VerificationCheck> {
        self.checks.iter().filter(|c| !c.pass)
    }

    /// Overall outcome: logical AND over all checks.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.pass)
    }
}

/// An error flattened for reporting: stable kind tag plus rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    /// Stable kind tag, e.g. `submission` or `enactment-timeout`.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

impl From<&PipelineError> for ReportedError {
    fn from(err: &PipelineError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Everything the runner has to say about one migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Migration id.
    pub id: MigrationId,
    /// Furthest stage the run reached.
    pub stage_reached: Stage,
    /// Proposal handle, if submission happened.
    pub proposal: Option<ProposalHandle>,
    /// Verification outcome, if the verify stage ran.
    pub verification: Option<VerificationResult>,
    /// Errors encountered, in order.
    pub errors: Vec<ReportedError>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

impl MigrationReport {
    /// Whether this migration completed fully verified with no errors.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.stage_reached == Stage::Verified
            && self.errors.is_empty()
            && self.verification.as_ref().is_some_and(VerificationResult::passed)
    }
}

/// The externally visible artifact of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Correlation id for this batch run.
    pub run_id: Uuid,
    /// Per-migration reports, in execution order.
    pub migrations: Vec<MigrationReport>,
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// When the batch finished.
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Whether every migration passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.migrations.iter().all(MigrationReport::passed)
    }

    /// Render the operator-facing text summary.
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Run {}", self.run_id);
        let _ = writeln!(
            out,
            "Migrations: {} total, {} passed",
            self.migrations.len(),
            self.migrations.iter().filter(|m| m.passed()).count()
        );

        for report in &self.migrations {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "[{}] {} - {}",
                if report.passed() { "PASS" } else { "FAIL" },
                report.id,
                report.stage_reached.as_str()
            );
            if let Some(proposal) = &report.proposal {
                let _ = writeln!(out, "  proposal: {proposal}");
            }
            if let Some(verification) = &report.verification {
                for check in verification.checks() {
                    let _ = writeln!(
                        out,
                        "  {} {}: expected {}, actual {}",
                        if check.pass { "ok " } else { "FAIL" },
                        check.field,
                        check.expected,
                        check.actual
                    );
                }
            }
            for error in &report.errors {
                let _ = writeln!(out, "  error[{}]: {}", error.kind, error.message);
            }
        }
        out
    }
}
