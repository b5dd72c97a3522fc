//! Append-only, hash-chained journal of stage transitions.
//!
//! Every stage outcome the runner observes is appended here, giving
//! operators a tamper-evident trail of what actually happened across a
//! batch. Each entry hashes its predecessor, so any edit or reorder breaks
//! `verify_integrity`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::migration::{MigrationId, Stage};

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageOutcome {
    /// Stage completed.
    Ok,
    /// Stage raised an error.
    Failed,
    /// Poll budget expired before application.
    TimedOut,
    /// Cancellation observed before or during the stage.
    Cancelled,
}

impl StageOutcome {
    /// Short lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StageOutcome::Ok => "ok",
            StageOutcome::Failed => "failed",
            StageOutcome::TimedOut => "timed-out",
            StageOutcome::Cancelled => "cancelled",
        }
    }
}

/// One journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the journal, starting at 0.
    pub seq: u64,
    /// Migration the entry belongs to.
    pub migration: MigrationId,
    /// Stage the entry records.
    pub stage: Stage,
    /// Outcome of that stage.
    pub outcome: StageOutcome,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Hash of the previous entry (zero for the first).
    pub prev_hash: [u8; 32],
    /// Hash over this entry's fields and `prev_hash`.
    pub hash: [u8; 32],
}

/// Journal integrity failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JournalError {
    /// The hash chain is broken at the given sequence number.
    #[error("journal integrity violation at seq {seq}")]
    IntegrityViolation {
        /// First entry that fails verification.
        seq: u64,
    },
}

/// Append-only stage journal.
#[derive(Debug, Default)]
pub struct StageJournal {
    inner: Mutex<Vec<JournalEntry>>,
}

impl StageJournal {
    /// Empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage outcome.
    pub fn append(&self, migration: &MigrationId, stage: Stage, outcome: StageOutcome) {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map_or([0u8; 32], |e| e.hash);
        let mut entry = JournalEntry {
            seq: guard.len() as u64,
            migration: migration.clone(),
            stage,
            outcome,
            timestamp: Utc::now(),
            prev_hash,
            hash: [0u8; 32],
        };
        entry.hash = compute_hash(&entry);
        guard.push(entry);
    }

    /// Snapshot of all entries.
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.inner.lock().clone()
    }

    /// Entries for one migration.
    #[must_use]
    pub fn entries_for(&self, migration: &MigrationId) -> Vec<JournalEntry> {
        self.inner
            .lock()
            .iter()
            .filter(|e| &e.migration == migration)
            .cloned()
            .collect()
    }

    /// Walk the chain and recompute every hash.
    ///
    /// # Errors
    /// [`JournalError::IntegrityViolation`] at the first entry whose link
    /// or hash does not match.
    pub fn verify_integrity(&self) -> Result<(), JournalError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for entry in guard.iter() {
            if entry.prev_hash != prev || entry.hash != compute_hash(entry) {
                return Err(JournalError::IntegrityViolation { seq: entry.seq });
            }
            prev = entry.hash;
        }
        Ok(())
    }
}

fn compute_hash(entry: &JournalEntry) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(entry.seq.to_le_bytes());
    hasher.update(entry.migration.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(entry.stage.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(entry.outcome.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(entry.timestamp.timestamp_micros().to_le_bytes());
    hasher.update(entry.prev_hash);
    hasher.finalize().into()
}
