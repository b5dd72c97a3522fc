//! Runner configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use causeway_ports::RetryPolicy;

/// Backoff schedule for the enactment poll loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay before the second poll (the first happens immediately).
    pub initial_interval_ms: u64,
    /// Multiplier applied to the interval after each poll.
    pub multiplier: f64,
    /// Upper bound on any single interval.
    pub max_interval_ms: u64,
    /// Total budget; polling past this reports an enactment timeout.
    pub timeout_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            multiplier: 2.0,
            max_interval_ms: 30_000,
            timeout_ms: 300_000,
        }
    }
}

impl PollPolicy {
    /// Interval to sleep after the given 0-based poll index.
    #[must_use]
    pub fn interval_for(&self, poll: u32) -> Duration {
        let raw = (self.initial_interval_ms as f64) * self.multiplier.powi(poll as i32);
        Duration::from_millis(raw.min(self.max_interval_ms as f64) as u64)
    }

    /// Total poll budget.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration for a [`crate::runner::Runner`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Retry policy installed around every capability port call.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Backoff schedule for the enactment poll loop.
    #[serde(default)]
    pub poll: PollPolicy,
}
