//! Bounded retry with exponential backoff for port calls.
//!
//! Only transient transport failures are retried; domain-semantic
//! rejections (invalid spec, relay rejection, not-found) surface on the
//! first attempt. The attempt budget is exact: `max_attempts = K` means the
//! Kth consecutive failure is returned to the caller.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use causeway_codec::{Address, DomainId, Payload, Value};

use crate::error::PortError;
use crate::oracle::Oracle;
use crate::provisioner::{Provisioner, ResourceProps, ResourceSpec};
use crate::relay::{ProposalHandle, Relay};

/// Bounded exponential backoff policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first call. Must be at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
    /// Backoff multiplier applied per retry.
    pub multiplier: f64,
    /// Maximum uniform jitter added to each delay. Zero disables jitter.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            jitter_ms: 50,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff delay after the given 1-based failed attempt, jitter included.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let raw = (self.base_delay_ms as f64) * self.multiplier.powi(exponent as i32);
        let capped = raw.min(self.max_delay_ms as f64) as u64;
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=self.jitter_ms)
        };
        Duration::from_millis(capped + jitter)
    }
}

/// Run `call` under `policy`, retrying transient failures.
///
/// `what` names the operation for log lines.
///
/// # Errors
/// The final [`PortError`] once the attempt budget is spent, or immediately
/// for non-transient failures.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut call: F,
) -> Result<T, PortError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PortError>>,
{
    let mut attempt: u32 = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation = what,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient port failure, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// [`Provisioner`] wrapper applying a [`RetryPolicy`] to every call.
pub struct RetryProvisioner {
    inner: Arc<dyn Provisioner>,
    policy: RetryPolicy,
}

impl RetryProvisioner {
    /// Wrap a provisioner.
    pub fn new(inner: Arc<dyn Provisioner>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl Provisioner for RetryProvisioner {
    async fn ensure(&self, spec: &ResourceSpec) -> Result<Address, PortError> {
        run_with_retry(&self.policy, "provisioner.ensure", || self.inner.ensure(spec)).await
    }

    async fn describe(&self, handle: Address) -> Result<ResourceProps, PortError> {
        run_with_retry(&self.policy, "provisioner.describe", || {
            self.inner.describe(handle)
        })
        .await
    }
}

/// [`Relay`] wrapper applying a [`RetryPolicy`] to every call.
///
/// Only transport failures are retried; a rejection is never resubmitted
/// here, because duplicate-proposal risk is domain-specific.
pub struct RetryRelay {
    inner: Arc<dyn Relay>,
    policy: RetryPolicy,
}

impl RetryRelay {
    /// Wrap a relay.
    pub fn new(inner: Arc<dyn Relay>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl Relay for RetryRelay {
    async fn submit(
        &self,
        payload: &Payload,
        destination: &DomainId,
        gas_budget: u64,
    ) -> Result<ProposalHandle, PortError> {
        run_with_retry(&self.policy, "relay.submit", || {
            self.inner.submit(payload, destination, gas_budget)
        })
        .await
    }
}

/// [`Oracle`] wrapper applying a [`RetryPolicy`] to every call.
pub struct RetryOracle {
    inner: Arc<dyn Oracle>,
    policy: RetryPolicy,
}

impl RetryOracle {
    /// Wrap an oracle.
    pub fn new(inner: Arc<dyn Oracle>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl Oracle for RetryOracle {
    async fn read(&self, target: Address, field: &str) -> Result<Value, PortError> {
        run_with_retry(&self.policy, "oracle.read", || self.inner.read(target, field)).await
    }
}
