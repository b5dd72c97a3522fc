//! In-memory capability port implementations.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use causeway_codec::{Address, DomainId, Payload, Value};
use causeway_ports::{
    Oracle, PortError, ProposalHandle, Provisioner, Relay, ResourceProps, ResourceSpec,
};

/// Idempotent in-memory provisioner.
///
/// `ensure` is a true upsert: the first call for a given spec creates a
/// deterministic handle, every later call returns the same handle without
/// counting as a creation.
#[derive(Debug, Default)]
pub struct MemoryProvisioner {
    by_spec: DashMap<String, Address>,
    props: DashMap<Address, ResourceProps>,
    next_index: AtomicU64,
    creates: AtomicU32,
}

impl MemoryProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many resources were actually created (not looked up).
    pub fn create_count(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }

    /// Pre-seed a resource so `ensure` finds it without creating.
    pub fn seed(&self, spec: &ResourceSpec, handle: Address) {
        self.by_spec.insert(spec_key(spec), handle);
        self.props.insert(
            handle,
            ResourceProps {
                kind: spec.kind.clone(),
                fields: BTreeMap::new(),
            },
        );
    }
}

fn spec_key(spec: &ResourceSpec) -> String {
    // Serde rendering is stable for a given spec, which is all the key
    // needs.
    serde_json::to_string(spec).unwrap_or_else(|_| format!("{spec:?}"))
}

fn handle_for_index(index: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xfa;
    bytes[12..].copy_from_slice(&index.to_be_bytes());
    Address(bytes)
}

#[async_trait]
impl Provisioner for MemoryProvisioner {
    async fn ensure(&self, spec: &ResourceSpec) -> Result<Address, PortError> {
        if spec.kind.is_empty() {
            return Err(PortError::InvalidSpec {
                domain: spec.domain.clone(),
                reason: "empty resource kind".to_string(),
            });
        }
        let key = spec_key(spec);
        if let Some(existing) = self.by_spec.get(&key) {
            return Ok(*existing);
        }
        let handle = handle_for_index(self.next_index.fetch_add(1, Ordering::SeqCst));
        self.by_spec.insert(key, handle);
        self.props.insert(
            handle,
            ResourceProps {
                kind: spec.kind.clone(),
                fields: BTreeMap::new(),
            },
        );
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    async fn describe(&self, handle: Address) -> Result<ResourceProps, PortError> {
        self.props
            .get(&handle)
            .map(|entry| entry.value().clone())
            .ok_or(PortError::NotFound {
                target: handle,
                field: "*".to_string(),
            })
    }
}

/// One submission a [`MemoryRelay`] accepted.
#[derive(Debug, Clone)]
pub struct RecordedSubmission {
    pub payload: Vec<u8>,
    pub destination: DomainId,
    pub gas_budget: u64,
    pub proposal: ProposalHandle,
}

/// In-memory relay that optionally fails transiently before accepting.
#[derive(Debug, Default)]
pub struct MemoryRelay {
    transient_failures_left: AtomicU32,
    calls: AtomicU32,
    submissions: Mutex<Vec<RecordedSubmission>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relay that answers the first `failures` submissions with a
    /// transient transport error, then accepts.
    pub fn failing(failures: u32) -> Self {
        Self {
            transient_failures_left: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    /// Total submit calls, including failed ones.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Accepted submissions, in order.
    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn submit(
        &self,
        payload: &Payload,
        destination: &DomainId,
        gas_budget: u64,
    ) -> Result<ProposalHandle, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let left = self.transient_failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.transient_failures_left.store(left - 1, Ordering::SeqCst);
            return Err(PortError::transport("relay temporarily unavailable"));
        }

        let proposal = ProposalHandle::new(
            format!("proposal-{}", uuid::Uuid::new_v4()),
            destination.clone(),
        );
        self.submissions.lock().push(RecordedSubmission {
            payload: payload.as_bytes().to_vec(),
            destination: destination.clone(),
            gas_budget,
            proposal: proposal.clone(),
        });
        Ok(proposal)
    }
}

/// Relay that refuses every submission with a domain-semantic rejection.
#[derive(Debug)]
pub struct RejectingRelay {
    reason: String,
    calls: AtomicU32,
}

impl RejectingRelay {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Relay for RejectingRelay {
    async fn submit(
        &self,
        _payload: &Payload,
        _destination: &DomainId,
        _gas_budget: u64,
    ) -> Result<ProposalHandle, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PortError::rejected(self.reason.clone()))
    }
}

/// Oracle backed by a plain (target, field) → value table.
#[derive(Debug, Default)]
pub struct TableOracle {
    table: DashMap<(Address, String), Value>,
    reads: AtomicU32,
}

impl TableOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, as if the remote domain had applied a change.
    pub fn set(&self, target: Address, field: impl Into<String>, value: Value) {
        self.table.insert((target, field.into()), value);
    }

    /// Remove a field.
    pub fn clear(&self, target: Address, field: &str) {
        self.table.remove(&(target, field.to_string()));
    }

    /// Total reads served (including misses).
    pub fn read_count(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for TableOracle {
    async fn read(&self, target: Address, field: &str) -> Result<Value, PortError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.table
            .get(&(target, field.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or(PortError::NotFound {
                target,
                field: field.to_string(),
            })
    }
}
