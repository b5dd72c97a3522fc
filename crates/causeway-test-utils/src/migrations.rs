//! Fixture migrations.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use causeway_codec::{
    encode, Address, DomainId, Operation, RouteMeta, SelectorTable, Value, ValueKind,
};
use causeway_pipeline::{
    Migration, MigrationId, PipelineError, Ports, VariableSet, VerificationResult,
};
use causeway_ports::{PortError, ProposalHandle, ResourceSpec};

/// A realistic sample migration: provision a new price feed, then propose
/// pointing a market's `priceFeed` at it in the remote domain.
///
/// Mirrors the shape of real change-feed migrations: prepare captures the
/// provisioned feed handle, enact bundles a single `updateAssetPriceFeed`
/// call, enacted/verify read the market back through the oracle.
pub struct PriceFeedMigration {
    id: MigrationId,
    market: Address,
    asset: Address,
    feed_spec: ResourceSpec,
    destination: DomainId,
    gas_budget: u64,
    selectors: SelectorTable,
}

impl PriceFeedMigration {
    pub fn new(
        id: impl Into<MigrationId>,
        market: Address,
        asset: Address,
        feed_spec: ResourceSpec,
        destination: impl Into<DomainId>,
    ) -> Self {
        let mut selectors = SelectorTable::new();
        selectors.declare(
            "updateAssetPriceFeed",
            &[ValueKind::Address, ValueKind::Address],
        );
        Self {
            id: id.into(),
            market,
            asset,
            feed_spec,
            destination: destination.into(),
            gas_budget: 600_000,
            selectors,
        }
    }

    /// The market field enact targets and verify reads back.
    pub const PRICE_FEED_FIELD: &'static str = "priceFeed";
}

#[async_trait]
impl Migration for PriceFeedMigration {
    fn id(&self) -> &MigrationId {
        &self.id
    }

    async fn prepare(&self, ports: &Ports) -> Result<VariableSet, PipelineError> {
        let feed = ports
            .provisioner
            .ensure(&self.feed_spec)
            .await
            .map_err(PipelineError::provision)?;
        Ok(VariableSet::builder()
            .set("newPriceFeed", feed)
            .set("market", self.market)
            .build())
    }

    async fn enact(
        &self,
        ports: &Ports,
        vars: &VariableSet,
    ) -> Result<ProposalHandle, PipelineError> {
        let feed = vars.require_address("newPriceFeed")?;
        let ops = vec![Operation::new(
            self.market,
            "updateAssetPriceFeed",
            vec![Value::Address(self.asset), Value::Address(feed)],
        )];
        let route = RouteMeta::new(self.destination.clone(), self.gas_budget);
        let payload = encode(&ops, &route, &self.selectors)?;
        ports
            .relay
            .submit(&payload, &self.destination, self.gas_budget)
            .await
            .map_err(PipelineError::submission)
    }

    async fn enacted(&self, ports: &Ports) -> Result<bool, PipelineError> {
        // ensure is an idempotent upsert, so this is a pure lookup of the
        // handle prepare created.
        let feed = ports
            .provisioner
            .ensure(&self.feed_spec)
            .await
            .map_err(PipelineError::provision)?;
        match ports
            .oracle
            .read(self.market, Self::PRICE_FEED_FIELD)
            .await
        {
            Ok(value) => Ok(value == Value::Address(feed)),
            Err(PortError::NotFound { .. }) => Ok(false),
            Err(err) => Err(PipelineError::oracle(err)),
        }
    }

    async fn verify(
        &self,
        ports: &Ports,
        vars: &VariableSet,
    ) -> Result<VerificationResult, PipelineError> {
        let expected = vars.require_address("newPriceFeed")?;
        let actual = ports
            .oracle
            .read(self.market, Self::PRICE_FEED_FIELD)
            .await
            .map_err(PipelineError::oracle)?;

        let mut result = VerificationResult::new();
        result.check(Self::PRICE_FEED_FIELD, Value::Address(expected), actual);
        Ok(result)
    }
}

/// Fully scripted migration for exercising runner mechanics.
///
/// Every stage's behavior is injectable: prepare can fail, the enacted
/// poll follows a scripted answer sequence, verify returns a canned
/// result. Enact always goes through the real codec and relay port so the
/// submission path stays honest.
pub struct ScriptedMigration {
    id: MigrationId,
    destination: DomainId,
    prepare_failure: Option<PortError>,
    enacted_script: Mutex<VecDeque<bool>>,
    polls: AtomicU32,
    verification: Mutex<Option<VerificationResult>>,
    selectors: SelectorTable,
}

impl ScriptedMigration {
    pub fn new(id: impl Into<String>) -> Self {
        let mut selectors = SelectorTable::new();
        selectors.declare("touch", &[ValueKind::Str]);
        Self {
            id: MigrationId::new(id),
            destination: DomainId::new("testnet"),
            prepare_failure: None,
            enacted_script: Mutex::new(VecDeque::new()),
            polls: AtomicU32::new(0),
            verification: Mutex::new(None),
            selectors,
        }
    }

    /// Make prepare fail with the given port error.
    #[must_use]
    pub fn with_prepare_failure(mut self, err: PortError) -> Self {
        self.prepare_failure = Some(err);
        self
    }

    /// Script the enacted poll answers. Once the script is exhausted the
    /// poll answers true.
    #[must_use]
    pub fn with_enacted_script(self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.enacted_script.lock().extend(answers);
        self
    }

    /// Script the verification outcome. Unset means an empty, passing
    /// result.
    #[must_use]
    pub fn with_verification(self, result: VerificationResult) -> Self {
        *self.verification.lock() = Some(result);
        self
    }

    /// How many times the enacted poll ran.
    pub fn poll_count(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Migration for ScriptedMigration {
    fn id(&self) -> &MigrationId {
        &self.id
    }

    async fn prepare(&self, _ports: &Ports) -> Result<VariableSet, PipelineError> {
        if let Some(err) = &self.prepare_failure {
            return Err(PipelineError::provision(err.clone()));
        }
        Ok(VariableSet::builder()
            .set("token", self.id.as_str())
            .build())
    }

    async fn enact(
        &self,
        ports: &Ports,
        vars: &VariableSet,
    ) -> Result<ProposalHandle, PipelineError> {
        let token = vars.require("token")?.clone();
        let ops = vec![Operation::new(Address([0xee; 20]), "touch", vec![token])];
        let route = RouteMeta::new(self.destination.clone(), 100_000);
        let payload = encode(&ops, &route, &self.selectors)?;
        ports
            .relay
            .submit(&payload, &self.destination, 100_000)
            .await
            .map_err(PipelineError::submission)
    }

    async fn enacted(&self, _ports: &Ports) -> Result<bool, PipelineError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.enacted_script.lock().pop_front().unwrap_or(true))
    }

    async fn verify(
        &self,
        _ports: &Ports,
        _vars: &VariableSet,
    ) -> Result<VerificationResult, PipelineError> {
        Ok(self.verification.lock().take().unwrap_or_default())
    }
}
