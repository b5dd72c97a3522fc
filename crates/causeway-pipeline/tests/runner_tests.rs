//! End-to-end runner tests against in-memory ports.
//!
//! These exercise the contract the pipeline makes to operators:
//! - a full prepare → enact → await → verify pass over real (in-memory)
//!   ports, with the submitted payload decodable back into the change
//! - retry bounds around the relay
//! - poll backoff discipline and enactment timeout with later resume
//! - batch behavior: a failed migration never blocks the rest
//! - cancellation aborts without leaving variable state behind

use std::sync::Arc;
use std::time::{Duration, Instant};

use causeway_codec::{decode, Address, Value};
use causeway_pipeline::journal::StageOutcome;
use causeway_pipeline::{
    MigrationRegistry, PollPolicy, RunnerConfig, Runner, Stage,
};
use causeway_ports::{PortError, ResourceSpec, RetryPolicy};
use causeway_test_utils::{
    init_test_logging, MemoryProvisioner, MemoryRelay, PriceFeedMigration, RejectingRelay,
    ScriptedMigration, TableOracle,
};

const MARKET: Address = Address([0xc0; 20]);
const ASSET: Address = Address([0x0a; 20]);

fn fast_config() -> RunnerConfig {
    RunnerConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
            multiplier: 2.0,
            jitter_ms: 0,
        },
        poll: PollPolicy {
            initial_interval_ms: 5,
            multiplier: 2.0,
            max_interval_ms: 40,
            timeout_ms: 2_000,
        },
    }
}

fn feed_spec() -> ResourceSpec {
    ResourceSpec::new(
        "price-feed",
        vec![Value::from("USDC/USD"), Value::Uint(8)],
        "base",
    )
}

fn price_feed_migration() -> PriceFeedMigration {
    PriceFeedMigration::new(
        "1724411762_switch_usdc_price_feed",
        MARKET,
        ASSET,
        feed_spec(),
        "base",
    )
}

/// Happy path: the change is applied remotely and verification closes the
/// loop against the values captured at prepare time.
#[tokio::test]
async fn full_run_passes_and_payload_round_trips() {
    init_test_logging();

    let provisioner = Arc::new(MemoryProvisioner::new());
    let relay = Arc::new(MemoryRelay::new());
    let oracle = Arc::new(TableOracle::new());

    // The remote domain already reflects the change by the time we poll:
    // seed the feed handle and point the market at it.
    let feed = Address([0xfd; 20]);
    provisioner.seed(&feed_spec(), feed);
    oracle.set(MARKET, "priceFeed", Value::Address(feed));

    let runner = Runner::new(
        provisioner.clone(),
        relay.clone(),
        oracle,
        fast_config(),
    );
    let report = runner.run(Arc::new(price_feed_migration())).await;

    assert!(report.passed(), "report: {report:?}");
    assert_eq!(report.stage_reached, Stage::Verified);
    assert!(report.proposal.is_some());
    assert_eq!(provisioner.create_count(), 0, "seeded feed must be reused");

    // The submitted payload decodes back into the exact change.
    let submissions = relay.submissions();
    assert_eq!(submissions.len(), 1);
    let decoded = decode(&submissions[0].payload).unwrap();
    assert_eq!(decoded.route.destination.as_str(), "base");
    assert_eq!(decoded.ops.len(), 1);
    assert_eq!(decoded.ops[0].target, MARKET);
    assert_eq!(decoded.ops[0].selector, "updateAssetPriceFeed");
    assert_eq!(
        decoded.ops[0].args,
        vec![Value::Address(ASSET), Value::Address(feed)]
    );

    // Variables are released once the run completes.
    assert!(runner.store().is_empty());

    // The journal holds the full stage history and verifies.
    let entries = runner.journal().entries();
    let stages: Vec<_> = entries.iter().map(|e| (e.stage, e.outcome)).collect();
    assert_eq!(
        stages,
        vec![
            (Stage::Prepared, StageOutcome::Ok),
            (Stage::Submitted, StageOutcome::Ok),
            (Stage::Applied, StageOutcome::Ok),
            (Stage::Verified, StageOutcome::Ok),
        ]
    );
    assert!(runner.journal().verify_integrity().is_ok());
}

/// A relay that fails transiently K times succeeds under a K+1 attempt
/// budget; with only K attempts the failure surfaces after exactly K calls.
#[tokio::test]
async fn relay_retry_bound_is_exact() {
    init_test_logging();

    // K = 2 transient failures, budget 3: succeeds on the third call.
    let relay = Arc::new(MemoryRelay::failing(2));
    let oracle = Arc::new(TableOracle::new());
    let runner = Runner::new(
        Arc::new(MemoryProvisioner::new()),
        relay.clone(),
        oracle,
        fast_config(),
    );
    let report = runner.run(Arc::new(ScriptedMigration::new("1_retry_ok"))).await;
    assert!(report.passed(), "report: {report:?}");
    assert_eq!(relay.call_count(), 3);

    // Same failure pattern, budget 2: submission error after exactly 2.
    let relay = Arc::new(MemoryRelay::failing(2));
    let mut config = fast_config();
    config.retry.max_attempts = 2;
    let runner = Runner::new(
        Arc::new(MemoryProvisioner::new()),
        relay.clone(),
        Arc::new(TableOracle::new()),
        config,
    );
    let report = runner.run(Arc::new(ScriptedMigration::new("2_retry_spent"))).await;
    assert!(!report.passed());
    assert_eq!(relay.call_count(), 2);
    assert_eq!(report.stage_reached, Stage::Failed);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, "submission");
}

/// Domain-semantic rejections are never retried.
#[tokio::test]
async fn relay_rejection_is_not_retried() {
    init_test_logging();

    let relay = Arc::new(RejectingRelay::new("insufficient authorization"));
    let runner = Runner::new(
        Arc::new(MemoryProvisioner::new()),
        relay.clone(),
        Arc::new(TableOracle::new()),
        fast_config(),
    );
    let report = runner.run(Arc::new(ScriptedMigration::new("1_rejected"))).await;

    assert!(!report.passed());
    assert_eq!(relay.call_count(), 1);
    assert_eq!(report.errors[0].kind, "submission");
    assert!(report.errors[0].message.contains("insufficient authorization"));
}

/// enacted() answering false, false, true makes the runner proceed to
/// verify only after the third poll, sleeping per the poll backoff in
/// between.
#[tokio::test]
async fn poll_loop_backs_off_until_enacted() {
    init_test_logging();

    let migration = Arc::new(
        ScriptedMigration::new("1_slow_apply").with_enacted_script([false, false, true]),
    );
    let mut config = fast_config();
    config.poll = PollPolicy {
        initial_interval_ms: 20,
        multiplier: 2.0,
        max_interval_ms: 100,
        timeout_ms: 5_000,
    };
    let runner = Runner::new(
        Arc::new(MemoryProvisioner::new()),
        Arc::new(MemoryRelay::new()),
        Arc::new(TableOracle::new()),
        config,
    );

    let start = Instant::now();
    let report = runner.run(Arc::clone(&migration) as _).await;
    let elapsed = start.elapsed();

    assert!(report.passed(), "report: {report:?}");
    assert_eq!(migration.poll_count(), 3);
    // Two sleeps happened: 20ms then 40ms.
    assert!(
        elapsed >= Duration::from_millis(60),
        "expected backoff sleeps, finished in {elapsed:?}"
    );
}

/// Exhausting the poll budget reports an enactment timeout, leaves the
/// migration resumable, and a later resume completes it.
#[tokio::test]
async fn enactment_timeout_is_resumable() {
    init_test_logging();

    let migration = Arc::new(
        ScriptedMigration::new("1_stuck_proposal")
            .with_enacted_script([false, false, false]),
    );
    let mut config = fast_config();
    config.poll = PollPolicy {
        initial_interval_ms: 10,
        multiplier: 2.0,
        max_interval_ms: 40,
        timeout_ms: 15,
    };
    let runner = Runner::new(
        Arc::new(MemoryProvisioner::new()),
        Arc::new(MemoryRelay::new()),
        Arc::new(TableOracle::new()),
        config,
    );

    let report = runner.run(Arc::clone(&migration) as _).await;

    assert!(!report.passed());
    assert_eq!(report.stage_reached, Stage::Submitted, "not a hard failure");
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, "enactment-timeout");
    let proposal = report.proposal.clone().expect("proposal was submitted");

    // Variables are kept for resumption.
    assert!(runner.store().get(&report.id).is_some());

    // The remote domain catches up; resume re-runs only poll + verify.
    let resumed = runner.resume(Arc::clone(&migration) as _, proposal).await;
    assert!(resumed.passed(), "resumed report: {resumed:?}");
    assert_eq!(resumed.stage_reached, Stage::Verified);
    assert!(runner.store().is_empty());
}

/// Resume without recorded variables is a precondition error, not a crash.
#[tokio::test]
async fn resume_without_variables_fails_fast() {
    let runner = Runner::new(
        Arc::new(MemoryProvisioner::new()),
        Arc::new(MemoryRelay::new()),
        Arc::new(TableOracle::new()),
        fast_config(),
    );
    let migration = Arc::new(ScriptedMigration::new("1_never_ran"));
    let proposal = causeway_ports::ProposalHandle::new("proposal-x", "testnet");

    let report = runner.resume(migration, proposal).await;
    assert!(!report.passed());
    assert_eq!(report.errors[0].kind, "stage-order");
}

/// A verification mismatch fails the migration but is reported with the
/// full diff rather than thrown.
#[tokio::test]
async fn verification_mismatch_is_reported_not_thrown() {
    init_test_logging();

    let mut mismatch = causeway_pipeline::VerificationResult::new();
    mismatch.check(
        "priceFeed",
        Value::Address(Address([1; 20])),
        Value::Address(Address([2; 20])),
    );
    mismatch.check("supplyCap", Value::Uint(100), Value::Uint(100));

    let migration = Arc::new(
        ScriptedMigration::new("1_drifted").with_verification(mismatch),
    );
    let runner = Runner::new(
        Arc::new(MemoryProvisioner::new()),
        Arc::new(MemoryRelay::new()),
        Arc::new(TableOracle::new()),
        fast_config(),
    );
    let report = runner.run(migration).await;

    assert!(!report.passed());
    assert_eq!(report.stage_reached, Stage::Failed);
    let verification = report.verification.expect("verify ran");
    assert!(!verification.passed());
    assert_eq!(verification.mismatches().count(), 1);
    assert_eq!(report.errors[0].kind, "verification-mismatch");
    assert!(report.errors[0].message.contains("priceFeed"));
}

/// Batches run in registry order and a failed migration never blocks the
/// ones after it; every migration gets a complete report.
#[tokio::test]
async fn batch_continues_past_failed_migration() {
    init_test_logging();

    let mut registry = MigrationRegistry::new();
    registry
        .register(Arc::new(ScriptedMigration::new("2_second_ok")))
        .unwrap();
    registry
        .register(Arc::new(
            ScriptedMigration::new("1_first_fails").with_prepare_failure(PortError::Backend {
                message: "artifact store unavailable".to_string(),
            }),
        ))
        .unwrap();

    // Ordered by timestamp prefix, not insertion order.
    let ids: Vec<_> = registry.ids().iter().map(ToString::to_string).collect();
    assert_eq!(ids, vec!["1_first_fails", "2_second_ok"]);

    let runner = Runner::new(
        Arc::new(MemoryProvisioner::new()),
        Arc::new(MemoryRelay::new()),
        Arc::new(TableOracle::new()),
        fast_config(),
    );
    let report = runner.run_all(&registry).await;

    assert_eq!(report.migrations.len(), 2);
    assert!(!report.migrations[0].passed());
    assert_eq!(report.migrations[0].errors[0].kind, "provision");
    assert!(report.migrations[1].passed());
    assert!(!report.passed());

    let text = report.generate_text();
    assert!(text.contains("1_first_fails"));
    assert!(text.contains("2_second_ok"));
}

/// Duplicate ids are rejected at registration time.
#[test]
fn registry_rejects_duplicate_ids() {
    let mut registry = MigrationRegistry::new();
    registry
        .register(Arc::new(ScriptedMigration::new("1_once")))
        .unwrap();
    let dup = registry.register(Arc::new(ScriptedMigration::new("1_once")));
    assert!(dup.is_err());
}

/// Cancellation observed before the first stage aborts the run without
/// writing any variable state.
#[tokio::test]
async fn cancellation_leaves_no_variable_state() {
    init_test_logging();

    let runner = Runner::new(
        Arc::new(MemoryProvisioner::new()),
        Arc::new(MemoryRelay::new()),
        Arc::new(TableOracle::new()),
        fast_config(),
    );
    runner.cancel_flag().cancel();

    let report = runner.run(Arc::new(ScriptedMigration::new("1_cancelled"))).await;

    assert!(!report.passed());
    assert_eq!(report.errors[0].kind, "cancelled");
    assert_eq!(report.stage_reached, Stage::Pending);
    assert!(runner.store().is_empty());
}

/// Verification correctness at the migration level: an oracle agreeing
/// with the captured value passes, a drifted one produces the mismatch
/// pair.
#[tokio::test]
async fn price_feed_verify_compares_against_captured_value() {
    use causeway_pipeline::{Migration, Ports};

    let provisioner = Arc::new(MemoryProvisioner::new());
    let oracle = Arc::new(TableOracle::new());
    let ports = Ports::new(
        provisioner.clone(),
        Arc::new(MemoryRelay::new()),
        oracle.clone(),
    );

    let migration = price_feed_migration();
    let vars = migration.prepare(&ports).await.unwrap();
    let feed = vars.require_address("newPriceFeed").unwrap();

    // Oracle reports the captured value: all-pass.
    oracle.set(MARKET, "priceFeed", Value::Address(feed));
    let result = migration.verify(&ports, &vars).await.unwrap();
    assert!(result.passed());

    // Oracle reports something else: a mismatch entry with both values.
    let drifted = Address([0xdd; 20]);
    oracle.set(MARKET, "priceFeed", Value::Address(drifted));
    let result = migration.verify(&ports, &vars).await.unwrap();
    assert!(!result.passed());
    let mismatch = result.mismatches().next().unwrap();
    assert_eq!(mismatch.expected, Value::Address(feed));
    assert_eq!(mismatch.actual, Value::Address(drifted));
    assert!(!mismatch.pass);
}

/// The provisioner's describe contract works through the retry wrapper:
/// known handles report their properties, unknown handles are not-found.
#[tokio::test]
async fn describe_reports_resource_properties() {
    use causeway_ports::{Provisioner, RetryProvisioner};

    let provisioner = Arc::new(MemoryProvisioner::new());
    let handle = provisioner.ensure(&feed_spec()).await.unwrap();

    let wrapped = RetryProvisioner::new(provisioner, RetryPolicy::no_retries());
    let props = wrapped.describe(handle).await.unwrap();
    assert_eq!(props.kind, "price-feed");

    let missing = wrapped.describe(Address([0x99; 20])).await;
    assert!(matches!(missing, Err(PortError::NotFound { .. })));
}

/// Idempotent prepare: a second run against a warm provisioner captures
/// identical variables and creates nothing new.
#[tokio::test]
async fn prepare_is_idempotent_against_warm_provisioner() {
    use causeway_pipeline::{Migration, Ports};

    let provisioner = Arc::new(MemoryProvisioner::new());
    let ports = Ports::new(
        provisioner.clone(),
        Arc::new(MemoryRelay::new()),
        Arc::new(TableOracle::new()),
    );

    let migration = price_feed_migration();
    let first = migration.prepare(&ports).await.unwrap();
    assert_eq!(provisioner.create_count(), 1);

    let second = migration.prepare(&ports).await.unwrap();
    assert_eq!(first, second, "same variable values on rerun");
    assert_eq!(provisioner.create_count(), 1, "no duplicate resource");
}
