//! Integration tests for spherre-deploy.
//!
//! Every test runs the orchestrator against an in-process `LocalChain` and a
//! throwaway deployments directory, so no network is required.
//! Run with: cargo test --test integration_test

use spherre_deploy::{
    ArtifactSet, DeployError, DeploymentArtifact, DeploymentPlan, Felt, LocalChain, Orchestrator,
    Registry, RegistryLock, RunContext, RunOptions, RunState, SPHERRE, SPHERRE_ACCOUNT,
    SubmissionMode, WiringStep, wiring::UPDATE_ACCOUNT_CLASS_HASH,
};
use tempdir::TempDir;

const NETWORK: &str = "devnet";

/// Test setup context containing common test infrastructure.
struct TestContext {
    _temp_dir: TempDir,
    ctx: RunContext,
    chain: LocalChain,
    artifacts: ArtifactSet,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new("spherre-it").expect("Failed to create temp dir");
        let deployer: Felt = "0x64b48806902a367c8598f4f95c305e8c1a1acba5f082d294a43793113115691"
            .parse()
            .expect("deployer address");

        let ctx = RunContext::new(NETWORK, deployer, temp_dir.path().join("deployments"));
        let chain = LocalChain::new(deployer);
        let artifacts = ArtifactSet::new()
            .with_class(SPHERRE, serde_json::json!({ "sierra_program": ["0x1", "0x2"] }))
            .with_class(SPHERRE_ACCOUNT, serde_json::json!({ "sierra_program": ["0x3"] }));

        Self {
            _temp_dir: temp_dir,
            ctx,
            chain,
            artifacts,
        }
    }

    fn plan(&self) -> DeploymentPlan {
        DeploymentPlan::spherre_bootstrap(self.ctx.acting_identity, &mut rand::rng())
    }

    fn orchestrator(&self, options: RunOptions) -> Orchestrator<'_, LocalChain, ArtifactSet> {
        Orchestrator::new(self.ctx.clone(), &self.chain, &self.artifacts, options)
    }
}

fn deploying(name: &str) -> RunState {
    RunState::Deploying(name.to_string())
}

#[tokio::test]
async fn test_bootstrap_on_fresh_network() {
    let t = TestContext::new();
    let mut orchestrator = t.orchestrator(RunOptions::default());

    let report = orchestrator.run(&t.plan()).await.expect("Run should succeed");

    assert_eq!(orchestrator.state(), &RunState::Done);
    assert_eq!(
        report.history,
        vec![
            RunState::Idle,
            deploying(SPHERRE),
            deploying(SPHERRE_ACCOUNT),
            RunState::Batching,
            RunState::Exporting,
            RunState::Wiring,
            RunState::Done,
        ]
    );

    // Both deploys travelled in a single batch.
    let attempts = t.chain.batch_attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].len(), 2);

    let persisted = Registry::load(&t.ctx).expect("Failed to load registry");
    assert_eq!(persisted, report.registry, "Exported registry should match the run's state");

    let spherre = persisted.get(SPHERRE).expect("Spherre entry");
    let account = persisted.get(SPHERRE_ACCOUNT).expect("SpherreAccount entry");
    assert_ne!(spherre.class_identifier, account.class_identifier);

    let on_chain = t.chain.contract(&spherre.address).expect("Spherre deployed");
    assert_eq!(
        on_chain.storage.get(UPDATE_ACCOUNT_CLASS_HASH),
        Some(&vec![account.class_identifier]),
        "Spherre should hold the account class hash"
    );

    let account_on_chain = t.chain.contract(&account.address).expect("SpherreAccount deployed");
    assert_eq!(account_on_chain.class_hash, account.class_identifier);

    assert_eq!(t.chain.invocations().len(), 1);
    assert_eq!(t.chain.invocations()[0].target, spherre.address);
}

#[tokio::test]
async fn test_wiring_without_registry_file() {
    let t = TestContext::new();
    let step = WiringStep::new(SPHERRE, SPHERRE_ACCOUNT, UPDATE_ACCOUNT_CLASS_HASH);

    let result = step.wire(&t.ctx, &t.chain).await;

    assert!(
        matches!(result, Err(DeployError::MissingDependency(ref name)) if name == SPHERRE),
        "Expected MissingDependency(Spherre), got {result:?}"
    );
    assert!(t.chain.invocations().is_empty());
}

#[tokio::test]
async fn test_wiring_to_undeployed_contract_aborts() {
    let t = TestContext::new();
    let mut plan = t.plan();
    plan.wiring = WiringStep::new(SPHERRE, "Vault", UPDATE_ACCOUNT_CLASS_HASH);

    let mut orchestrator = t.orchestrator(RunOptions::default());
    let result = orchestrator.run(&plan).await;

    assert!(matches!(result, Err(DeployError::MissingDependency(ref name)) if name == "Vault"));
    assert_eq!(orchestrator.state(), &RunState::Aborted);
    assert!(t.chain.invocations().is_empty(), "No wiring call on failed precondition");
}

#[tokio::test]
async fn test_batch_failure_aborts_before_export() {
    let t = TestContext::new();
    t.chain.fail_next_batches(1);

    let mut orchestrator = t.orchestrator(RunOptions::default());
    let result = orchestrator.run(&t.plan()).await;

    assert!(matches!(result, Err(DeployError::BatchExecutionFailed { calls: 2, .. })));
    assert_eq!(orchestrator.state(), &RunState::Aborted);
    assert_eq!(
        &orchestrator.history()[orchestrator.history().len() - 2..],
        &[RunState::Batching, RunState::Aborted]
    );
    assert!(!t.ctx.registry_path().exists(), "Registry must not be exported");
    assert!(t.chain.invocations().is_empty());
}

#[tokio::test]
async fn test_flush_retry_recovers_from_transient_failure() {
    let t = TestContext::new();
    t.chain.fail_next_batches(1);

    let options = RunOptions {
        flush_retries: 1,
        ..RunOptions::default()
    };
    let mut orchestrator = t.orchestrator(options);
    orchestrator.run(&t.plan()).await.expect("Retry should recover");

    assert_eq!(orchestrator.state(), &RunState::Done);
    let attempts = t.chain.batch_attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0], attempts[1], "Retry should resubmit the identical batch");
}

#[tokio::test]
async fn test_unknown_contract_aborts_before_batching() {
    let mut t = TestContext::new();
    t.artifacts = ArtifactSet::new().with_class(SPHERRE, serde_json::json!({}));

    let mut orchestrator = t.orchestrator(RunOptions::default());
    let result = orchestrator.run(&t.plan()).await;

    assert!(matches!(
        result,
        Err(DeployError::UnknownContract(ref name)) if name == SPHERRE_ACCOUNT
    ));
    assert_eq!(
        orchestrator.history(),
        &[
            RunState::Idle,
            deploying(SPHERRE),
            deploying(SPHERRE_ACCOUNT),
            RunState::Aborted
        ]
    );
    assert!(t.chain.batch_attempts().is_empty());
    assert!(!t.ctx.registry_path().exists());
}

#[tokio::test]
async fn test_immediate_mode_flushes_each_deploy() {
    let t = TestContext::new();
    let options = RunOptions {
        mode: SubmissionMode::Immediate,
        ..RunOptions::default()
    };

    let mut orchestrator = t.orchestrator(options);
    let report = orchestrator.run(&t.plan()).await.expect("Run should succeed");

    let attempts = t.chain.batch_attempts();
    assert_eq!(attempts.len(), 2, "One batch per deploy, empty final flush skipped");
    assert!(attempts.iter().all(|batch| batch.len() == 1));
    assert_eq!(report.registry.len(), 2);
}

#[tokio::test]
async fn test_rerun_overwrites_and_keeps_other_entries() {
    let t = TestContext::new();

    let legacy = DeploymentArtifact {
        name: "Legacy".to_string(),
        address: Felt::from_u64(0x10),
        class_identifier: Felt::from_u64(0x20),
        constructor_args: vec![],
    };
    let mut seeded = Registry::new();
    seeded.record(legacy.clone());
    seeded.export(&t.ctx).expect("Failed to seed registry");

    let first = t
        .orchestrator(RunOptions::default())
        .run(&t.plan())
        .await
        .expect("First run should succeed");
    let second = t
        .orchestrator(RunOptions::default())
        .run(&t.plan())
        .await
        .expect("Second run should succeed");

    let before = first.registry.get(SPHERRE).expect("first Spherre");
    let after = second.registry.get(SPHERRE).expect("second Spherre");
    assert_eq!(before.class_identifier, after.class_identifier, "Class is reused");
    assert_ne!(before.address, after.address, "A redeploy replaces the address");

    let persisted = Registry::load(&t.ctx).expect("Failed to load registry");
    assert_eq!(persisted.get(SPHERRE), Some(after));
    assert_eq!(persisted.get("Legacy"), Some(&legacy), "Untouched entries survive");
    assert_eq!(persisted.len(), 3);
}

#[tokio::test]
async fn test_locked_network_is_rejected() {
    let t = TestContext::new();
    let _held = RegistryLock::acquire(&t.ctx).expect("Failed to take lock");

    let mut orchestrator = t.orchestrator(RunOptions::default());
    let result = orchestrator.run(&t.plan()).await;

    assert!(matches!(result, Err(DeployError::RegistryLocked { .. })));
    assert_eq!(orchestrator.history(), &[RunState::Idle, RunState::Aborted]);
    assert!(t.chain.batch_attempts().is_empty());
}

#[tokio::test]
async fn test_corrupt_registry_aborts() {
    let t = TestContext::new();
    std::fs::create_dir_all(&t.ctx.deployments_dir).expect("Failed to create dir");
    std::fs::write(t.ctx.registry_path(), "[not, a registry").expect("Failed to write file");

    let mut orchestrator = t.orchestrator(RunOptions::default());
    let result = orchestrator.run(&t.plan()).await;

    assert!(matches!(result, Err(DeployError::CorruptRegistry { .. })));
    assert_eq!(orchestrator.state(), &RunState::Aborted);
    assert!(t.chain.batch_attempts().is_empty());
}

#[tokio::test]
async fn test_fixed_salt_is_deterministic() {
    let t = TestContext::new();
    let other = TestContext::new();
    let options = RunOptions {
        salt: Some(Felt::from_u64(7)),
        ..RunOptions::default()
    };
    let plan = t.plan();

    let a = t.orchestrator(options.clone()).run(&plan).await.expect("run a");
    let b = other.orchestrator(options).run(&plan).await.expect("run b");

    assert_eq!(a.registry.get(SPHERRE), b.registry.get(SPHERRE));
    assert_eq!(a.registry.get(SPHERRE_ACCOUNT), b.registry.get(SPHERRE_ACCOUNT));
}

#[tokio::test]
async fn test_finished_orchestrator_refuses_second_run() {
    let t = TestContext::new();
    let plan = t.plan();
    let mut orchestrator = t.orchestrator(RunOptions::default());

    orchestrator.run(&plan).await.expect("First run should succeed");
    let history = orchestrator.history().to_vec();

    let result = orchestrator.run(&plan).await;

    assert!(
        matches!(result, Err(DeployError::RunFinished { ref state }) if state == "done"),
        "Expected RunFinished, got {result:?}"
    );
    assert_eq!(orchestrator.state(), &RunState::Done, "Terminal state must not change");
    assert_eq!(orchestrator.history(), history.as_slice());
    assert_eq!(t.chain.batch_attempts().len(), 1, "No second batch");
    assert_eq!(t.chain.invocations().len(), 1, "No second wiring call");
    assert_eq!(orchestrator.context(), &t.ctx);
}

#[tokio::test]
async fn test_aborted_orchestrator_refuses_second_run() {
    let t = TestContext::new();
    t.chain.fail_next_batches(1);
    let plan = t.plan();
    let mut orchestrator = t.orchestrator(RunOptions::default());

    assert!(orchestrator.run(&plan).await.is_err());
    assert!(orchestrator.state().is_terminal());

    let result = orchestrator.run(&plan).await;

    assert!(matches!(result, Err(DeployError::RunFinished { ref state }) if state == "aborted"));
    assert_eq!(t.chain.batch_attempts().len(), 1, "Aborted run must not be resubmitted");
}

#[tokio::test]
async fn test_rejected_wiring_call_aborts_after_export() {
    let t = TestContext::new();
    t.chain.fail_next_invokes(1);

    let mut orchestrator = t.orchestrator(RunOptions::default());
    let result = orchestrator.run(&t.plan()).await;

    assert!(
        matches!(
            result,
            Err(DeployError::WiringFailed { ref dependent, .. }) if dependent == SPHERRE
        ),
        "Expected WiringFailed, got {result:?}"
    );
    assert_eq!(
        &orchestrator.history()[orchestrator.history().len() - 2..],
        &[RunState::Wiring, RunState::Aborted]
    );

    // Deploys are not rolled back: the registry was exported before wiring.
    let persisted = Registry::load(&t.ctx).expect("Failed to load registry");
    assert_eq!(persisted.len(), 2);
    assert_eq!(t.chain.invocations().len(), 1);

    let spherre = persisted.get(SPHERRE).expect("Spherre entry");
    let on_chain = t.chain.contract(&spherre.address).expect("Spherre deployed");
    assert!(on_chain.storage.get(UPDATE_ACCOUNT_CLASS_HASH).is_none());
}
