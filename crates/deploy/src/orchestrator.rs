//! Drives a full deployment run.
//!
//! The run is strictly linear:
//! `Idle -> Deploying(..) -> Batching -> Exporting -> Wiring -> Done`.
//! Any failure moves the run to `Aborted` and is returned to the caller; nothing
//! already submitted is rolled back.

use std::{fmt, path::PathBuf, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};

use crate::{
    ArtifactSource, DeploymentPlan, Felt, Registry, RunContext,
    accumulator::CallAccumulator,
    chain::{ChainClient, Receipt},
    error::{DeployError, DeployResult},
    executor::{DeploymentExecutor, SubmissionMode},
    registry::RegistryLock,
};

/// Delay before the first batch resubmission.
const FLUSH_RETRY_MIN_DELAY: Duration = Duration::from_millis(500);

/// Where a run stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Deploying(String),
    Batching,
    Exporting,
    Wiring,
    Done,
    Aborted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Deploying(contract) => write!(f, "deploying {contract}"),
            RunState::Batching => f.write_str("batching"),
            RunState::Exporting => f.write_str("exporting"),
            RunState::Wiring => f.write_str("wiring"),
            RunState::Done => f.write_str("done"),
            RunState::Aborted => f.write_str("aborted"),
        }
    }
}

/// Knobs for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub mode: SubmissionMode,
    /// Extra attempts for a failed batch flush. Zero means fail on first error.
    pub flush_retries: usize,
    /// Fixed deployment salt. Random per contract when unset.
    pub salt: Option<Felt>,
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub registry: Registry,
    pub registry_path: PathBuf,
    pub wiring_receipt: Receipt,
    pub history: Vec<RunState>,
}

/// Owns the registry for the duration of a run and sequences every step.
pub struct Orchestrator<'a, C, A> {
    ctx: RunContext,
    client: &'a C,
    artifacts: &'a A,
    options: RunOptions,
    state: RunState,
    history: Vec<RunState>,
}

impl<'a, C, A> Orchestrator<'a, C, A>
where
    C: ChainClient,
    A: ArtifactSource,
{
    pub fn new(ctx: RunContext, client: &'a C, artifacts: &'a A, options: RunOptions) -> Self {
        Self {
            ctx,
            client,
            artifacts,
            options,
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Every state the run went through, in order.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = %self.state, to = %next, "Run state transition");
        self.history.push(next.clone());
        self.state = next;
    }

    /// Execute `plan` end to end.
    ///
    /// A run is one-shot: once the orchestrator has left `Idle`, further calls
    /// fail with [`DeployError::RunFinished`] and touch neither the chain nor
    /// the registry.
    pub async fn run(&mut self, plan: &DeploymentPlan) -> DeployResult<RunReport> {
        if self.state != RunState::Idle {
            tracing::error!(state = %self.state, "Orchestrator reused, refusing to run again");
            return Err(DeployError::RunFinished {
                state: self.state.to_string(),
            });
        }

        tracing::info!(
            network = %self.ctx.network,
            account = %self.ctx.acting_identity,
            mode = %self.options.mode,
            contracts = plan.contracts.len(),
            "Starting deployment run..."
        );

        match self.execute(plan).await {
            Ok(report) => {
                tracing::info!(network = %self.ctx.network, "All setup done");
                Ok(report)
            }
            Err(err) => {
                tracing::error!(state = %self.state, error = %err, "Deployment run aborted");
                self.transition(RunState::Aborted);
                Err(err)
            }
        }
    }

    async fn execute(&mut self, plan: &DeploymentPlan) -> DeployResult<RunReport> {
        let _lock = RegistryLock::acquire(&self.ctx)?;
        let mut registry = Registry::load(&self.ctx)?;
        if !registry.is_empty() {
            tracing::info!(entries = registry.len(), "Loaded existing registry");
        }

        let mut accumulator = CallAccumulator::new();
        let mut executor = DeploymentExecutor::new(self.client, self.artifacts, self.options.mode)
            .with_salt(self.options.salt);

        for contract in &plan.contracts {
            self.transition(RunState::Deploying(contract.name.clone()));
            tracing::info!(contract = %contract.name, "Deploying contract...");

            executor
                .deploy(
                    &mut accumulator,
                    &mut registry,
                    &contract.name,
                    contract.constructor_args.clone(),
                )
                .await?;
        }

        self.transition(RunState::Batching);
        let receipts = self.flush_with_retry(&mut accumulator).await?;
        executor.settle(&receipts)?;

        self.transition(RunState::Exporting);
        let registry_path = registry.export(&self.ctx)?;

        self.transition(RunState::Wiring);
        let wiring_receipt = plan.wiring.wire(&self.ctx, self.client).await?;

        self.transition(RunState::Done);

        Ok(RunReport {
            registry,
            registry_path,
            wiring_receipt,
            history: self.history.clone(),
        })
    }

    /// Flush the accumulator, resubmitting the identical batch up to
    /// `flush_retries` more times.
    async fn flush_with_retry(
        &self,
        accumulator: &mut CallAccumulator,
    ) -> DeployResult<Vec<Receipt>> {
        let client = self.client;
        let pending = &*accumulator;

        let backoff = ExponentialBuilder::default()
            .with_min_delay(FLUSH_RETRY_MIN_DELAY)
            .with_max_times(self.options.flush_retries);

        let receipts = (move || pending.submit(client))
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .notify(|err: &DeployError, dur: Duration| {
                tracing::warn!(
                    error = %err,
                    retry_in = ?dur,
                    "Batch execution failed, retrying..."
                );
            })
            .await?;

        accumulator.clear();
        Ok(receipts)
    }
}
