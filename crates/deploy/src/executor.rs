//! Declare-and-deploy step for a single contract.

use serde::{Deserialize, Serialize};

use crate::{
    ArtifactSource, ConstructorArg, DeploymentArtifact, Felt, Registry,
    accumulator::CallAccumulator,
    calldata::encode_constructor_args,
    chain::{ChainClient, Receipt},
    error::{DeployError, DeployResult},
};

/// When deploy calls reach the chain.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SubmissionMode {
    /// Deploy calls wait in the accumulator for the orchestrator's flush.
    #[default]
    Batched,
    /// Each deploy call is flushed as soon as it is enqueued.
    Immediate,
}

/// A deploy call still sitting in the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredDeploy {
    pub contract: String,
    /// Position of the call in the pending batch.
    pub call_index: usize,
    /// Address the artifact was recorded with.
    pub address: Felt,
}

/// Performs declare + deploy for one contract at a time and records the
/// resulting artifact.
pub struct DeploymentExecutor<'a, C, A> {
    client: &'a C,
    artifacts: &'a A,
    mode: SubmissionMode,
    salt: Option<Felt>,
    deferred: Vec<DeferredDeploy>,
}

impl<'a, C, A> DeploymentExecutor<'a, C, A>
where
    C: ChainClient,
    A: ArtifactSource,
{
    pub fn new(client: &'a C, artifacts: &'a A, mode: SubmissionMode) -> Self {
        Self {
            client,
            artifacts,
            mode,
            salt: None,
            deferred: Vec::new(),
        }
    }

    /// Use a fixed salt instead of a random one per deployment.
    pub fn with_salt(mut self, salt: Option<Felt>) -> Self {
        self.salt = salt;
        self
    }

    pub fn mode(&self) -> SubmissionMode {
        self.mode
    }

    /// Declare `contract` if needed, enqueue its deploy call and record the
    /// artifact.
    ///
    /// In [`SubmissionMode::Batched`] the returned address is the precomputed
    /// one and only becomes real once the batch is flushed; the deploy is
    /// tracked in [`Self::deferred`] until then.
    pub async fn deploy(
        &mut self,
        accumulator: &mut CallAccumulator,
        registry: &mut Registry,
        contract: &str,
        constructor_args: Vec<ConstructorArg>,
    ) -> DeployResult<DeploymentArtifact> {
        let class = self.artifacts.load(contract)?;

        let class_hash =
            self.client
                .declare(&class)
                .await
                .map_err(|cause| DeployError::DeclarationFailed {
                    contract: contract.to_string(),
                    cause,
                })?;
        tracing::info!(contract, class_hash = %class_hash, "Class declared");

        let deployment_failed = |cause: anyhow::Error| DeployError::DeploymentFailed {
            contract: contract.to_string(),
            cause,
        };

        let calldata = encode_constructor_args(&constructor_args);
        let salt = self
            .salt
            .unwrap_or_else(|| Felt::random(&mut rand::rng()));

        let prepared = self
            .client
            .deploy_call(class_hash, &calldata, salt)
            .await
            .map_err(deployment_failed)?;

        let call_index = accumulator.enqueue(prepared.call);

        match self.mode {
            SubmissionMode::Immediate => {
                let receipts = accumulator
                    .flush(self.client)
                    .await
                    .map_err(|e| deployment_failed(anyhow::Error::new(e)))?;
                check_deployed_address(contract, prepared.address, receipts.get(call_index))?;
            }
            SubmissionMode::Batched => {
                self.deferred.push(DeferredDeploy {
                    contract: contract.to_string(),
                    call_index,
                    address: prepared.address,
                });
            }
        }

        let artifact = DeploymentArtifact {
            name: contract.to_string(),
            address: prepared.address,
            class_identifier: class_hash,
            constructor_args,
        };
        registry.record(artifact.clone());

        tracing::info!(
            contract,
            address = %artifact.address,
            mode = %self.mode,
            "Contract deployment recorded"
        );
        Ok(artifact)
    }

    /// Deploys waiting for the next flush.
    pub fn deferred(&self) -> &[DeferredDeploy] {
        &self.deferred
    }

    /// Check the flushed receipts against every deferred deploy and forget
    /// them.
    pub fn settle(&mut self, receipts: &[Receipt]) -> DeployResult<()> {
        for deferred in &self.deferred {
            check_deployed_address(
                &deferred.contract,
                deferred.address,
                receipts.get(deferred.call_index),
            )?;
        }
        self.deferred.clear();
        Ok(())
    }
}

fn check_deployed_address(
    contract: &str,
    expected: Felt,
    receipt: Option<&Receipt>,
) -> DeployResult<()> {
    match receipt.and_then(|r| r.deployed_address) {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(DeployError::DeploymentFailed {
            contract: contract.to_string(),
            cause: anyhow::anyhow!("deployed at {actual}, expected {expected}"),
        }),
        None => Err(DeployError::DeploymentFailed {
            contract: contract.to_string(),
            cause: anyhow::anyhow!("no deployment receipt for expected address {expected}"),
        }),
    }
}
