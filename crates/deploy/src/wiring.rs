//! Post-deploy wiring: tell one deployed contract about another's class hash.

use serde::{Deserialize, Serialize};

use crate::{
    Registry, RunContext,
    chain::{ChainClient, PendingCall, Receipt},
    error::{DeployError, DeployResult},
};

/// Entrypoint Spherre exposes to learn the account class it deploys.
pub const UPDATE_ACCOUNT_CLASS_HASH: &str = "update_account_class_hash";

/// Inject `dependency`'s class hash into the already-deployed `dependent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringStep {
    pub dependent: String,
    pub dependency: String,
    pub entrypoint: String,
}

impl WiringStep {
    pub fn new(
        dependent: impl Into<String>,
        dependency: impl Into<String>,
        entrypoint: impl Into<String>,
    ) -> Self {
        Self {
            dependent: dependent.into(),
            dependency: dependency.into(),
            entrypoint: entrypoint.into(),
        }
    }

    /// Build the wiring call from a registry.
    ///
    /// Fails with [`DeployError::MissingDependency`] naming the first absent
    /// contract, dependent first.
    pub fn call(&self, registry: &Registry) -> DeployResult<PendingCall> {
        let dependent = registry
            .get(&self.dependent)
            .ok_or_else(|| DeployError::MissingDependency(self.dependent.clone()))?;
        let dependency = registry
            .get(&self.dependency)
            .ok_or_else(|| DeployError::MissingDependency(self.dependency.clone()))?;

        Ok(PendingCall::new(
            dependent.address,
            self.entrypoint.clone(),
            vec![dependency.class_identifier],
        ))
    }

    /// Re-read the exported registry and submit the wiring call directly.
    ///
    /// No chain call is made when the precondition fails.
    pub async fn wire<C: ChainClient>(
        &self,
        ctx: &RunContext,
        client: &C,
    ) -> DeployResult<Receipt> {
        let registry = Registry::load(ctx)?;
        let call = self.call(&registry)?;

        tracing::info!(
            dependent = %self.dependent,
            dependency = %self.dependency,
            entrypoint = %self.entrypoint,
            class_hash = ?call.calldata.first(),
            "Wiring contracts..."
        );

        let receipt = client
            .invoke(&call)
            .await
            .map_err(|cause| DeployError::WiringFailed {
                dependent: self.dependent.clone(),
                cause,
            })?;

        tracing::info!(
            dependent = %self.dependent,
            tx_hash = %receipt.transaction_hash,
            "Wiring call executed"
        );
        Ok(receipt)
    }
}
