//! Chain client seam.
//!
//! The orchestrator never talks to a network directly; it goes through a
//! [`ChainClient`]. Signing, fee estimation and transport belong to the
//! implementation.

use std::future::Future;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{ContractClass, Felt};

mod local;
pub use local::{DeployedContract, LocalChain};

/// Address of the universal deployer contract
/// (`0x41a78e741e5af2fec34b695679bc6891742439f7afb8484ecd7766661ad02bf`).
pub const UDC_ADDRESS: Felt = Felt::from_raw_limbs([
    0xecd7_7666_61ad_02bf,
    0x1742_439f_7afb_8484,
    0xec34_b695_679b_c689,
    0x041a_78e7_41e5_af2f,
]);

/// Entrypoint of the universal deployer.
pub const UDC_ENTRYPOINT: &str = "deployContract";

/// A chain-mutating call that has not been submitted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCall {
    pub target: Felt,
    pub entrypoint: String,
    pub calldata: Vec<Felt>,
}

impl PendingCall {
    pub fn new(target: Felt, entrypoint: impl Into<String>, calldata: Vec<Felt>) -> Self {
        Self {
            target,
            entrypoint: entrypoint.into(),
            calldata,
        }
    }

    /// A universal deployer call: `[class_hash, salt, unique, len, args..]`.
    pub fn deploy_via_udc(class_hash: Felt, salt: Felt, constructor_calldata: &[Felt]) -> Self {
        let mut calldata = Vec::with_capacity(constructor_calldata.len() + 4);
        calldata.push(class_hash);
        calldata.push(salt);
        calldata.push(Felt::ZERO);
        calldata.push(Felt::from_u64(constructor_calldata.len() as u64));
        calldata.extend_from_slice(constructor_calldata);

        Self::new(UDC_ADDRESS, UDC_ENTRYPOINT, calldata)
    }

    pub fn is_deploy(&self) -> bool {
        self.target == UDC_ADDRESS && self.entrypoint == UDC_ENTRYPOINT
    }
}

/// Outcome of one submitted call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: Felt,
    /// Set for deploy-type calls.
    pub deployed_address: Option<Felt>,
}

/// A deploy-type call together with the address it will deploy to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedDeploy {
    pub call: PendingCall,
    pub address: Felt,
}

/// Everything the orchestrator needs from a chain.
///
/// Errors are client-defined and surface wrapped in the matching
/// [`DeployError`](crate::DeployError) variant.
pub trait ChainClient: Send + Sync {
    /// Declare a class and return its class hash.
    ///
    /// Declaring an already-declared class must succeed and return the same hash.
    fn declare(&self, class: &ContractClass) -> impl Future<Output = Result<Felt>> + Send;

    /// Build the call deploying `class_hash` with `constructor_calldata`, and
    /// precompute the resulting address.
    fn deploy_call(
        &self,
        class_hash: Felt,
        constructor_calldata: &[Felt],
        salt: Felt,
    ) -> impl Future<Output = Result<PreparedDeploy>> + Send;

    /// Submit calls as one ordered, all-or-nothing batch.
    ///
    /// Returns one receipt per call, in submission order.
    fn execute_batch(
        &self,
        calls: &[PendingCall],
    ) -> impl Future<Output = Result<Vec<Receipt>>> + Send;

    /// Submit a single call.
    fn invoke(&self, call: &PendingCall) -> impl Future<Output = Result<Receipt>> + Send;
}
