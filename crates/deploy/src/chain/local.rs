//! In-process development chain.
//!
//! Class hashes and addresses are SHA-256 digests truncated to 251 bits, so a
//! given class, salt and calldata always land at the same address. Batches are
//! applied to a copy of the state and committed only if every call succeeds.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{ChainClient, PendingCall, PreparedDeploy, Receipt};
use crate::{ContractClass, Felt};

const CONTRACT_ADDRESS_PREFIX: &[u8] = b"STARKNET_CONTRACT_ADDRESS";
const TRANSACTION_PREFIX: &[u8] = b"invoke";

/// A contract instance living on the local chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContract {
    pub class_hash: Felt,
    pub constructor_calldata: Vec<Felt>,
    /// Last calldata received per entrypoint.
    #[serde(default)]
    pub storage: BTreeMap<String, Vec<Felt>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ChainState {
    /// Class hash -> contract name.
    declared: BTreeMap<Felt, String>,
    contracts: BTreeMap<Felt, DeployedContract>,
    nonce: u64,
}

/// Submission history and fault injection. Never persisted.
#[derive(Debug, Default)]
struct Journal {
    batch_attempts: Vec<Vec<PendingCall>>,
    invocations: Vec<PendingCall>,
    failing_batches: usize,
    failing_invokes: usize,
}

#[derive(Debug, Default)]
struct Inner {
    state: ChainState,
    journal: Journal,
}

/// An in-memory chain acting as a single account.
///
/// Cloning yields a handle to the same chain.
#[derive(Debug, Clone)]
pub struct LocalChain {
    account: Felt,
    inner: Arc<Mutex<Inner>>,
}

impl LocalChain {
    pub fn new(account: Felt) -> Self {
        Self {
            account,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Restore a chain from a state file, or start empty if it does not exist.
    pub fn load_or_new(account: Felt, path: &Path) -> Result<Self> {
        let chain = Self::new(account);
        if !path.exists() {
            tracing::info!(path = %path.display(), "No local chain state found, starting fresh");
            return Ok(chain);
        }

        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read chain state from {}", path.display()))?;
        let state: ChainState =
            serde_json::from_str(&content).context("Failed to parse chain state JSON")?;

        tracing::info!(
            path = %path.display(),
            classes = state.declared.len(),
            contracts = state.contracts.len(),
            "Local chain state loaded"
        );
        chain.lock().state = state;
        Ok(chain)
    }

    /// Save the chain state so a later run can resume from it.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.lock().state)
            .context("Failed to serialize chain state")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, json)
            .context(format!("Failed to write chain state to {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Local chain state saved");
        Ok(())
    }

    pub fn account(&self) -> Felt {
        self.account
    }

    /// Make the next `count` batch submissions fail before touching state.
    pub fn fail_next_batches(&self, count: usize) {
        self.lock().journal.failing_batches = count;
    }

    /// Make the next `count` single invocations fail before touching state.
    pub fn fail_next_invokes(&self, count: usize) {
        self.lock().journal.failing_invokes = count;
    }

    /// Every batch submitted so far, failed attempts included.
    pub fn batch_attempts(&self) -> Vec<Vec<PendingCall>> {
        self.lock().journal.batch_attempts.clone()
    }

    /// Every single invocation submitted so far, failed attempts included.
    pub fn invocations(&self) -> Vec<PendingCall> {
        self.lock().journal.invocations.clone()
    }

    pub fn is_declared(&self, class_hash: &Felt) -> bool {
        self.lock().state.declared.contains_key(class_hash)
    }

    pub fn contract(&self, address: &Felt) -> Option<DeployedContract> {
        self.lock().state.contracts.get(address).cloned()
    }

    /// Class hash of a compiled class on this chain.
    pub fn class_hash_of(class: &ContractClass) -> Result<Felt> {
        let bytes = serde_json::to_vec(&class.sierra).context("Failed to serialize Sierra class")?;
        Ok(Felt::from_be_bytes_truncated(Sha256::digest(&bytes).into()))
    }

    /// Address of a contract deployed by this chain's account.
    pub fn contract_address(&self, class_hash: Felt, salt: Felt, calldata: &[Felt]) -> Felt {
        let head = [self.account, salt, class_hash];
        hash_felts(CONTRACT_ADDRESS_PREFIX, head.iter().chain(calldata))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, state: &mut ChainState, call: &PendingCall) -> Result<Option<Felt>> {
        if call.is_deploy() {
            return self.apply_deploy(state, &call.calldata).map(Some);
        }

        let contract = state
            .contracts
            .get_mut(&call.target)
            .with_context(|| format!("No contract deployed at {}", call.target))?;
        contract
            .storage
            .insert(call.entrypoint.clone(), call.calldata.clone());
        Ok(None)
    }

    fn apply_deploy(&self, state: &mut ChainState, calldata: &[Felt]) -> Result<Felt> {
        let [class_hash, salt, _unique, len, args @ ..] = calldata else {
            anyhow::bail!("Malformed deploy calldata: {} word(s)", calldata.len());
        };

        if u64::try_from(**len).ok() != Some(args.len() as u64) {
            anyhow::bail!(
                "Constructor calldata length mismatch: declared {}, got {}",
                len,
                args.len()
            );
        }

        if !state.declared.contains_key(class_hash) {
            anyhow::bail!("Class {} is not declared", class_hash);
        }

        let address = self.contract_address(*class_hash, *salt, args);
        if state.contracts.contains_key(&address) {
            anyhow::bail!("A contract is already deployed at {}", address);
        }

        state.contracts.insert(
            address,
            DeployedContract {
                class_hash: *class_hash,
                constructor_calldata: args.to_vec(),
                storage: BTreeMap::new(),
            },
        );
        Ok(address)
    }

    fn transaction_hash(&self, nonce: u64, calls: &[PendingCall]) -> Felt {
        let mut words = vec![self.account, Felt::from_u64(nonce)];
        for call in calls {
            words.push(call.target);
            words.extend_from_slice(&call.calldata);
        }
        hash_felts(TRANSACTION_PREFIX, words.iter())
    }

    /// Apply `calls` atomically and return one receipt per call.
    fn submit(&self, calls: &[PendingCall]) -> Result<Vec<Receipt>> {
        let mut inner = self.lock();
        let mut next = inner.state.clone();

        let mut deployed = Vec::with_capacity(calls.len());
        for (index, call) in calls.iter().enumerate() {
            let address = self.apply(&mut next, call).with_context(|| {
                format!("Call #{} to {}::{} reverted", index, call.target, call.entrypoint)
            })?;
            deployed.push(address);
        }

        next.nonce += 1;
        let transaction_hash = self.transaction_hash(next.nonce, calls);
        inner.state = next;

        Ok(deployed
            .into_iter()
            .map(|deployed_address| Receipt {
                transaction_hash,
                deployed_address,
            })
            .collect())
    }
}

fn hash_felts<'a>(prefix: &[u8], felts: impl Iterator<Item = &'a Felt>) -> Felt {
    let mut hasher = Sha256::new();
    hasher.update(prefix);
    for felt in felts {
        hasher.update(felt.to_be_bytes());
    }
    Felt::from_be_bytes_truncated(hasher.finalize().into())
}

impl ChainClient for LocalChain {
    async fn declare(&self, class: &ContractClass) -> Result<Felt> {
        let class_hash = Self::class_hash_of(class)?;
        let mut inner = self.lock();

        if inner.state.declared.contains_key(&class_hash) {
            tracing::debug!(
                contract = %class.name,
                class_hash = %class_hash,
                "Class already declared"
            );
            return Ok(class_hash);
        }

        inner.state.declared.insert(class_hash, class.name.clone());
        inner.state.nonce += 1;
        tracing::debug!(contract = %class.name, class_hash = %class_hash, "Class declared");
        Ok(class_hash)
    }

    async fn deploy_call(
        &self,
        class_hash: Felt,
        constructor_calldata: &[Felt],
        salt: Felt,
    ) -> Result<PreparedDeploy> {
        Ok(PreparedDeploy {
            call: PendingCall::deploy_via_udc(class_hash, salt, constructor_calldata),
            address: self.contract_address(class_hash, salt, constructor_calldata),
        })
    }

    async fn execute_batch(&self, calls: &[PendingCall]) -> Result<Vec<Receipt>> {
        {
            let mut inner = self.lock();
            inner.journal.batch_attempts.push(calls.to_vec());
            if inner.journal.failing_batches > 0 {
                inner.journal.failing_batches -= 1;
                anyhow::bail!("Batch rejected by local chain (injected failure)");
            }
        }

        self.submit(calls)
    }

    async fn invoke(&self, call: &PendingCall) -> Result<Receipt> {
        {
            let mut inner = self.lock();
            inner.journal.invocations.push(call.clone());
            if inner.journal.failing_invokes > 0 {
                inner.journal.failing_invokes -= 1;
                anyhow::bail!("Invocation rejected by local chain (injected failure)");
            }
        }

        let mut receipts = self.submit(std::slice::from_ref(call))?;
        receipts
            .pop()
            .context("Local chain returned no receipt for invocation")
    }
}
