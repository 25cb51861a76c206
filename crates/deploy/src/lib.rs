//! spherre-deploy - Deployment library for the Spherre contracts.
//!
//! This crate declares and deploys the Spherre factory and its account class,
//! persists the resulting addresses and class hashes to a per-network registry,
//! and wires the account class hash into the factory once both exist.

pub mod accumulator;
mod artifact;
mod calldata;
pub mod chain;
mod context;
mod error;
pub mod executor;
mod felt;
pub mod orchestrator;
mod plan;
pub mod registry;
pub mod wiring;

pub use accumulator::CallAccumulator;
pub use artifact::{ArtifactDir, ArtifactSet, ArtifactSource, ContractClass};
pub use calldata::{ArgValue, ConstructorArg, encode_constructor_args};
pub use chain::{ChainClient, LocalChain, PendingCall, PreparedDeploy, Receipt};
pub use context::RunContext;
pub use error::{DeployError, DeployResult};
pub use executor::{DeploymentExecutor, SubmissionMode};
pub use felt::{FELT_PRIME, Felt, FeltError};
pub use orchestrator::{Orchestrator, RunOptions, RunReport, RunState};
pub use plan::{ContractSpec, DeploymentPlan, SPHERRE, SPHERRE_ACCOUNT};
pub use registry::{DeploymentArtifact, Registry, RegistryLock};
pub use wiring::WiringStep;
