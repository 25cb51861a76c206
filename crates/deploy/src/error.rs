//! Error taxonomy for a deployment run.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for deployment operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Every failure a deployment run can surface.
///
/// Chain-client causes are carried as [`anyhow::Error`] and rendered with their
/// full context chain.
#[derive(Error, Debug)]
pub enum DeployError {
    /// The artifact source has no compiled class for this contract.
    #[error("unknown contract '{0}': no compiled class found")]
    UnknownContract(String),

    /// A compiled class file exists but could not be parsed.
    #[error("invalid artifact for '{contract}' at {path}")]
    InvalidArtifact {
        contract: String,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The chain client rejected the declaration.
    #[error("declaration of '{contract}' failed: {cause:#}")]
    DeclarationFailed {
        contract: String,
        cause: anyhow::Error,
    },

    /// The chain client rejected the deployment, or the deployed address did
    /// not match the precomputed one.
    #[error("deployment of '{contract}' failed: {cause:#}")]
    DeploymentFailed {
        contract: String,
        cause: anyhow::Error,
    },

    /// Submission of the buffered batch failed as a whole.
    #[error("batch of {calls} call(s) failed: {cause:#}")]
    BatchExecutionFailed { calls: usize, cause: anyhow::Error },

    /// The persisted registry could not be parsed.
    #[error("corrupt registry at {path}")]
    CorruptRegistry {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing a file failed.
    #[error("I/O failed at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another run holds the registry lock for this network.
    #[error("registry is locked by another run: {path}")]
    RegistryLocked { path: PathBuf },

    /// The wiring step could not find a contract in the registry.
    #[error("missing dependency '{0}' in registry")]
    MissingDependency(String),

    /// `run` was called on an orchestrator that already left `Idle`.
    #[error("orchestrator has already run (state: {state})")]
    RunFinished { state: String },

    /// The wiring call was rejected by the chain client.
    #[error("wiring '{dependent}' failed: {cause:#}")]
    WiringFailed {
        dependent: String,
        cause: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_cause_is_rendered_with_context() {
        let cause = anyhow::anyhow!("nonce too low").context("submitting batch");
        let err = DeployError::BatchExecutionFailed { calls: 2, cause };

        assert_eq!(
            err.to_string(),
            "batch of 2 call(s) failed: submitting batch: nonce too low"
        );
    }

    #[test]
    fn test_missing_dependency_names_contract() {
        let err = DeployError::MissingDependency("Spherre".to_string());
        assert!(err.to_string().contains("'Spherre'"));
    }
}
