//! Run-wide configuration threaded through every component.

use std::path::{Path, PathBuf};

use crate::Felt;

/// Suffix of the registry file exported for each network.
pub const REGISTRY_FILE_SUFFIX: &str = "_latest.json";

/// The network a run targets and the identity it acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Logical network name. Keys the registry file.
    pub network: String,
    /// Address of the account that declares, deploys and invokes.
    pub acting_identity: Felt,
    /// Directory holding the per-network registry files.
    pub deployments_dir: PathBuf,
}

impl RunContext {
    pub fn new(
        network: impl Into<String>,
        acting_identity: Felt,
        deployments_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            network: network.into(),
            acting_identity,
            deployments_dir: deployments_dir.into(),
        }
    }

    /// `<deployments_dir>/<network>_latest.json`
    pub fn registry_path(&self) -> PathBuf {
        self.deployments_dir
            .join(format!("{}{}", self.network, REGISTRY_FILE_SUFFIX))
    }

    /// `<deployments_dir>/<network>.lock`
    pub fn lock_path(&self) -> PathBuf {
        self.deployments_dir.join(format!("{}.lock", self.network))
    }

    pub fn deployments_dir(&self) -> &Path {
        &self.deployments_dir
    }
}
