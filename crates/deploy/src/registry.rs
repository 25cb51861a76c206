//! Per-network deployment registry.
//!
//! The registry is a JSON object keyed by contract name, persisted at
//! `<deployments_dir>/<network>_latest.json`. It is loaded once at the start of
//! a run and exported once after the batch has executed.

use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use fs2::FileExt;
use serde::{Deserialize, Serialize, de};

use crate::{
    ConstructorArg, Felt, RunContext,
    error::{DeployError, DeployResult},
};

/// What a successful deployment leaves behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentArtifact {
    /// Logical contract name, unique within a network.
    #[serde(rename = "contract", alias = "name")]
    pub name: String,
    pub address: Felt,
    #[serde(rename = "classHash", alias = "classIdentifier")]
    pub class_identifier: Felt,
    #[serde(default)]
    pub constructor_args: Vec<ConstructorArg>,
}

/// In-memory view of a network's registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    entries: BTreeMap<String, DeploymentArtifact>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the registry for the context's network.
    ///
    /// A missing file yields an empty registry.
    pub fn load(ctx: &RunContext) -> DeployResult<Self> {
        Self::load_from_file(&ctx.registry_path())
    }

    pub fn load_from_file(path: &Path) -> DeployResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No registry found, starting empty");
            return Ok(Self::new());
        }

        let content = std::fs::read(path).map_err(|source| DeployError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let corrupt = |source: serde_json::Error| DeployError::CorruptRegistry {
            path: path.to_path_buf(),
            source,
        };

        let entries: BTreeMap<String, DeploymentArtifact> =
            serde_json::from_slice(&content).map_err(corrupt)?;

        // Entries are keyed by the contract name they record.
        if let Some((key, artifact)) = entries.iter().find(|(key, a)| **key != a.name) {
            return Err(corrupt(de::Error::custom(format!(
                "entry '{key}' records contract '{}'",
                artifact.name
            ))));
        }

        tracing::debug!(path = %path.display(), entries = entries.len(), "Registry loaded");
        Ok(Self { entries })
    }

    /// Insert or replace the entry for `artifact.name`.
    ///
    /// The whole entry is replaced; the previous one is returned.
    pub fn record(&mut self, artifact: DeploymentArtifact) -> Option<DeploymentArtifact> {
        let previous = self.entries.insert(artifact.name.clone(), artifact);
        if let Some(previous) = &previous {
            tracing::warn!(
                contract = %previous.name,
                previous_address = %previous.address,
                "Overwriting existing registry entry"
            );
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&DeploymentArtifact> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Artifacts sorted by contract name.
    pub fn iter(&self) -> impl Iterator<Item = &DeploymentArtifact> {
        self.entries.values()
    }

    /// Write the full registry for the context's network, replacing any prior
    /// export. Returns the path written.
    pub fn export(&self, ctx: &RunContext) -> DeployResult<PathBuf> {
        let path = ctx.registry_path();
        self.export_to_file(&path)?;
        Ok(path)
    }

    /// Atomically replace `path` with the serialized registry.
    ///
    /// The content goes to a temporary sibling first and is renamed over the
    /// target, so readers see either the old or the new file.
    pub fn export_to_file(&self, path: &Path) -> DeployResult<()> {
        let io_err = |source: std::io::Error| DeployError::Io {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let content = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| io_err(std::io::Error::other(e)))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        tracing::info!(path = %path.display(), entries = self.entries.len(), "Registry exported");
        Ok(())
    }
}

/// Exclusive advisory lock on a network's registry, held for a whole run.
///
/// Released when dropped.
#[derive(Debug)]
pub struct RegistryLock {
    file: File,
    path: PathBuf,
}

impl RegistryLock {
    /// Take the lock without blocking. Fails with
    /// [`DeployError::RegistryLocked`] if another run holds it.
    pub fn acquire(ctx: &RunContext) -> DeployResult<Self> {
        let path = ctx.lock_path();
        let io_err = |source: std::io::Error| DeployError::Io {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(ctx.deployments_dir()).map_err(io_err)?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(io_err)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(DeployError::RegistryLocked { path: path.clone() });
            }
            return Err(io_err(e));
        }

        tracing::debug!(path = %path.display(), "Registry lock acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(
                err = %e,
                path = %self.path.display(),
                "Failed to release registry lock"
            );
        }
    }
}
