//! Compiled contract classes.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde_json::Value;

use crate::error::{DeployError, DeployResult};

/// A compiled contract class, ready to be declared.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractClass {
    pub name: String,
    /// The Sierra class as emitted by the compiler.
    pub sierra: Value,
    /// The CASM class, when the build emitted one.
    pub casm: Option<Value>,
}

/// Supplies compiled classes by contract name.
pub trait ArtifactSource {
    /// Fails with [`DeployError::UnknownContract`] if no class exists for `name`.
    fn load(&self, name: &str) -> DeployResult<ContractClass>;
}

/// Reads classes from a Scarb build directory.
///
/// Expects `<dir>/<package>_<Name>.contract_class.json` and optionally
/// `<dir>/<package>_<Name>.compiled_contract_class.json`.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    dir: PathBuf,
    package: String,
}

impl ArtifactDir {
    pub fn new(dir: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            package: package.into(),
        }
    }

    pub fn sierra_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.contract_class.json", self.package, name))
    }

    pub fn casm_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.compiled_contract_class.json", self.package, name))
    }

    fn read_json(name: &str, path: &Path) -> DeployResult<Value> {
        let content = std::fs::read_to_string(path).map_err(|source| DeployError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| DeployError::InvalidArtifact {
            contract: name.to_string(),
            path: path.to_path_buf(),
            source,
        })
    }
}

impl ArtifactSource for ArtifactDir {
    fn load(&self, name: &str) -> DeployResult<ContractClass> {
        let sierra_path = self.sierra_path(name);
        if !sierra_path.exists() {
            tracing::debug!(path = %sierra_path.display(), "Compiled class not found");
            return Err(DeployError::UnknownContract(name.to_string()));
        }

        let sierra = Self::read_json(name, &sierra_path)?;

        let casm_path = self.casm_path(name);
        let casm = if casm_path.exists() {
            Some(Self::read_json(name, &casm_path)?)
        } else {
            None
        };

        tracing::debug!(contract = name, has_casm = casm.is_some(), "Loaded compiled class");

        Ok(ContractClass {
            name: name.to_string(),
            sierra,
            casm,
        })
    }
}

/// Classes held in memory.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    classes: BTreeMap<String, ContractClass>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, name: impl Into<String>, sierra: Value) -> Self {
        let name = name.into();
        self.classes.insert(
            name.clone(),
            ContractClass {
                name,
                sierra,
                casm: None,
            },
        );
        self
    }
}

impl ArtifactSource for ArtifactSet {
    fn load(&self, name: &str) -> DeployResult<ContractClass> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| DeployError::UnknownContract(name.to_string()))
    }
}
