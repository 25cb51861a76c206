//! Layered run configuration.
//!
//! Built-in defaults are overridden by the TOML file, then by `SPHERRE_*`
//! environment variables, then by explicit command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use spherre_deploy::{ArtifactDir, Felt, RunContext, RunOptions, SubmissionMode};

use crate::cli::Cli;

/// Prefix of the environment variables read by the configuration.
pub const ENV_PREFIX: &str = "SPHERRE_";

/// Default network name.
pub const DEFAULT_NETWORK: &str = "devnet";

/// Default Scarb package prefix of the compiled classes.
pub const DEFAULT_PACKAGE: &str = "spherre";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    pub network: String,
    pub account_address: Option<Felt>,
    pub deployments_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub package: String,
    pub mode: SubmissionMode,
    pub flush_retries: usize,
    pub salt: Option<Felt>,
    pub chain_state: Option<PathBuf>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            account_address: None,
            deployments_dir: PathBuf::from("deployments"),
            artifacts_dir: PathBuf::from("target/dev"),
            package: DEFAULT_PACKAGE.to_string(),
            mode: SubmissionMode::default(),
            flush_retries: 0,
            salt: None,
            chain_state: None,
        }
    }
}

/// Values set explicitly on the command line. Unset flags are not serialized
/// so they never mask a lower layer.
#[derive(Debug, Default, Serialize)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_address: Option<Felt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deployments_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifacts_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    package: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<SubmissionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    flush_retries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    salt: Option<Felt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chain_state: Option<PathBuf>,
}

impl From<&Cli> for CliOverrides {
    fn from(cli: &Cli) -> Self {
        Self {
            network: cli.network.clone(),
            account_address: cli.account_address,
            deployments_dir: cli.deployments_dir.clone(),
            artifacts_dir: cli.artifacts_dir.clone(),
            package: cli.package.clone(),
            mode: cli.mode,
            flush_retries: cli.flush_retries,
            salt: cli.salt,
            chain_state: cli.chain_state.clone(),
        }
    }
}

impl DeployConfig {
    /// Resolve the configuration for this invocation.
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::layered(cli.config.as_deref(), CliOverrides::from(cli))
    }

    fn layered(config_file: Option<&Path>, overrides: CliOverrides) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(DeployConfig::default()));

        if let Some(path) = config_file {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            tracing::debug!(path = %path.display(), "Loading config file");
            figment = figment.merge(Toml::file(path));
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).only(&Self::env_keys()))
            .merge(Serialized::defaults(overrides))
            .extract()
            .context("Failed to resolve configuration")
    }

    /// Field names readable from the environment. Keeps `SPHERRE_VERBOSITY`
    /// and `SPHERRE_CONFIG` out of the extracted configuration.
    fn env_keys() -> [&'static str; 9] {
        [
            "network",
            "account_address",
            "deployments_dir",
            "artifacts_dir",
            "package",
            "mode",
            "flush_retries",
            "salt",
            "chain_state",
        ]
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    pub fn run_context(&self) -> Result<RunContext> {
        let account = self.account_address.context(
            "No account address configured: pass --account-address or set SPHERRE_ACCOUNT_ADDRESS",
        )?;
        Ok(RunContext::new(
            self.network.clone(),
            account,
            self.deployments_dir.clone(),
        ))
    }

    pub fn artifact_dir(&self) -> ArtifactDir {
        ArtifactDir::new(self.artifacts_dir.clone(), self.package.clone())
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            mode: self.mode,
            flush_retries: self.flush_retries,
            salt: self.salt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_defaults_without_any_layer() {
        let config = DeployConfig::layered(None, CliOverrides::default()).expect("config");

        assert_eq!(config.network, DEFAULT_NETWORK);
        assert_eq!(config.mode, SubmissionMode::Batched);
        assert_eq!(config.flush_retries, 0);
        assert!(config.run_context().is_err(), "Account address is required");
    }

    #[test]
    fn test_cli_overrides_file() {
        let temp_dir = TempDir::new("spherre-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("spherre.toml");
        std::fs::write(
            &path,
            r#"
network = "sepolia"
account_address = "0x1234"
mode = "immediate"
flush_retries = 3
"#,
        )
        .expect("Failed to write config");

        let overrides = CliOverrides {
            network: Some("mainnet".to_string()),
            ..CliOverrides::default()
        };
        let config = DeployConfig::layered(Some(&path), overrides).expect("config");

        assert_eq!(config.network, "mainnet", "CLI flag should win over the file");
        assert_eq!(config.mode, SubmissionMode::Immediate);
        assert_eq!(config.flush_retries, 3);
        assert_eq!(config.account_address, Some(Felt::from_u64(0x1234)));

        let ctx = config.run_context().expect("run context");
        assert_eq!(ctx.registry_path(), PathBuf::from("deployments/mainnet_latest.json"));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let temp_dir = TempDir::new("spherre-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("absent.toml");

        assert!(DeployConfig::layered(Some(&path), CliOverrides::default()).is_err());
    }

    #[test]
    fn test_toml_output_reloads() {
        let temp_dir = TempDir::new("spherre-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("spherre.toml");

        let config = DeployConfig {
            account_address: Some(Felt::from_u64(7)),
            salt: Some(Felt::from_u64(9)),
            ..DeployConfig::default()
        };
        std::fs::write(&path, config.to_toml().expect("toml")).expect("Failed to write config");

        let reloaded =
            DeployConfig::layered(Some(&path), CliOverrides::default()).expect("config");
        assert_eq!(reloaded, config);
    }
}
