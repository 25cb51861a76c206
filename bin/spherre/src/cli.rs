use std::path::PathBuf;

use clap::Parser;
use spherre_deploy::{Felt, SubmissionMode};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "spherre")]
#[command(
    author,
    version,
    about = "Deploy the Spherre contracts and wire them together"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "SPHERRE_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a TOML configuration file.
    ///
    /// Values from the file are overridden by `SPHERRE_*` environment variables
    /// and by flags given on the command line.
    #[arg(long, alias = "conf", env = "SPHERRE_CONFIG")]
    pub config: Option<PathBuf>,

    /// The logical network name. Keys the registry file.
    #[arg(short, long, env = "SPHERRE_NETWORK")]
    pub network: Option<String>,

    /// Address of the account that declares, deploys and invokes.
    #[arg(long, alias = "account", env = "SPHERRE_ACCOUNT_ADDRESS")]
    pub account_address: Option<Felt>,

    /// Directory holding the per-network registry files.
    #[arg(long, env = "SPHERRE_DEPLOYMENTS_DIR")]
    pub deployments_dir: Option<PathBuf>,

    /// Directory holding the compiled contract classes.
    #[arg(long, env = "SPHERRE_ARTIFACTS_DIR")]
    pub artifacts_dir: Option<PathBuf>,

    /// Package prefix of the compiled contract class files.
    #[arg(long, env = "SPHERRE_PACKAGE")]
    pub package: Option<String>,

    /// When deploy calls are submitted: `batched` or `immediate`.
    #[arg(long, env = "SPHERRE_MODE")]
    pub mode: Option<SubmissionMode>,

    /// Extra attempts for a failed batch flush.
    #[arg(long, env = "SPHERRE_FLUSH_RETRIES")]
    pub flush_retries: Option<usize>,

    /// Fixed deployment salt. A random salt is drawn per contract otherwise.
    #[arg(long, env = "SPHERRE_SALT")]
    pub salt: Option<Felt>,

    /// File the local chain state is restored from and saved to.
    ///
    /// If not provided, the chain only lives for the duration of the run.
    #[arg(long, env = "SPHERRE_CHAIN_STATE")]
    pub chain_state: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    pub print_config: bool,
}
