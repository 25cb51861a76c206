//! spherre deploys the Spherre factory and its initial account, records them in
//! the network registry and wires the account class into the factory.

mod cli;
mod config;
mod report;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use config::DeployConfig;
use spherre_deploy::{DeploymentPlan, LocalChain, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = DeployConfig::load(&cli)?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let ctx = config.run_context()?;
    let artifacts = config.artifact_dir();

    let chain = match &config.chain_state {
        Some(path) => LocalChain::load_or_new(ctx.acting_identity, path)?,
        None => {
            tracing::warn!("No chain state file configured, deployments will not outlive this run");
            LocalChain::new(ctx.acting_identity)
        }
    };

    let plan = DeploymentPlan::spherre_bootstrap(ctx.acting_identity, &mut rand::rng());

    tracing::info!(
        network = %ctx.network,
        registry = %ctx.registry_path().display(),
        contracts = plan.contracts.len(),
        "Deploying Spherre contracts..."
    );

    let mut orchestrator = Orchestrator::new(ctx, &chain, &artifacts, config.run_options());
    let outcome = orchestrator.run(&plan).await;

    // Persist whatever reached the chain, even when the run aborted.
    if let Some(path) = &config.chain_state {
        let saved = chain.save_to_file(path);
        match (&outcome, saved) {
            (_, Ok(())) => {}
            (Ok(_), Err(e)) => return Err(e),
            (Err(_), Err(e)) => {
                tracing::error!(
                    error = ?e,
                    path = %path.display(),
                    "Failed to save chain state"
                );
            }
        }
    }

    let report = outcome.context("Deployment run failed")?;

    tracing::info!(
        registry = %report.registry_path.display(),
        wiring_tx = %report.wiring_receipt.transaction_hash,
        "Deployment complete"
    );
    println!("{}", report::registry_table(&report.registry));

    Ok(())
}
