// src/main.rs
use anyhow::{Context, Result as AnyhowResult};
use cod_deploy::artifacts::ArtifactStore;
use cod_deploy::client::{ChainClient, EthersClient};
use cod_deploy::config::DeployConfig;
use cod_deploy::deploy::Orchestrator;
use cod_deploy::registry::Registry;
use cod_deploy::utils;
use dotenvy::dotenv;
use std::path::Path;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> AnyhowResult<()> {
    dotenv().ok();
    cod_deploy::init_tracing();

    let config = DeployConfig::from_env()?;
    info!(network = config.network.name(), plan = ?config.plan, "configuration loaded");

    let client = EthersClient::connect(
        &config.rpc_url,
        &config.private_key,
        ArtifactStore::new(config.artifacts_dir.clone()),
        config.confirmations,
    )
    .await?;
    let deployment = config.deployment(client.deployer())?;

    let mut orchestrator = Orchestrator::new(&client).on_progress(|entry| println!("{entry}"));
    let outcome = orchestrator.run(&deployment.plan).await;

    // a failed run may still have deployed contracts worth keeping
    if let Some(path) = &config.registry_out {
        persist(orchestrator.registry(), path);
    }
    let result = outcome.context("Deployment failed")?;

    let owner = client.deployer();
    let balance = client.balance(owner).await?;
    println!("\nOwner: {owner:?}");
    println!("Balance: {} (ETH)", utils::format_ether(balance));

    if let Some(distribution) = &deployment.distribution {
        let report = distribution.execute(&client, &result.registry).await?;
        println!("\n--------------[Initial Supply]--------------");
        for line in report.lines() {
            println!("{line}");
        }
    }

    Ok(())
}

fn persist(registry: &Registry, path: &Path) {
    if registry.is_empty() {
        return;
    }
    match registry.save(path) {
        Ok(()) => info!(path = %path.display(), entries = registry.len(), "registry written"),
        Err(err) => warn!(path = %path.display(), "failed to write registry: {err:#}"),
    }
}
