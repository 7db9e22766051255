// src/bin/distribute.rs
//! Runs the selected plan's initial supply distribution against a deployment
//! recorded in `REGISTRY_FILE` (or `REGISTRY_OUT`).
use anyhow::{Context, Result as AnyhowResult};
use cod_deploy::artifacts::ArtifactStore;
use cod_deploy::client::{ChainClient, EthersClient};
use cod_deploy::config::DeployConfig;
use dotenvy::dotenv;
use tracing::info;

#[tokio::main]
async fn main() -> AnyhowResult<()> {
    dotenv().ok();
    cod_deploy::init_tracing();

    let config = DeployConfig::from_env()?;
    let registry_file = config
        .registry_file
        .clone()
        .context("REGISTRY_FILE or REGISTRY_OUT must be set")?;
    info!(plan = ?config.plan, registry = %registry_file.display(), "distributing");

    let client = EthersClient::connect(
        &config.rpc_url,
        &config.private_key,
        ArtifactStore::new(config.artifacts_dir.clone()),
        config.confirmations,
    )
    .await?;
    let deployment = config.deployment(client.deployer())?;

    let report = deployment.distribute_recorded(&client, &registry_file).await?;
    println!("========== DISTRIBUTED ==========");
    println!("{}:", report.symbol);
    for line in report.lines() {
        println!(" - {line}");
    }

    Ok(())
}
