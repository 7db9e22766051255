// src/bin/accounts.rs
//! Prints the deploying account and its native balance.
use anyhow::Result as AnyhowResult;
use cod_deploy::artifacts::ArtifactStore;
use cod_deploy::client::{ChainClient, EthersClient};
use cod_deploy::config::DeployConfig;
use cod_deploy::utils;
use dotenvy::dotenv;

#[tokio::main]
async fn main() -> AnyhowResult<()> {
    dotenv().ok();
    cod_deploy::init_tracing();

    let config = DeployConfig::from_env()?;
    let client = EthersClient::connect(
        &config.rpc_url,
        &config.private_key,
        ArtifactStore::new(config.artifacts_dir.clone()),
        config.confirmations,
    )
    .await?;

    let account = client.deployer();
    let balance = client.balance(account).await?;
    println!("\nAccount 0: {account:?}");
    println!("Balance: {} (ETH)", utils::format_ether(balance));

    Ok(())
}
