// src/distribution.rs
use crate::client::ChainClient;
use crate::error::DeployError;
use crate::registry::Registry;
use crate::utils;
use anyhow::{Context, Result, anyhow, bail};
use ethers::abi::Token;
use ethers::types::{Address, U256};
use tracing::info;

/// Where a recipient's address comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Holder {
    /// An address recorded in the registry under this step name.
    Step(String),
    /// The deploying account.
    Deployer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub label: String,
    pub holder: Holder,
}

impl Recipient {
    pub fn step(label: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            holder: Holder::Step(step.into()),
        }
    }

    pub fn deployer(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            holder: Holder::Deployer,
        }
    }
}

/// One-time `distSupply(recipients..)` on a freshly deployed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    /// Registry name of the token instance.
    pub token: String,
    /// Artifact name of the token contract.
    pub contract: String,
    /// Unit shown next to balances, e.g. `COD`.
    pub symbol: String,
    pub recipients: Vec<Recipient>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub label: String,
    pub holder: Address,
    pub balance: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionReport {
    pub symbol: String,
    pub decimals: u8,
    pub allocations: Vec<Allocation>,
}

impl DistributionReport {
    /// `"<label>: <amount> (<symbol>)"` per recipient.
    pub fn lines(&self) -> Vec<String> {
        self.allocations
            .iter()
            .map(|a| {
                format!(
                    "{}: {} ({})",
                    a.label,
                    utils::u256_to_human(a.balance, self.decimals),
                    self.symbol
                )
            })
            .collect()
    }
}

impl Distribution {
    /// Calls `distSupply` once, then reads back every recipient's balance.
    pub async fn execute<C: ChainClient>(&self, client: &C, registry: &Registry) -> Result<DistributionReport, DeployError> {
        self.try_execute(client, registry)
            .await
            .map_err(|cause| DeployError::DistributionFailed {
                token: self.token.clone(),
                cause,
            })
    }

    async fn try_execute<C: ChainClient>(&self, client: &C, registry: &Registry) -> Result<DistributionReport> {
        let token = registry.require(&self.token)?;
        let holders = self
            .recipients
            .iter()
            .map(|recipient| match &recipient.holder {
                Holder::Step(step) => registry.require(step),
                Holder::Deployer => Ok(client.deployer()),
            })
            .collect::<Result<Vec<_>>>()?;

        let args = holders.iter().copied().map(Token::Address).collect();
        let hash = client
            .transact(&self.contract, token, "distSupply", args)
            .await
            .context("distSupply")?;
        info!(?hash, token = %self.token, "initial supply distributed");

        let decimals = token_decimals(client, &self.contract, token).await?;
        let mut allocations = Vec::with_capacity(holders.len());
        for (recipient, holder) in self.recipients.iter().zip(holders) {
            allocations.push(Allocation {
                label: recipient.label.clone(),
                holder,
                balance: token_balance(client, &self.contract, token, holder).await?,
            });
        }

        Ok(DistributionReport {
            symbol: self.symbol.clone(),
            decimals,
            allocations,
        })
    }
}

pub async fn token_decimals<C: ChainClient>(client: &C, contract: &str, token: Address) -> Result<u8> {
    let output = client.call(contract, token, "decimals", Vec::new()).await?;
    let decimals = first_uint(output).context("decimals()")?;
    if decimals > U256::from(u8::MAX) {
        bail!("decimals() returned {decimals}, which does not fit in a u8");
    }
    Ok(decimals.low_u32() as u8)
}

pub async fn token_balance<C: ChainClient>(client: &C, contract: &str, token: Address, holder: Address) -> Result<U256> {
    let output = client
        .call(contract, token, "balanceOf", vec![Token::Address(holder)])
        .await?;
    first_uint(output).context("balanceOf()")
}

fn first_uint(output: Vec<Token>) -> Result<U256> {
    output
        .into_iter()
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| anyhow!("expected a uint return value"))
}
