// src/plans.rs
//! Built-in deployment plans for the COD system.
use crate::client::ChainClient;
use crate::distribution::{Distribution, DistributionReport, Recipient};
use crate::plan::{Action, Arg, DeploymentStep, Plan};
use crate::registry::Registry;
use anyhow::{Context, Result};
use ethers::types::Address;
use std::path::Path;

/// A plan plus the optional initial-supply distribution that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub plan: Plan,
    pub distribution: Option<Distribution>,
}

impl Deployment {
    /// Runs this plan's distribution against a registry saved by an earlier run.
    pub async fn distribute_recorded<C: ChainClient>(&self, client: &C, registry_file: &Path) -> Result<DistributionReport> {
        let distribution = self
            .distribution
            .as_ref()
            .context("the selected plan has no initial supply distribution")?;
        let registry = Registry::load(registry_file)?;
        Ok(distribution.execute(client, &registry).await?)
    }
}

/// COD, sCOD, Treasury, Vault and Presale, with the treasury and vault
/// addresses wired into the tokens after deployment.
pub fn cod(dai: Address) -> Deployment {
    let plan = Plan::default()
        .step(DeploymentStep::new("COD", "COD"))
        .step(DeploymentStep::new("sCOD", "sCOD"))
        .step(
            DeploymentStep::new("Treasury", "Treasury")
                .arg(Arg::reference("COD"))
                .arg(Arg::address(dai))
                .then(Action::on("COD", "setTreasury").arg(Arg::reference("Treasury"))),
        )
        .step(
            DeploymentStep::new("Vault", "Vault")
                .arg(Arg::reference("COD"))
                .arg(Arg::reference("sCOD"))
                .arg(Arg::reference("Treasury"))
                .then(Action::on("sCOD", "setVault").arg(Arg::reference("Vault")))
                .then(Action::on("Treasury", "setVault").arg(Arg::reference("Vault"))),
        )
        .step(
            DeploymentStep::new("Presale", "Presale")
                .arg(Arg::reference("COD"))
                .arg(Arg::address(dai))
                .arg(Arg::reference("Treasury")),
        );

    Deployment {
        plan,
        distribution: Some(cod_distribution("Team/Owner")),
    }
}

/// Variant where every contract is governed by a shared `Authority`
/// instead of being wired together after deployment.
pub fn authority(dai: Address, deployer: Address) -> Deployment {
    // governor, guardian, policy and vault roles all start with the deployer
    let mut authority = DeploymentStep::new("Authority", "Authority");
    for _ in 0..4 {
        authority = authority.arg(Arg::address(deployer));
    }

    let plan = Plan::default()
        .step(authority)
        .step(DeploymentStep::new("COD", "COD").arg(Arg::reference("Authority")))
        .step(DeploymentStep::new("sCOD", "sCOD").arg(Arg::reference("Authority")))
        .step(
            DeploymentStep::new("Treasury", "Treasury")
                .arg(Arg::reference("COD"))
                .arg(Arg::address(dai))
                .arg(Arg::reference("Authority")),
        )
        .step(
            DeploymentStep::new("Vault", "Vault")
                .arg(Arg::reference("COD"))
                .arg(Arg::reference("sCOD"))
                .arg(Arg::reference("Authority")),
        )
        .step(
            DeploymentStep::new("Presale", "Presale")
                .arg(Arg::reference("COD"))
                .arg(Arg::address(dai))
                .arg(Arg::reference("Authority")),
        );

    Deployment {
        plan,
        distribution: Some(cod_distribution("Team/Deployer")),
    }
}

fn cod_distribution(team_label: &str) -> Distribution {
    Distribution {
        token: "COD".into(),
        contract: "COD".into(),
        symbol: "COD".into(),
        recipients: vec![Recipient::step("Presale", "Presale"), Recipient::deployer(team_label)],
    }
}
