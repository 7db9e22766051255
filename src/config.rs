// src/config.rs
use crate::distribution::{Distribution, Holder, Recipient};
use crate::plan::{Action, Arg, DeploymentStep, Plan, Value};
use crate::plans::{self, Deployment};
use anyhow::{Context, Result, anyhow, bail};
use ethers::types::{Address, U256};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Networks reachable without an explicit `RPC_URL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Localhost,
    Ropsten,
    Kovan,
    Rinkeby,
    Goerli,
    Mumbai,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::Localhost => "localhost",
            Network::Ropsten => "ropsten",
            Network::Kovan => "kovan",
            Network::Rinkeby => "rinkeby",
            Network::Goerli => "goerli",
            Network::Mumbai => "mumbai",
        }
    }

    pub fn rpc_url(&self, infura_project_id: Option<&str>) -> Result<String> {
        let infura = |host: &str| -> Result<String> {
            let id = infura_project_id
                .with_context(|| format!("INFURA_PROJECT_ID is required for {}", self.name()))?;
            Ok(format!("https://{host}.infura.io/v3/{id}"))
        };
        match self {
            Network::Localhost => Ok("http://127.0.0.1:8545".to_string()),
            Network::Ropsten => infura("ropsten"),
            Network::Kovan => infura("kovan"),
            Network::Rinkeby => infura("rinkeby"),
            Network::Goerli => infura("goerli"),
            Network::Mumbai => Ok("https://rpc-mumbai.maticvigil.com".to_string()),
        }
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "localhost" | "hardhat" => Ok(Network::Localhost),
            "ropsten" => Ok(Network::Ropsten),
            "kovan" => Ok(Network::Kovan),
            "rinkeby" => Ok(Network::Rinkeby),
            "goerli" => Ok(Network::Goerli),
            "mumbai" => Ok(Network::Mumbai),
            other => bail!("unknown network `{other}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSource {
    Cod,
    Authority,
    File(PathBuf),
}

impl FromStr for PlanSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cod" => Ok(PlanSource::Cod),
            "authority" => Ok(PlanSource::Authority),
            path if path.ends_with(".json") => Ok(PlanSource::File(PathBuf::from(path))),
            other => bail!("PLAN must be `cod`, `authority` or a .json file, got `{other}`"),
        }
    }
}

/// Settings shared by every binary, read from the environment.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub network: Network,
    pub rpc_url: String,
    pub private_key: String,
    pub dai_token: Option<Address>,
    pub plan: PlanSource,
    pub artifacts_dir: PathBuf,
    pub registry_out: Option<PathBuf>,
    /// Registry read back by `distribute`; defaults to `registry_out`.
    pub registry_file: Option<PathBuf>,
    pub confirmations: usize,
}

impl DeployConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let network = match get("NETWORK") {
            Some(name) => name.parse()?,
            None => Network::Localhost,
        };
        let rpc_url = match get("RPC_URL") {
            Some(url) => url,
            None => network.rpc_url(get("INFURA_PROJECT_ID").as_deref())?,
        };
        let private_key = get("PRIVATE_KEY").context("PRIVATE_KEY must be set")?;
        let dai_token = get("DAI_TOKEN")
            .map(|raw| raw.parse::<Address>().with_context(|| format!("DAI_TOKEN `{raw}` is not an address")))
            .transpose()?;
        let plan = match get("PLAN") {
            Some(raw) => raw.parse()?,
            None => PlanSource::Cod,
        };
        let artifacts_dir = get("ARTIFACTS_DIR").unwrap_or_else(|| "artifacts".into()).into();
        let registry_out = get("REGISTRY_OUT").map(PathBuf::from);
        let registry_file = get("REGISTRY_FILE").map(PathBuf::from).or_else(|| registry_out.clone());
        let confirmations = match get("CONFIRMATIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("CONFIRMATIONS `{raw}` is not a number"))?,
            None => 1,
        };

        Ok(Self {
            network,
            rpc_url,
            private_key,
            dai_token,
            plan,
            artifacts_dir,
            registry_out,
            registry_file,
            confirmations,
        })
    }

    /// Builds the selected plan. External values are fixed as literals here.
    pub fn deployment(&self, deployer: Address) -> Result<Deployment> {
        let dai = || self.dai_token.context("DAI_TOKEN must be set");
        match &self.plan {
            PlanSource::Cod => Ok(plans::cod(dai()?)),
            PlanSource::Authority => Ok(plans::authority(dai()?, deployer)),
            PlanSource::File(path) => load_plan(path, deployer, |key| std::env::var(key).ok()),
        }
    }
}

/// Reads a JSON plan file; `{"env": VAR}` arguments are looked up at load time.
pub fn load_plan(path: &Path, deployer: Address, lookup: impl Fn(&str) -> Option<String>) -> Result<Deployment> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    parse_plan(&content, deployer, lookup).with_context(|| format!("Invalid plan {}", path.display()))
}

pub fn parse_plan(content: &str, deployer: Address, lookup: impl Fn(&str) -> Option<String>) -> Result<Deployment> {
    let file: PlanFile = serde_json::from_str(content)?;
    let resolve = |arg: ArgEntry| -> Result<Arg> {
        Ok(match arg {
            ArgEntry::Ref(step) => Arg::Ref(step),
            ArgEntry::Deployer => Arg::address(deployer),
            ArgEntry::Env(key) => {
                let raw = lookup(&key).with_context(|| format!("{key} must be set"))?;
                let address = raw
                    .parse::<Address>()
                    .map_err(|_| anyhow!("{key} `{raw}` is not an address"))?;
                Arg::address(address)
            }
            ArgEntry::Address(address) => Arg::address(address),
            ArgEntry::Uint(value) => Arg::Literal(Value::Uint(value)),
            ArgEntry::Bool(value) => Arg::Literal(Value::Bool(value)),
            ArgEntry::String(value) => Arg::Literal(Value::String(value)),
        })
    };

    let mut plan = Plan::default();
    for entry in file.steps {
        let mut step = DeploymentStep::new(entry.name.clone(), entry.contract.unwrap_or(entry.name));
        for arg in entry.args {
            step = step.arg(resolve(arg)?);
        }
        for action in entry.actions {
            let mut call = Action {
                target: action.target,
                method: action.method,
                args: Vec::new(),
            };
            for arg in action.args {
                call = call.arg(resolve(arg)?);
            }
            step = step.then(call);
        }
        plan = plan.step(step);
    }

    let distribution = file.distribution.map(|entry| Distribution {
        contract: entry.contract.unwrap_or_else(|| entry.token.clone()),
        symbol: entry.symbol.unwrap_or_else(|| entry.token.clone()),
        token: entry.token,
        recipients: entry
            .recipients
            .into_iter()
            .map(|r| Recipient {
                holder: match r.step {
                    Some(step) => Holder::Step(step),
                    None => Holder::Deployer,
                },
                label: r.label,
            })
            .collect(),
    });

    Ok(Deployment { plan, distribution })
}

#[derive(Deserialize)]
struct PlanFile {
    steps: Vec<StepEntry>,
    #[serde(default)]
    distribution: Option<DistributionEntry>,
}

#[derive(Deserialize)]
struct StepEntry {
    name: String,
    #[serde(default)]
    contract: Option<String>,
    #[serde(default)]
    args: Vec<ArgEntry>,
    #[serde(default)]
    actions: Vec<ActionEntry>,
}

#[derive(Deserialize)]
struct ActionEntry {
    #[serde(default)]
    target: Option<String>,
    method: String,
    #[serde(default)]
    args: Vec<ArgEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ArgEntry {
    Ref(String),
    Env(String),
    Deployer,
    Address(Address),
    Uint(#[serde(deserialize_with = "deserialize_u256")] U256),
    Bool(bool),
    String(String),
}

#[derive(Deserialize)]
struct DistributionEntry {
    token: String,
    #[serde(default)]
    contract: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    recipients: Vec<RecipientEntry>,
}

/// A recipient without `step` is the deployer.
#[derive(Deserialize)]
struct RecipientEntry {
    label: String,
    #[serde(default)]
    step: Option<String>,
}

fn deserialize_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let dec_string: String = Deserialize::deserialize(deserializer)?;
    U256::from_dec_str(&dec_string).map_err(serde::de::Error::custom)
}
