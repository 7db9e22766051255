// src/artifacts.rs
use anyhow::{Context, Result, bail};
use ethers::abi::Abi;
use ethers::types::Bytes;
use serde::Deserialize;
use std::path::PathBuf;

/// The parts of a Hardhat build artifact needed to deploy and call a contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub abi: Abi,
    pub bytecode: Bytes,
}

/// Resolves contract names to artifacts under a Hardhat `artifacts/` tree.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Loads the artifact for `name`, e.g. `artifacts/contracts/Cod.sol/COD.json`.
    pub fn load(&self, name: &str) -> Result<Artifact> {
        let path = self
            .locate(name)?
            .with_context(|| format!("No artifact for contract `{name}` under {}", self.root.display()))?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let artifact: Artifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;
        if artifact.contract_name != name {
            bail!(
                "artifact {} declares contract `{}`, expected `{name}`",
                path.display(),
                artifact.contract_name
            );
        }
        Ok(artifact)
    }

    /// Like [`load`](Self::load) but rejects interfaces and abstract contracts.
    pub fn load_deployable(&self, name: &str) -> Result<Artifact> {
        let artifact = self.load(name)?;
        if artifact.bytecode.is_empty() {
            bail!("contract `{name}` has no bytecode (abstract contract or interface)");
        }
        Ok(artifact)
    }

    fn locate(&self, name: &str) -> Result<Option<PathBuf>> {
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        let pattern = format!("{root}/**/{name}.json");
        let paths = glob::glob(&pattern).with_context(|| format!("Invalid artifact pattern {pattern}"))?;

        for path in paths {
            let path = path.context("Failed to walk the artifacts tree")?;
            // build-info holds compiler input/output, not artifacts
            if path.components().any(|c| c.as_os_str() == "build-info") {
                continue;
            }
            return Ok(Some(path));
        }

        Ok(None)
    }
}
