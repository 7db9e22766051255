// src/registry.rs
use anyhow::{Context, Result};
use ethers::types::Address;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Step name to deployed address, kept in deployment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    entries: IndexMap<String, Address>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Address> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Records `name`, replacing the address if the name is already present.
    pub fn insert(&mut self, name: impl Into<String>, address: Address) {
        self.entries.insert(name.into(), address);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Address)> {
        self.entries
            .iter()
            .map(|(name, address)| (name.as_str(), *address))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Looks up `name`, failing with a message that points at the registry file.
    pub fn require(&self, name: &str) -> Result<Address> {
        self.get(name)
            .with_context(|| format!("`{name}` is missing from the address registry"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse registry {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write registry {}", path.display()))
    }
}
