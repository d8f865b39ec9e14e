//! Configuration types for the twinkit host.

mod listen;
mod webhooks;

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use listen::{AdminConfig, ClockConfig};
pub use webhooks::DispatcherConfig;

/// One record store exposed by the host.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ResourceConfig {
    /// Key of the resource in state snapshots, e.g. `customers`.
    pub name: String,
    /// ID prefix, e.g. `cus`.
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Twin name, used in logs.
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhooks: Option<DispatcherConfig>,
    #[serde(default)]
    pub clock: ClockConfig,
}

fn default_name() -> String {
    "twin".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            admin: AdminConfig::default(),
            resources: Vec::new(),
            webhooks: None,
            clock: ClockConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let mut names = HashSet::new();
        let mut prefixes = HashSet::new();
        for resource in &self.resources {
            if resource.name.trim().is_empty() || resource.prefix.trim().is_empty() {
                anyhow::bail!("Resources need a non-empty 'name' and 'prefix'");
            }
            if !names.insert(resource.name.as_str()) {
                anyhow::bail!("Duplicate resource name '{}'", resource.name);
            }
            if !prefixes.insert(resource.prefix.as_str()) {
                anyhow::bail!("Duplicate resource prefix '{}'", resource.prefix);
            }
        }

        if let Some(webhooks) = &self.webhooks {
            webhooks.validate().context("Invalid 'webhooks' section")?;
        }

        Ok(())
    }
}
