//! Configuration management for powchain

use crate::crypto::validate_address;
use crate::error::{ChainError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl NodeConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerConfig {
    /// Recipient of the whole supply in the genesis block.
    #[serde(default = "default_faucet_address")]
    pub faucet_address: String,
    #[serde(default = "default_total_supply")]
    pub total_supply: u64,
    #[serde(default = "default_difficulty")]
    pub initial_difficulty: u32,
    /// Blocks between difficulty adjustments; 0 keeps difficulty fixed.
    #[serde(default)]
    pub retarget_interval: u64,
    #[serde(default = "default_target_block_secs")]
    pub target_block_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            faucet_address: default_faucet_address(),
            total_supply: default_total_supply(),
            initial_difficulty: default_difficulty(),
            retarget_interval: 0,
            target_block_secs: default_target_block_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_host")]
    pub node_host: String,
    #[serde(default = "default_port")]
    pub node_port: u16,
    #[serde(default = "default_miner_address")]
    pub address: String,
    /// Stop after the first submission instead of mining forever.
    #[serde(default)]
    pub mine_once: bool,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub search_budget_secs: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            node_host: default_host(),
            node_port: default_port(),
            address: default_miner_address(),
            mine_once: false,
            request_timeout_secs: default_timeout_secs(),
            search_budget_secs: default_timeout_secs(),
        }
    }
}

impl MinerConfig {
    pub fn node_url(&self) -> String {
        format!("http://{}:{}", self.node_host, self.node_port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn search_budget(&self) -> Duration {
        Duration::from_secs(self.search_budget_secs)
    }
}

/// Loads `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    let config: Config = if path.exists() {
        let config_str = fs::read_to_string(path)?;
        toml::from_str(&config_str)
            .map_err(|e| ChainError::Config(format!("{}: {}", path.display(), e)))?
    } else {
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        validate_address(&self.ledger.faucet_address)
            .map_err(|e| ChainError::Config(format!("ledger.faucet_address: {}", e)))?;
        validate_address(&self.miner.address)
            .map_err(|e| ChainError::Config(format!("miner.address: {}", e)))?;

        if self.ledger.initial_difficulty > 64 {
            return Err(ChainError::Config(
                "ledger.initial_difficulty cannot exceed 64 hex digits".to_string(),
            ));
        }
        if self.miner.request_timeout_secs == 0 || self.miner.search_budget_secs == 0 {
            return Err(ChainError::Config(
                "miner timeouts must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5555
}

fn default_faucet_address() -> String {
    "f3a1e69b6176052fcc4a3248f1c5a91dea308ca9".to_string()
}

fn default_total_supply() -> u64 {
    1_000_000_000_000
}

fn default_difficulty() -> u32 {
    5
}

fn default_target_block_secs() -> u64 {
    5
}

fn default_miner_address() -> String {
    "9a9f082f37270ff54c5ca4204a0e4da6951fe917".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}
