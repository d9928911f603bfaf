//! Harness configuration.
//!
//! Loads `forkcast.yaml`: which network to fork, at which height, where the
//! local dev node listens and how long to wait for receipts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::address_book::{AddressBook, AddressBookError};
use crate::network::Network;

/// Environment variable that overrides [`HarnessConfig::node_url`].
pub const NODE_URL_ENV: &str = "FORKCAST_NODE_URL";

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("fork RPC URL not configured: set {0} or fork.rpc_url")]
    MissingRpcUrl(String),
    #[error("address book error: {0}")]
    AddressBook(#[from] AddressBookError),
}

/// The remote chain state a run forks from.
///
/// `block_number` is pinned for the whole run; changing it changes balances
/// and prices downstream and invalidates expected values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkSpec {
    pub rpc_url: String,
    pub block_number: u64,
}

/// Fork section of the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ForkConfig {
    /// Name of the environment variable holding the remote RPC URL.
    #[serde(default = "default_rpc_url_env")]
    pub rpc_url_env: String,
    /// Literal remote RPC URL; the environment variable wins when both are set.
    pub rpc_url: Option<String>,
    /// Pinned fork height.
    pub block_number: u64,
}

/// Receipt polling budget. No attempt cap means wait forever.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    pub max_attempts: Option<u32>,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: None,
        }
    }
}

impl ReceiptConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Top-level harness configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HarnessConfig {
    pub network: Network,
    pub fork: ForkConfig,
    /// JSON-RPC URL of the local dev node that gets reset onto the fork.
    #[serde(default = "default_node_url")]
    pub node_url: String,
    #[serde(default)]
    pub receipt: ReceiptConfig,
    /// Address book override; the built-in book for `network` otherwise.
    pub address_book: Option<PathBuf>,
    /// Append phase and scenario outcomes to this JSONL file.
    pub journal_path: Option<PathBuf>,
}

impl HarnessConfig {
    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load config from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Resolve the fork target, reading the RPC URL from the environment.
    pub fn fork_spec(&self) -> Result<ForkSpec, ConfigError> {
        let rpc_url = std::env::var(&self.fork.rpc_url_env)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.fork.rpc_url.clone())
            .ok_or_else(|| ConfigError::MissingRpcUrl(self.fork.rpc_url_env.clone()))?;
        Ok(ForkSpec {
            rpc_url,
            block_number: self.fork.block_number,
        })
    }

    /// Local node URL, honouring [`NODE_URL_ENV`].
    pub fn node_url(&self) -> String {
        std::env::var(NODE_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.node_url.clone())
    }

    /// Load the configured address book.
    pub fn address_book(&self) -> Result<AddressBook, ConfigError> {
        let book = match &self.address_book {
            Some(path) => AddressBook::from_file(path)?,
            None => AddressBook::builtin(self.network)?,
        };
        Ok(book)
    }
}

fn default_rpc_url_env() -> String {
    "ARBITRUM_RPC_URL".to_string()
}

fn default_node_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}
