//! Networks the harness can fork.
//!
//! Each network has its own address book; see [`crate::address_book`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Networks with a DSA deployment.
///
/// Each variant carries its well-known numeric chain ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum Network {
    /// Ethereum mainnet
    Mainnet = 1,
    /// Optimism
    Optimism = 10,
    /// Polygon
    Polygon = 137,
    /// Base
    Base = 8453,
    /// Arbitrum One
    Arbitrum = 42161,
    /// Avalanche C-Chain
    Avalanche = 43114,
}

impl Network {
    /// All known networks.
    pub const ALL: [Network; 6] = [
        Self::Mainnet,
        Self::Optimism,
        Self::Polygon,
        Self::Base,
        Self::Arbitrum,
        Self::Avalanche,
    ];

    /// Returns the numeric chain ID.
    pub const fn chain_id(self) -> u64 {
        self as u64
    }

    /// Lowercase identifier used in config files and address-book names.
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Optimism => "optimism",
            Self::Polygon => "polygon",
            Self::Base => "base",
            Self::Arbitrum => "arbitrum",
            Self::Avalanche => "avalanche",
        }
    }

    /// Human-readable network name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mainnet => "Ethereum",
            Self::Optimism => "Optimism",
            Self::Polygon => "Polygon",
            Self::Base => "Base",
            Self::Arbitrum => "Arbitrum One",
            Self::Avalanche => "Avalanche",
        }
    }
}

impl TryFrom<u64> for Network {
    type Error = UnknownNetworkError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|n| n.chain_id() == value)
            .ok_or_else(|| UnknownNetworkError(value.to_string()))
    }
}

impl FromStr for Network {
    type Err = UnknownNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = s.parse::<u64>() {
            return Self::try_from(id);
        }
        Self::ALL
            .into_iter()
            .find(|n| n.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownNetworkError(s.to_string()))
    }
}

impl From<Network> for u64 {
    fn from(network: Network) -> u64 {
        network.chain_id()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.chain_id())
    }
}

/// Error when a chain ID or slug does not name a known network.
#[derive(Debug, Clone)]
pub struct UnknownNetworkError(pub String);

impl fmt::Display for UnknownNetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown network '{}'; known networks: {}",
            self.0,
            Network::ALL
                .iter()
                .map(|n| format!("{} ({})", n.slug(), n.chain_id()))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for UnknownNetworkError {}
