//! Per-network address books.
//!
//! An address book maps symbolic names (`core.connectorsV2`,
//! `sushiswap.factory`, ...) to an address plus the ABI that should be used
//! to talk to it, and token symbols to their address, decimals and the one
//! funding strategy the seeder may use on a fork. Books are YAML; the
//! built-in ones live in `address-books/` at the workspace root.

use std::collections::BTreeMap;
use std::path::Path;

use alloy_primitives::{address, Address};
use serde::Deserialize;
use thiserror::Error;

use crate::network::Network;

/// Sentinel address DSA connectors use for the chain's native currency.
pub const NATIVE_TOKEN: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

const ARBITRUM_BOOK: &str = include_str!("../../../address-books/arbitrum.yaml");

/// Errors arising from address-book loading and lookups.
#[derive(Debug, Error)]
pub enum AddressBookError {
    #[error("failed to parse address book YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("'{name}' not found in the {network} address book")]
    NotFound { name: String, network: Network },
    #[error("token '{symbol}' not found in the {network} address book")]
    UnknownToken { symbol: String, network: Network },
    #[error("no built-in address book for {0}")]
    NoBuiltin(Network),
}

/// Which interface an address book entry speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbiKind {
    /// `InstaConnectorsV2` registry.
    ConnectorsV2,
    /// `InstaIndex`, the wallet factory and master-key holder.
    InstaIndex,
    /// `InstaAccountV2`, the DSA wallet itself.
    AccountV2,
    /// Plain ERC-20 token.
    Erc20,
    /// Wrapped native token (ERC-20 plus `deposit()`).
    WrappedNative,
    /// Uniswap-V2 style pair factory (Sushiswap).
    UniswapV2Factory,
    /// Native currency sentinel; not a contract.
    Native,
}

/// A resolved on-chain entity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entry {
    pub address: Address,
    pub abi: AbiKind,
}

/// How the seeder acquires a token on a fork.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum FundingStrategy {
    /// Native currency; funded with a plain value transfer.
    Native,
    /// Wrap native currency through the token's `deposit()`.
    WrapNative,
    /// Impersonate a large holder and transfer from it.
    Whale { holder: Address },
    /// Write the `balanceOf` mapping slot directly.
    StorageSlot { slot: u64 },
}

/// A token known to an address book.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenEntry {
    pub address: Address,
    pub decimals: u8,
    pub funding: FundingStrategy,
}

impl TokenEntry {
    /// Whether this entry is the native-currency sentinel.
    pub fn is_native(&self) -> bool {
        self.address == NATIVE_TOKEN
    }
}

/// Name-to-address table for a single network. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressBook {
    pub network: Network,
    #[serde(default)]
    entries: BTreeMap<String, Entry>,
    #[serde(default)]
    tokens: BTreeMap<String, TokenEntry>,
}

impl AddressBook {
    /// Parse an address book from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, AddressBookError> {
        let mut book: AddressBook = serde_yaml::from_str(yaml)?;
        book.tokens = book
            .tokens
            .into_iter()
            .map(|(symbol, token)| (symbol.to_lowercase(), token))
            .collect();
        Ok(book)
    }

    /// Load an address book from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, AddressBookError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// The address book compiled into the crate for `network`.
    pub fn builtin(network: Network) -> Result<Self, AddressBookError> {
        match network {
            Network::Arbitrum => Self::from_yaml(ARBITRUM_BOOK),
            other => Err(AddressBookError::NoBuiltin(other)),
        }
    }

    /// Resolve `name` for `network`.
    ///
    /// Fails with [`AddressBookError::NotFound`] when the name is absent or
    /// this book belongs to another network.
    pub fn resolve(&self, name: &str, network: Network) -> Result<&Entry, AddressBookError> {
        let not_found = || AddressBookError::NotFound {
            name: name.to_string(),
            network,
        };
        if network != self.network {
            return Err(not_found());
        }
        self.entries.get(name).ok_or_else(not_found)
    }

    /// Resolve a token by symbol (case-insensitive) in this book's network.
    pub fn token(&self, symbol: &str) -> Result<&TokenEntry, AddressBookError> {
        self.tokens
            .get(&symbol.to_lowercase())
            .ok_or_else(|| AddressBookError::UnknownToken {
                symbol: symbol.to_string(),
                network: self.network,
            })
    }
}
