//! Chain adapter.
//!
//! Connects to the local dev node's JSON-RPC endpoint and provides the
//! read-side helpers every harness component shares.

use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use thiserror::Error;

use crate::abi::IERC20;

/// Errors from adapter operations.
#[derive(Debug, Error)]
pub enum EvmAdapterError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("URL parse error: {0}")]
    UrlParse(String),
    #[error("ABI decode error: {0}")]
    AbiDecode(String),
}

/// Result alias for adapter operations.
pub type Result<T> = std::result::Result<T, EvmAdapterError>;

/// A connection to the node the harness forks and drives.
#[derive(Clone)]
pub struct EvmAdapter {
    provider: DynProvider<Ethereum>,
    rpc_url: String,
}

impl std::fmt::Debug for EvmAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmAdapter")
            .field("rpc_url", &self.rpc_url)
            .finish()
    }
}

impl EvmAdapter {
    /// Creates a new adapter for the given RPC URL.
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url: alloy::transports::http::reqwest::Url = rpc_url
            .parse()
            .map_err(|e| EvmAdapterError::UrlParse(format!("{e}")))?;

        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self {
            provider,
            rpc_url: rpc_url.to_string(),
        })
    }

    /// Wraps an already-built provider (mocked transports in tests).
    pub fn from_provider(provider: DynProvider<Ethereum>, rpc_url: impl Into<String>) -> Self {
        Self {
            provider,
            rpc_url: rpc_url.into(),
        }
    }

    /// Returns a reference to the underlying provider.
    pub fn provider(&self) -> &DynProvider<Ethereum> {
        &self.provider
    }

    /// Returns the RPC URL.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Executes a read-only contract call and decodes its return value.
    pub async fn call<C: SolCall>(&self, to: Address, call: &C) -> Result<C::Return> {
        let data = call.abi_encode();
        let result: Bytes = self
            .provider
            .call(TransactionRequest::default().to(to).input(data.into()))
            .await
            .map_err(|e| EvmAdapterError::Rpc(e.to_string()))?;

        C::abi_decode_returns(&result).map_err(|e| EvmAdapterError::AbiDecode(e.to_string()))
    }

    /// Queries the native balance for an address.
    pub async fn get_native_balance(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| EvmAdapterError::Rpc(e.to_string()))
    }

    /// Queries the ERC-20 token balance for an owner address.
    pub async fn get_erc20_balance(&self, token: Address, owner: Address) -> Result<U256> {
        self.call(token, &IERC20::balanceOfCall { owner }).await
    }

    /// Returns the bytecode deployed at `address` (empty for EOAs).
    pub async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| EvmAdapterError::Rpc(e.to_string()))
    }

    /// Gets the latest block number from the connected node.
    pub async fn get_block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| EvmAdapterError::Rpc(e.to_string()))
    }
}
