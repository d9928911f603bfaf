//! Fork control.
//!
//! Resets the dev node onto a pinned remote height and wraps the node's
//! cheat codes (balances, impersonation, storage writes) used to stage state.

use alloy::primitives::{Address, B256, U256};
use alloy::providers::ext::AnvilApi;
use alloy::rpc::types::anvil::Forking;
use forkcast_core::ForkSpec;
use thiserror::Error;
use tracing::{debug, info};

use crate::adapter::EvmAdapter;
use crate::tx::{AccountKind, NodeAccount};

/// Errors from fork control.
#[derive(Debug, Error)]
pub enum ForkError {
    #[error("fork reset to block {block} failed: {reason}")]
    Reset { block: u64, reason: String },
    #[error("node reports block {actual} after reset, expected {expected}")]
    HeightMismatch { expected: u64, actual: u64 },
    #[error("cheat code {method} failed: {reason}")]
    CheatCode { method: &'static str, reason: String },
}

/// Result alias for fork operations.
pub type Result<T> = std::result::Result<T, ForkError>;

/// Drives a dev node's fork state.
#[derive(Debug, Clone, Copy)]
pub struct ForkManager<'a> {
    adapter: &'a EvmAdapter,
}

impl<'a> ForkManager<'a> {
    pub fn new(adapter: &'a EvmAdapter) -> Self {
        Self { adapter }
    }

    /// Replaces the node's world state with the remote chain at the pinned
    /// height, then checks the node reports exactly that height.
    pub async fn reset(&self, spec: &ForkSpec) -> Result<()> {
        let forking = Forking {
            json_rpc_url: Some(spec.rpc_url.clone()),
            block_number: Some(spec.block_number),
        };
        self.adapter
            .provider()
            .anvil_reset(Some(forking))
            .await
            .map_err(|e| ForkError::Reset {
                block: spec.block_number,
                reason: e.to_string(),
            })?;

        let actual = self
            .adapter
            .get_block_number()
            .await
            .map_err(|e| ForkError::Reset {
                block: spec.block_number,
                reason: e.to_string(),
            })?;
        if actual != spec.block_number {
            return Err(ForkError::HeightMismatch {
                expected: spec.block_number,
                actual,
            });
        }

        info!(block = spec.block_number, "fork reset");
        Ok(())
    }

    /// Overwrites the native balance of `address`.
    pub async fn set_native_balance(&self, address: Address, amount: U256) -> Result<()> {
        self.adapter
            .provider()
            .anvil_set_balance(address, amount)
            .await
            .map_err(|e| cheat("anvil_setBalance", e))?;
        debug!(%address, %amount, "native balance set");
        Ok(())
    }

    /// Lets the node send transactions as `address`.
    pub async fn impersonate(&self, address: Address) -> Result<NodeAccount> {
        self.adapter
            .provider()
            .anvil_impersonate_account(address)
            .await
            .map_err(|e| cheat("anvil_impersonateAccount", e))?;
        debug!(%address, "impersonating");
        Ok(NodeAccount::impersonated(address))
    }

    /// Ends impersonation of `account`. Unlocked dev accounts are left as they are.
    pub async fn stop_impersonating(&self, account: NodeAccount) -> Result<()> {
        if account.kind() == AccountKind::Unlocked {
            return Ok(());
        }
        self.adapter
            .provider()
            .anvil_stop_impersonating_account(account.address())
            .await
            .map_err(|e| cheat("anvil_stopImpersonatingAccount", e))
    }

    /// Writes one storage word of `contract`.
    pub async fn set_storage(&self, contract: Address, slot: B256, value: B256) -> Result<()> {
        self.adapter
            .provider()
            .anvil_set_storage_at(contract, slot.into(), value)
            .await
            .map_err(|e| cheat("anvil_setStorageAt", e))?;
        Ok(())
    }
}

fn cheat(method: &'static str, err: impl std::fmt::Display) -> ForkError {
    ForkError::CheatCode {
        method,
        reason: err.to_string(),
    }
}
