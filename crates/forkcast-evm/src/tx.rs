//! Transaction submission and receipt polling.
//!
//! The dev node signs for every sender the harness uses: its own unlocked
//! dev accounts and any account it has been told to impersonate. Nothing is
//! retried; a revert surfaces with the reason the node reported.

use std::time::Duration;

use alloy::primitives::{Address, B256};
use alloy::providers::Provider;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::TransportError;
use thiserror::Error;
use tracing::debug;

use crate::adapter::EvmAdapter;

/// Errors from transaction operations.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("execution reverted: {reason}")]
    Revert {
        reason: String,
        tx_hash: Option<B256>,
    },
    #[error("RPC send error: {0}")]
    Send(String),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("no receipt for {tx_hash} after {attempts} polls")]
    ReceiptTimeout { tx_hash: B256, attempts: u32 },
}

impl TxError {
    /// Classifies a send-time RPC error. Gas estimation runs the call, so
    /// reverts usually show up here rather than in a receipt.
    fn from_send(err: TransportError) -> Self {
        if let Some(payload) = err.as_error_resp() {
            if let Some(data) = payload.as_revert_data() {
                let reason = alloy::sol_types::decode_revert_reason(&data).unwrap_or_else(|| {
                    format!("{} (data 0x{})", payload.message, hex::encode(&data))
                });
                return TxError::Revert {
                    reason,
                    tx_hash: None,
                };
            }
            if payload.message.contains("revert") {
                return TxError::Revert {
                    reason: payload.message.to_string(),
                    tx_hash: None,
                };
            }
        }
        TxError::Send(err.to_string())
    }
}

/// Result alias for transaction operations.
pub type Result<T> = std::result::Result<T, TxError>;

/// How the node is allowed to sign for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    /// One of the node's own unlocked dev accounts.
    Unlocked,
    /// An account the node impersonates (`anvil_impersonateAccount`).
    Impersonated,
}

/// An account the dev node will send transactions for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAccount {
    address: Address,
    kind: AccountKind,
}

impl NodeAccount {
    /// A dev account the node keeps unlocked.
    pub fn unlocked(address: Address) -> Self {
        Self {
            address,
            kind: AccountKind::Unlocked,
        }
    }

    /// An account impersonation has already been enabled for.
    pub fn impersonated(address: Address) -> Self {
        Self {
            address,
            kind: AccountKind::Impersonated,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }
}

/// Receipt polling budget. `max_attempts: None` polls until the node answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptWait {
    pub poll_interval: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for ReceiptWait {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_attempts: None,
        }
    }
}

impl From<&forkcast_core::config::ReceiptConfig> for ReceiptWait {
    fn from(config: &forkcast_core::config::ReceiptConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_attempts: config.max_attempts,
        }
    }
}

/// Submits `tx` from `from` without waiting for inclusion.
pub async fn submit(adapter: &EvmAdapter, from: &NodeAccount, tx: TransactionRequest) -> Result<B256> {
    let tx = tx.from(from.address());
    let pending = adapter
        .provider()
        .send_transaction(tx)
        .await
        .map_err(TxError::from_send)?;
    let tx_hash = *pending.tx_hash();
    debug!(%tx_hash, from = %from.address(), "transaction submitted");
    Ok(tx_hash)
}

/// Polls for the receipt of `tx_hash` within the given budget.
pub async fn wait_for_receipt(
    adapter: &EvmAdapter,
    tx_hash: B256,
    wait: &ReceiptWait,
) -> Result<TransactionReceipt> {
    let mut attempts = 0u32;
    loop {
        let receipt = adapter
            .provider()
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| TxError::Rpc(e.to_string()))?;
        if let Some(receipt) = receipt {
            return Ok(receipt);
        }
        attempts += 1;
        if wait.max_attempts.is_some_and(|max| attempts >= max) {
            return Err(TxError::ReceiptTimeout { tx_hash, attempts });
        }
        tokio::time::sleep(wait.poll_interval).await;
    }
}

/// Submits `tx`, waits for its receipt and fails if it reverted.
pub async fn send_and_confirm(
    adapter: &EvmAdapter,
    from: &NodeAccount,
    tx: TransactionRequest,
    wait: &ReceiptWait,
) -> Result<TransactionReceipt> {
    let tx_hash = submit(adapter, from, tx).await?;
    let receipt = wait_for_receipt(adapter, tx_hash, wait).await?;
    if !receipt.status() {
        return Err(TxError::Revert {
            reason: "transaction reverted without a reason".to_string(),
            tx_hash: Some(tx_hash),
        });
    }
    debug!(%tx_hash, gas_used = receipt.gas_used, "transaction confirmed");
    Ok(receipt)
}
