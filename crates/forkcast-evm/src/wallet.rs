//! DSA wallet creation and native funding.

use alloy::primitives::{Address, U256};
use alloy::rpc::types::{Log, TransactionRequest};
use alloy::sol_types::SolCall;
use thiserror::Error;
use tracing::info;

use crate::abi::IInstaIndex;
use crate::adapter::{EvmAdapter, EvmAdapterError};
use crate::tx::{self, NodeAccount, ReceiptWait, TxError};

/// DSA account implementation version built by default.
pub const ACCOUNT_VERSION_V2: u64 = 2;

/// Errors from wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet deployment failed: {0}")]
    Deployment(String),
    #[error("wallet {wallet} holds {actual} native after funding, expected at least {expected}")]
    Underfunded {
        wallet: Address,
        expected: U256,
        actual: U256,
    },
    #[error("tx error: {0}")]
    Tx(#[from] TxError),
    #[error("adapter error: {0}")]
    Adapter(#[from] EvmAdapterError),
}

/// Result alias for wallet operations.
pub type Result<T> = std::result::Result<T, WalletError>;

/// A DSA smart-contract wallet and the account authorised to cast on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wallet {
    pub address: Address,
    pub owner: NodeAccount,
}

/// Builds wallets through `InstaIndex.build`.
#[derive(Debug, Clone, Copy)]
pub struct WalletFactory<'a> {
    adapter: &'a EvmAdapter,
    index: Address,
    wait: ReceiptWait,
}

impl<'a> WalletFactory<'a> {
    pub fn new(adapter: &'a EvmAdapter, index: Address, wait: ReceiptWait) -> Self {
        Self {
            adapter,
            index,
            wait,
        }
    }

    /// Deploys a v2 wallet with `owner` as its sole authority.
    pub async fn build(&self, owner: NodeAccount) -> Result<Wallet> {
        let data = IInstaIndex::buildCall {
            owner: owner.address(),
            accountVersion: U256::from(ACCOUNT_VERSION_V2),
            origin: Address::ZERO,
        }
        .abi_encode();
        let request = TransactionRequest::default()
            .to(self.index)
            .input(data.into());

        let receipt = tx::send_and_confirm(self.adapter, &owner, request, &self.wait)
            .await
            .map_err(|e| WalletError::Deployment(e.to_string()))?;
        let address = created_account(receipt.inner.logs(), owner.address())?;

        info!(wallet = %address, owner = %owner.address(), "DSA wallet built");
        Ok(Wallet { address, owner })
    }

    /// Sends `amount` of native currency from the owner into the wallet and
    /// checks the wallet now holds at least that much.
    pub async fn fund_native(&self, wallet: &Wallet, amount: U256) -> Result<()> {
        let request = TransactionRequest::default()
            .to(wallet.address)
            .value(amount);
        tx::send_and_confirm(self.adapter, &wallet.owner, request, &self.wait).await?;

        let balance = self.adapter.get_native_balance(wallet.address).await?;
        if balance < amount {
            return Err(WalletError::Underfunded {
                wallet: wallet.address,
                expected: amount,
                actual: balance,
            });
        }
        Ok(())
    }
}

/// The account `LogAccountCreated` reports for `owner`; missing or zero is a
/// deployment failure.
fn created_account(logs: &[Log], owner: Address) -> Result<Address> {
    let account = logs
        .iter()
        .filter_map(|log| log.log_decode::<IInstaIndex::LogAccountCreated>().ok())
        .map(|log| log.inner.data)
        .find(|event| event.owner == owner)
        .map(|event| event.account)
        .ok_or_else(|| WalletError::Deployment("no LogAccountCreated event for owner".into()))?;
    if account == Address::ZERO {
        return Err(WalletError::Deployment("index returned the zero address".into()));
    }
    Ok(account)
}
