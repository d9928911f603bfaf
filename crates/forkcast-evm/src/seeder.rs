//! Token funding on a fork.
//!
//! Each token in the address book names exactly one acquisition strategy.
//! The seeder runs that strategy and then checks the wallet balance grew by
//! the requested amount; it never falls back to another strategy.

use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::{SolCall, SolValue};
use forkcast_core::{AddressBook, AddressBookError, FundingStrategy, TokenEntry};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::abi::{IWrappedNative, IERC20};
use crate::adapter::{EvmAdapter, EvmAdapterError};
use crate::fork::{ForkError, ForkManager};
use crate::tx::{self, NodeAccount, ReceiptWait, TxError};

/// Native balance given to an impersonated holder so it can pay gas.
const HOLDER_GAS_FUNDS: u128 = 1_000_000_000_000_000_000;

/// Errors from liquidity seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("insufficient liquidity for {symbol}: requested {requested}, acquired {acquired}")]
    InsufficientLiquidity {
        symbol: String,
        requested: U256,
        acquired: U256,
    },
    #[error("address book error: {0}")]
    AddressBook(#[from] AddressBookError),
    #[error("tx error: {0}")]
    Tx(#[from] TxError),
    #[error("adapter error: {0}")]
    Adapter(#[from] EvmAdapterError),
    #[error("fork error: {0}")]
    Fork(#[from] ForkError),
}

/// Result alias for seeding operations.
pub type Result<T> = std::result::Result<T, SeedError>;

/// Acquires token balances for wallets.
#[derive(Debug, Clone, Copy)]
pub struct LiquiditySeeder<'a> {
    adapter: &'a EvmAdapter,
    book: &'a AddressBook,
    /// Pays for native transfers and wrapping.
    funder: NodeAccount,
    wait: ReceiptWait,
}

impl<'a> LiquiditySeeder<'a> {
    pub fn new(
        adapter: &'a EvmAdapter,
        book: &'a AddressBook,
        funder: NodeAccount,
        wait: ReceiptWait,
    ) -> Self {
        Self {
            adapter,
            book,
            funder,
            wait,
        }
    }

    /// Moves `amount` of `symbol` into `wallet`.
    pub async fn seed(&self, symbol: &str, wallet: Address, amount: U256) -> Result<()> {
        let token = self.book.token(symbol)?;
        let before = self.balance(token, wallet).await?;

        match &token.funding {
            FundingStrategy::Native => self.transfer_native(wallet, amount).await?,
            FundingStrategy::WrapNative => self.wrap_and_transfer(token, wallet, amount).await?,
            FundingStrategy::Whale { holder } => {
                self.transfer_from_holder(symbol, token, *holder, wallet, amount)
                    .await?
            }
            FundingStrategy::StorageSlot { slot } => {
                self.write_balance_slot(token, *slot, wallet, before.saturating_add(amount))
                    .await?
            }
        }

        let after = self.balance(token, wallet).await?;
        let acquired = after.saturating_sub(before);
        if acquired < amount {
            return Err(SeedError::InsufficientLiquidity {
                symbol: symbol.to_string(),
                requested: amount,
                acquired,
            });
        }

        info!(%symbol, %wallet, %amount, "wallet seeded");
        Ok(())
    }

    async fn balance(&self, token: &TokenEntry, owner: Address) -> Result<U256> {
        let balance = if token.is_native() {
            self.adapter.get_native_balance(owner).await?
        } else {
            self.adapter.get_erc20_balance(token.address, owner).await?
        };
        Ok(balance)
    }

    async fn transfer_native(&self, to: Address, amount: U256) -> Result<()> {
        let request = TransactionRequest::default().to(to).value(amount);
        tx::send_and_confirm(self.adapter, &self.funder, request, &self.wait).await?;
        Ok(())
    }

    async fn wrap_and_transfer(&self, token: &TokenEntry, to: Address, amount: U256) -> Result<()> {
        let wrap = TransactionRequest::default()
            .to(token.address)
            .value(amount)
            .input(IWrappedNative::depositCall {}.abi_encode().into());
        tx::send_and_confirm(self.adapter, &self.funder, wrap, &self.wait).await?;
        self.transfer_erc20(&self.funder, token.address, to, amount)
            .await
    }

    async fn transfer_from_holder(
        &self,
        symbol: &str,
        token: &TokenEntry,
        holder: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        let available = self.adapter.get_erc20_balance(token.address, holder).await?;
        if available < amount {
            return Err(SeedError::InsufficientLiquidity {
                symbol: symbol.to_string(),
                requested: amount,
                acquired: U256::ZERO,
            });
        }

        let fork = ForkManager::new(self.adapter);
        let gas = U256::from(HOLDER_GAS_FUNDS);
        if self.adapter.get_native_balance(holder).await? < gas {
            fork.set_native_balance(holder, gas).await?;
        }
        let whale = fork.impersonate(holder).await?;
        let transferred = self.transfer_erc20(&whale, token.address, to, amount).await;
        if let Err(err) = fork.stop_impersonating(whale).await {
            warn!(%holder, error = %err, "failed to stop impersonating holder");
        }
        transferred
    }

    async fn write_balance_slot(
        &self,
        token: &TokenEntry,
        slot: u64,
        owner: Address,
        balance: U256,
    ) -> Result<()> {
        let key = balance_slot_key(owner, slot);
        debug!(token = %token.address, %owner, slot, "writing balanceOf slot");
        ForkManager::new(self.adapter)
            .set_storage(token.address, key, B256::from(balance))
            .await?;
        Ok(())
    }

    async fn transfer_erc20(
        &self,
        from: &NodeAccount,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        let data = IERC20::transferCall { to, amount }.abi_encode();
        let request = TransactionRequest::default().to(token).input(data.into());
        tx::send_and_confirm(self.adapter, from, request, &self.wait).await?;
        Ok(())
    }
}

/// Storage key of `balanceOf[owner]` for a mapping declared at `slot`.
pub fn balance_slot_key(owner: Address, slot: u64) -> B256 {
    keccak256((owner, U256::from(slot)).abi_encode())
}
