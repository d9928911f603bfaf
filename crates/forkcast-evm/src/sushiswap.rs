//! Sushiswap connector bindings.
//!
//! Typed spells for the connector's four methods, plus the pair lookup used
//! to observe a wallet's liquidity position.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use forkcast_core::address_book::NATIVE_TOKEN;

use crate::abi::{IConnectV2Sushiswap, IUniswapV2Factory};
use crate::adapter::{EvmAdapter, EvmAdapterError};

/// Name the connector is registered under in the worked example.
pub const CONNECTOR_NAME: &str = "Sushiswap-v1";

/// One call on the Sushiswap connector.
///
/// `unit_amount` values are prices scaled by 1e18 (token B per token A for
/// liquidity, sell token per buy token for trades). `get_id`/`set_id` are DSA
/// memory slots; zero disables them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SushiswapSpell {
    /// Add liquidity to the `token_a`/`token_b` pool.
    Deposit {
        token_a: Address,
        token_b: Address,
        amount_a: U256,
        unit_amount: U256,
        slippage: U256,
        get_id: U256,
        set_id: U256,
    },
    /// Burn `liquidity` pool tokens.
    Withdraw {
        token_a: Address,
        token_b: Address,
        liquidity: U256,
        unit_amount_a: U256,
        unit_amount_b: U256,
        get_id: U256,
        set_ids: [U256; 2],
    },
    /// Buy exactly `buy_amount` of `buy_token`, paying in `sell_token`.
    Buy {
        buy_token: Address,
        sell_token: Address,
        buy_amount: U256,
        unit_amount: U256,
        get_id: U256,
        set_id: U256,
    },
    /// Sell exactly `sell_amount` of `sell_token` for `buy_token`.
    Sell {
        buy_token: Address,
        sell_token: Address,
        sell_amount: U256,
        unit_amount: U256,
        get_id: U256,
        set_id: U256,
    },
}

impl SushiswapSpell {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::Buy { .. } => "buy",
            Self::Sell { .. } => "sell",
        }
    }

    /// ABI-encodes the call.
    pub fn calldata(&self) -> Bytes {
        let data = match self.clone() {
            Self::Deposit {
                token_a,
                token_b,
                amount_a,
                unit_amount,
                slippage,
                get_id,
                set_id,
            } => IConnectV2Sushiswap::depositCall {
                tokenA: token_a,
                tokenB: token_b,
                amtA: amount_a,
                unitAmt: unit_amount,
                slippage,
                getId: get_id,
                setId: set_id,
            }
            .abi_encode(),
            Self::Withdraw {
                token_a,
                token_b,
                liquidity,
                unit_amount_a,
                unit_amount_b,
                get_id,
                set_ids,
            } => IConnectV2Sushiswap::withdrawCall {
                tokenA: token_a,
                tokenB: token_b,
                uniAmt: liquidity,
                unitAmtA: unit_amount_a,
                unitAmtB: unit_amount_b,
                getId: get_id,
                setIds: set_ids.to_vec(),
            }
            .abi_encode(),
            Self::Buy {
                buy_token,
                sell_token,
                buy_amount,
                unit_amount,
                get_id,
                set_id,
            } => IConnectV2Sushiswap::buyCall {
                buyAddr: buy_token,
                sellAddr: sell_token,
                buyAmt: buy_amount,
                unitAmt: unit_amount,
                getId: get_id,
                setId: set_id,
            }
            .abi_encode(),
            Self::Sell {
                buy_token,
                sell_token,
                sell_amount,
                unit_amount,
                get_id,
                set_id,
            } => IConnectV2Sushiswap::sellCall {
                buyAddr: buy_token,
                sellAddr: sell_token,
                sellAmt: sell_amount,
                unitAmt: unit_amount,
                getId: get_id,
                setId: set_id,
            }
            .abi_encode(),
        };
        data.into()
    }
}

/// Address of the `token_a`/`token_b` pair; the native sentinel maps to
/// `wrapped_native`. Zero when the pool does not exist.
pub async fn pair_address(
    adapter: &EvmAdapter,
    factory: Address,
    wrapped_native: Address,
    token_a: Address,
    token_b: Address,
) -> Result<Address, EvmAdapterError> {
    let unwrap = |token: Address| {
        if token == NATIVE_TOKEN {
            wrapped_native
        } else {
            token
        }
    };
    adapter
        .call(
            factory,
            &IUniswapV2Factory::getPairCall {
                tokenA: unwrap(token_a),
                tokenB: unwrap(token_b),
            },
        )
        .await
}
