//! # forkcast-evm
//!
//! Drives a local dev node forked from a live chain: resets the fork,
//! deploys and registers connectors, builds and funds DSA wallets, and casts
//! spells through them.
//!
//! ## Modules
//!
//! - [`abi`]: contract bindings using alloy's `sol!` macro
//! - [`adapter`]: JSON-RPC adapter for reading chain state
//! - [`tx`]: sending as node accounts and polling receipts
//! - [`fork`]: fork reset and cheat codes
//! - [`registry`]: the connector registry and its snapshots
//! - [`deployer`]: connector deployment and enablement
//! - [`wallet`]: DSA wallet creation
//! - [`seeder`]: token funding strategies
//! - [`sushiswap`]: typed Sushiswap connector spells
//! - [`spells`]: spell batch encoding
//! - [`orchestrator`]: the phased [`TestContext`]

pub mod abi;
pub mod adapter;
pub mod deployer;
pub mod fork;
pub mod orchestrator;
pub mod registry;
pub mod seeder;
pub mod spells;
pub mod sushiswap;
pub mod tx;
pub mod wallet;

pub use adapter::{EvmAdapter, EvmAdapterError};
pub use deployer::{Connector, ConnectorArtifact, ConnectorDeployer, DeployError};
pub use fork::{ForkError, ForkManager};
pub use orchestrator::{
    Asset, Expectation, Funding, HarnessError, Phase, Scenario, ScenarioReport, TestContext,
};
pub use registry::{ConnectorRegistry, RegistrySnapshot};
pub use seeder::{LiquiditySeeder, SeedError};
pub use spells::{EncodeError, EncodedBatch, Spell, SpellEncoder};
pub use sushiswap::SushiswapSpell;
pub use tx::{NodeAccount, ReceiptWait, TxError};
pub use wallet::{Wallet, WalletFactory};

// Re-export alloy primitives used in the public API.
pub use alloy::primitives::{Address, U256};
