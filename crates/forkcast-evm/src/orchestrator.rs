//! Suite orchestration.
//!
//! A [`TestContext`] walks a suite through its phases in order:
//!
//! ```text
//! Idle -> ForkReset -> SuiteReady -> WalletReady -> scenarios...
//! ```
//!
//! Each phase method refuses to run before its prerequisite. Scenarios cast
//! one batch of spells from the wallet owner and then check balance
//! expectations against snapshots taken before the cast.

use std::collections::{BTreeMap, BTreeSet};

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::TransactionRequest;
use forkcast_core::config::{ConfigError, HarnessConfig};
use forkcast_core::journal::{Journal, JournalEntry, JournalError, Outcome};
use forkcast_core::{AddressBook, AddressBookError, ForkSpec};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::adapter::{EvmAdapter, EvmAdapterError};
use crate::deployer::{Connector, ConnectorArtifact, ConnectorDeployer, DeployError, DeployRequest};
use crate::fork::{ForkError, ForkManager};
use crate::registry::ConnectorRegistry;
use crate::seeder::{LiquiditySeeder, SeedError};
use crate::spells::{EncodeError, Spell, SpellEncoder};
use crate::sushiswap;
use crate::tx::{self, NodeAccount, ReceiptWait, TxError};
use crate::wallet::{Wallet, WalletError, WalletFactory};

const CONNECTORS_ENTRY: &str = "core.connectorsV2";
const INDEX_ENTRY: &str = "core.instaIndex";
const SUSHISWAP_FACTORY_ENTRY: &str = "sushiswap.factory";

/// Errors surfaced by a harness run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("fork failure: {0}")]
    Fork(#[from] ForkError),
    #[error(transparent)]
    Deploy(#[from] DeployError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error("encoding failed: {0}")]
    Encoding(#[from] EncodeError),
    #[error("scenario '{scenario}' reverted: {reason}")]
    ExecutionRevert {
        scenario: String,
        reason: String,
        tx_hash: Option<B256>,
    },
    #[error("no receipt for {tx_hash} after {attempts} polls")]
    ReceiptTimeout { tx_hash: B256, attempts: u32 },
    #[error("{operation} requires phase {expected:?}, context is in {actual:?}")]
    PhaseOrder {
        operation: &'static str,
        expected: Phase,
        actual: Phase,
    },
    #[error("scenario '{scenario}': expected {expectation}, balance went {before} -> {after}")]
    ExpectationFailed {
        scenario: String,
        expectation: String,
        before: U256,
        after: U256,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("tx error: {0}")]
    Tx(TxError),
    #[error("address book error: {0}")]
    AddressBook(#[from] AddressBookError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
    #[error("rpc error: {0}")]
    Rpc(#[from] EvmAdapterError),
}

impl HarnessError {
    fn from_cast(scenario: &str, err: TxError) -> Self {
        match err {
            TxError::Revert { reason, tx_hash } => Self::ExecutionRevert {
                scenario: scenario.to_string(),
                reason,
                tx_hash,
            },
            TxError::ReceiptTimeout { tx_hash, attempts } => {
                Self::ReceiptTimeout { tx_hash, attempts }
            }
            other => Self::Tx(other),
        }
    }
}

/// Result alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Where a [`TestContext`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    ForkReset,
    SuiteReady,
    WalletReady,
}

/// A balance the harness can observe on the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Asset {
    Native,
    /// Any ERC-20, including an LP pair token.
    Erc20(Address),
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Erc20(token) => write!(f, "erc20 {token}"),
        }
    }
}

/// A post-condition checked after a scenario's cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Satisfied by the cast confirming with a success status.
    DidNotRevert,
    BalanceIncreased(Asset),
    BalanceDecreased(Asset),
}

impl Expectation {
    fn asset(&self) -> Option<Asset> {
        match self {
            Expectation::DidNotRevert => None,
            Expectation::BalanceIncreased(asset) | Expectation::BalanceDecreased(asset) => {
                Some(*asset)
            }
        }
    }

    fn holds(&self, before: U256, after: U256) -> bool {
        match self {
            Expectation::DidNotRevert => true,
            Expectation::BalanceIncreased(_) => after > before,
            Expectation::BalanceDecreased(_) => after < before,
        }
    }
}

impl std::fmt::Display for Expectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expectation::DidNotRevert => write!(f, "no revert"),
            Expectation::BalanceIncreased(asset) => write!(f, "{asset} balance increase"),
            Expectation::BalanceDecreased(asset) => write!(f, "{asset} balance decrease"),
        }
    }
}

/// One cast and the expectations it must meet.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub spells: Vec<Spell>,
    /// Native value attached to the cast.
    pub value: U256,
    /// Referral origin passed to `cast`.
    pub origin: Address,
    pub expectations: Vec<Expectation>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spells: Vec::new(),
            value: U256::ZERO,
            origin: Address::ZERO,
            expectations: vec![Expectation::DidNotRevert],
        }
    }

    pub fn spell(mut self, spell: Spell) -> Self {
        self.spells.push(spell);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn origin(mut self, origin: Address) -> Self {
        self.origin = origin;
        self
    }

    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }

    fn observed_assets(&self) -> BTreeSet<Asset> {
        self.expectations.iter().filter_map(Expectation::asset).collect()
    }

    fn connector_names(&self) -> BTreeSet<&str> {
        self.spells.iter().map(|s| s.connector.as_str()).collect()
    }
}

/// A token amount to seed into a fresh wallet.
#[derive(Debug, Clone)]
pub struct Funding {
    pub symbol: String,
    pub amount: U256,
}

impl Funding {
    pub fn new(symbol: impl Into<String>, amount: U256) -> Self {
        Self {
            symbol: symbol.into(),
            amount,
        }
    }
}

/// Observed balance of one asset around a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub asset: Asset,
    pub before: U256,
    pub after: U256,
}

/// What a passing scenario did on chain.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub tx_hash: B256,
    pub gas_used: u64,
    pub changes: Vec<BalanceChange>,
}

/// Owns everything one suite needs and enforces phase order.
#[derive(Debug)]
pub struct TestContext {
    adapter: EvmAdapter,
    fork: ForkSpec,
    book: AddressBook,
    wait: ReceiptWait,
    journal: Option<Journal>,
    phase: Phase,
    registry: Option<ConnectorRegistry>,
    connector: Option<Connector>,
    wallet: Option<Wallet>,
}

impl TestContext {
    /// A context in [`Phase::Idle`]; [`reset_fork`](Self::reset_fork) must run first.
    pub fn new(adapter: EvmAdapter, fork: ForkSpec, book: AddressBook) -> Self {
        Self {
            adapter,
            fork,
            book,
            wait: ReceiptWait::default(),
            journal: None,
            phase: Phase::Idle,
            registry: None,
            connector: None,
            wallet: None,
        }
    }

    /// Builds a context from a loaded config, opening the journal if one is set.
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        let adapter = EvmAdapter::new(&config.node_url())?;
        let mut ctx = Self::new(adapter, config.fork_spec()?, config.address_book()?)
            .with_receipt_wait(ReceiptWait::from(&config.receipt));
        if let Some(path) = &config.journal_path {
            ctx = ctx.with_journal(Journal::open(path)?);
        }
        Ok(ctx)
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_receipt_wait(mut self, wait: ReceiptWait) -> Self {
        self.wait = wait;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn adapter(&self) -> &EvmAdapter {
        &self.adapter
    }

    pub fn address_book(&self) -> &AddressBook {
        &self.book
    }

    pub fn connector(&self) -> Option<&Connector> {
        self.connector.as_ref()
    }

    pub fn registry(&self) -> Option<&ConnectorRegistry> {
        self.registry.as_ref()
    }

    pub fn wallet(&self) -> Option<&Wallet> {
        self.wallet.as_ref()
    }

    /// Resets the node onto the pinned fork. Allowed from any phase; drops
    /// the connector and wallet of a previous suite.
    ///
    /// The node's state may already be replaced when a reset fails, so a
    /// failure also drops them and leaves the context in [`Phase::Idle`].
    pub async fn reset_fork(&mut self) -> Result<()> {
        let reset = ForkManager::new(&self.adapter).reset(&self.fork).await;

        self.registry = None;
        self.connector = None;
        self.wallet = None;
        self.phase = if reset.is_ok() {
            Phase::ForkReset
        } else {
            Phase::Idle
        };

        self.record(
            "fork_reset",
            json!({ "block": self.fork.block_number }),
            reset.as_ref().err().map(ToString::to_string),
        )?;
        Ok(reset?)
    }

    /// Checks the core contracts exist, then deploys `artifact` and enables
    /// it under `connector_name` as the index master.
    pub async fn setup_suite(
        &mut self,
        connector_name: &str,
        artifact: &ConnectorArtifact,
    ) -> Result<&Connector> {
        self.require("setup_suite", Phase::ForkReset)?;

        let outcome = self.deploy_connector(connector_name, artifact).await;
        self.record(
            "setup_suite",
            match &outcome {
                Ok((registry, connector)) => json!({
                    "connector": connector.name,
                    "address": connector.address.to_string(),
                    "registry": registry.address().to_string(),
                }),
                Err(_) => json!({ "connector": connector_name }),
            },
            outcome.as_ref().err().map(ToString::to_string),
        )?;
        let (registry, connector) = outcome?;

        info!(connector = %connector.name, address = %connector.address, "Connector address");
        self.registry = Some(registry);
        self.phase = Phase::SuiteReady;
        Ok(&*self.connector.insert(connector))
    }

    async fn deploy_connector(
        &self,
        connector_name: &str,
        artifact: &ConnectorArtifact,
    ) -> Result<(ConnectorRegistry, Connector)> {
        let registry_address = self.core_contract(CONNECTORS_ENTRY).await?;
        let index = self.core_contract(INDEX_ENTRY).await?;
        let registry = ConnectorRegistry::new(registry_address);

        let deployer = ConnectorDeployer::new(&self.adapter, self.wait);
        let master = deployer.master_signer(index).await?;
        let deployed = deployer
            .deploy_and_enable(DeployRequest {
                connector_name,
                artifact,
                signer: &master,
                connectors: &registry,
            })
            .await;
        if let Err(err) = ForkManager::new(&self.adapter)
            .stop_impersonating(master)
            .await
        {
            warn!(master = %master.address(), error = %err, "failed to stop impersonating master");
        }
        Ok((registry, deployed?))
    }

    /// Resolves an address-book entry and checks code is deployed there.
    async fn core_contract(&self, name: &str) -> Result<Address> {
        let address = self.book.resolve(name, self.book.network)?.address;
        if address == Address::ZERO {
            return Err(HarnessError::NotFound(format!("{name} resolves to the zero address")));
        }
        if self.adapter.get_code(address).await?.is_empty() {
            return Err(HarnessError::NotFound(format!(
                "no contract code for {name} at {address}"
            )));
        }
        Ok(address)
    }

    /// Builds a wallet for `owner` and seeds it. Native symbols are sent by
    /// the owner itself; everything else goes through the token's funding
    /// strategy. Building again replaces the current wallet.
    pub async fn setup_wallet(&mut self, owner: NodeAccount, funding: &[Funding]) -> Result<Wallet> {
        if self.phase < Phase::SuiteReady {
            return Err(HarnessError::PhaseOrder {
                operation: "setup_wallet",
                expected: Phase::SuiteReady,
                actual: self.phase,
            });
        }

        let outcome = self.build_and_fund(owner, funding).await;
        let funded: Vec<_> = funding
            .iter()
            .map(|f| json!({ "symbol": f.symbol, "amount": f.amount.to_string() }))
            .collect();
        self.record(
            "setup_wallet",
            json!({
                "owner": owner.address().to_string(),
                "wallet": outcome.as_ref().ok().map(|w| w.address.to_string()),
                "funding": funded,
            }),
            outcome.as_ref().err().map(ToString::to_string),
        )?;
        let wallet = outcome?;

        self.wallet = Some(wallet);
        self.phase = Phase::WalletReady;
        Ok(wallet)
    }

    async fn build_and_fund(&self, owner: NodeAccount, funding: &[Funding]) -> Result<Wallet> {
        let index = self.book.resolve(INDEX_ENTRY, self.book.network)?.address;
        let factory = WalletFactory::new(&self.adapter, index, self.wait);
        let wallet = factory.build(owner).await?;

        let seeder = LiquiditySeeder::new(&self.adapter, &self.book, owner, self.wait);
        for f in funding {
            if self.book.token(&f.symbol)?.is_native() {
                factory.fund_native(&wallet, f.amount).await?;
            } else {
                seeder.seed(&f.symbol, wallet.address, f.amount).await?;
            }
        }
        Ok(wallet)
    }

    /// LP token of the Sushiswap pool for `token_a`/`token_b`.
    pub async fn sushiswap_pair(&self, token_a: Address, token_b: Address) -> Result<Address> {
        let factory = self.book.resolve(SUSHISWAP_FACTORY_ENTRY, self.book.network)?.address;
        let wrapped = self.book.token("weth")?.address;
        let pair = sushiswap::pair_address(&self.adapter, factory, wrapped, token_a, token_b).await?;
        if pair == Address::ZERO {
            return Err(HarnessError::NotFound(format!(
                "no sushiswap pair for {token_a}/{token_b}"
            )));
        }
        Ok(pair)
    }

    /// Current wallet balance of `asset`.
    pub async fn balance_of(&self, asset: Asset) -> Result<U256> {
        let wallet = self.current_wallet("balance_of")?;
        let balance = match asset {
            Asset::Native => self.adapter.get_native_balance(wallet.address).await?,
            Asset::Erc20(token) => self.adapter.get_erc20_balance(token, wallet.address).await?,
        };
        Ok(balance)
    }

    /// Encodes and casts the scenario's spells, then checks its expectations.
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> Result<ScenarioReport> {
        self.require("run_scenario", Phase::WalletReady)?;

        let outcome = self.cast(scenario).await;
        let step = format!("scenario:{}", scenario.name);
        match &outcome {
            Ok(report) => {
                info!(scenario = %scenario.name, tx_hash = %report.tx_hash, gas_used = report.gas_used, "scenario passed");
                let changes: Vec<_> = report
                    .changes
                    .iter()
                    .map(|c| {
                        json!({
                            "asset": c.asset.to_string(),
                            "before": c.before.to_string(),
                            "after": c.after.to_string(),
                        })
                    })
                    .collect();
                self.record(
                    &step,
                    json!({ "tx_hash": report.tx_hash.to_string(), "changes": changes }),
                    None,
                )?;
            }
            Err(err) => {
                warn!(scenario = %scenario.name, error = %err, "scenario failed");
                self.record(&step, json!({}), Some(err.to_string()))?;
            }
        }
        outcome
    }

    async fn cast(&self, scenario: &Scenario) -> Result<ScenarioReport> {
        let wallet = self.current_wallet("run_scenario")?;
        let registry = self
            .registry
            .as_ref()
            .ok_or_else(|| HarnessError::NotFound("connector registry".into()))?;

        let snapshot = registry
            .snapshot(&self.adapter, scenario.connector_names())
            .await?;
        let batch = SpellEncoder::new(&snapshot).encode(&scenario.spells)?;

        let assets = scenario.observed_assets();
        let mut before = BTreeMap::new();
        for asset in &assets {
            before.insert(*asset, self.balance_of(*asset).await?);
        }

        let request = TransactionRequest::default()
            .to(wallet.address)
            .value(scenario.value)
            .input(batch.cast_calldata(scenario.origin).into());
        let receipt = tx::send_and_confirm(&self.adapter, &wallet.owner, request, &self.wait)
            .await
            .map_err(|e| HarnessError::from_cast(&scenario.name, e))?;

        let mut after = BTreeMap::new();
        for asset in &assets {
            after.insert(*asset, self.balance_of(*asset).await?);
        }
        let changes = evaluate(scenario, &before, &after)?;

        Ok(ScenarioReport {
            name: scenario.name.clone(),
            tx_hash: receipt.transaction_hash,
            gas_used: receipt.gas_used,
            changes,
        })
    }

    fn current_wallet(&self, operation: &'static str) -> Result<Wallet> {
        self.wallet.ok_or(HarnessError::PhaseOrder {
            operation,
            expected: Phase::WalletReady,
            actual: self.phase,
        })
    }

    fn require(&self, operation: &'static str, expected: Phase) -> Result<()> {
        if self.phase != expected {
            return Err(HarnessError::PhaseOrder {
                operation,
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn record(
        &mut self,
        step: &str,
        details: serde_json::Value,
        error: Option<String>,
    ) -> Result<()> {
        let Some(journal) = self.journal.as_mut() else {
            return Ok(());
        };
        let entry = match error {
            None => JournalEntry::new(step, details, Outcome::Passed),
            Some(err) => JournalEntry::new(
                step,
                json!({ "details": details, "error": err }),
                Outcome::Failed,
            ),
        };
        journal.record(entry)?;
        Ok(())
    }
}

/// Checks every expectation against the before/after snapshots.
fn evaluate(
    scenario: &Scenario,
    before: &BTreeMap<Asset, U256>,
    after: &BTreeMap<Asset, U256>,
) -> Result<Vec<BalanceChange>> {
    let mut changes = Vec::new();
    for expectation in &scenario.expectations {
        let Some(asset) = expectation.asset() else {
            continue;
        };
        let b = before.get(&asset).copied().unwrap_or_default();
        let a = after.get(&asset).copied().unwrap_or_default();
        if !expectation.holds(b, a) {
            return Err(HarnessError::ExpectationFailed {
                scenario: scenario.name.clone(),
                expectation: expectation.to_string(),
                before: b,
                after: a,
            });
        }
        changes.push(BalanceChange {
            asset,
            before: b,
            after: a,
        });
    }
    Ok(changes)
}
