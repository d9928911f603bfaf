//! Integration tests for forkcast.
//!
//! Fork tests use **testcontainers** to start a Docker-based Anvil node and
//! reset it onto Arbitrum One. They need:
//!
//! - `ARBITRUM_RPC_URL`: an archive RPC endpoint for the fork
//! - `FORKCAST_SUSHISWAP_ARTIFACT`: path to the compiled
//!   `ConnectV2SushiswapArbitrum` artifact (Hardhat or Foundry JSON)
//!
//! ```bash
//! # Run everything (Docker must be available):
//! cargo test -p forkcast-integration-tests -- --include-ignored
//! ```

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use alloy::primitives::{address, Address, U256};
    use anyhow::Context;
    use forkcast_core::address_book::NATIVE_TOKEN;
    use forkcast_core::config::HarnessConfig;
    use forkcast_core::journal::Journal;
    use forkcast_core::{AddressBook, ForkSpec, Network};
    use forkcast_evm::deployer::{ConnectorArtifact, ConnectorDeployer, DeployError, DeployRequest};
    use forkcast_evm::orchestrator::{
        Asset, Expectation, Funding, HarnessError, Phase, Scenario, TestContext,
    };
    use forkcast_evm::spells::{EncodeError, Spell, SpellEncoder};
    use forkcast_evm::sushiswap::{SushiswapSpell, CONNECTOR_NAME};
    use forkcast_evm::{EvmAdapter, ForkManager, NodeAccount, RegistrySnapshot};
    use testcontainers::{
        core::{IntoContainerPort, WaitFor},
        runners::SyncRunner,
        Container, GenericImage, ImageExt,
    };
    use tracing_subscriber::EnvFilter;

    const FORK_BLOCK: u64 = 13005785;
    const DAI: Address = address!("da10009cbd5d07dd0cecc66161fc93d7c9000da1");

    // Anvil default accounts 0 and 1.
    const OWNER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const ORIGIN: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Spins up a Docker Anvil container and returns `(container, rpc_url)`.
    /// The container is dropped (and removed) when it goes out of scope.
    fn start_anvil() -> (Container<GenericImage>, String) {
        let image = GenericImage::new("ghcr.io/foundry-rs/foundry", "latest")
            .with_exposed_port(8545.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Listening on"))
            .with_entrypoint("anvil")
            .with_cmd(vec![
                "--host".to_string(),
                "0.0.0.0".to_string(),
                "--port".to_string(),
                "8545".to_string(),
            ]);

        let container = image.start().expect("Docker must be available to run Anvil tests");
        let host_port = container.get_host_port_ipv4(8545).expect("failed to get mapped port");
        let url = format!("http://127.0.0.1:{}", host_port);
        (container, url)
    }

    fn env_fork() -> Option<(String, PathBuf)> {
        let rpc_url = std::env::var("ARBITRUM_RPC_URL").ok()?;
        let artifact = std::env::var("FORKCAST_SUSHISWAP_ARTIFACT").ok()?;
        Some((rpc_url, PathBuf::from(artifact)))
    }

    fn deposit_spell() -> SushiswapSpell {
        SushiswapSpell::Deposit {
            token_a: NATIVE_TOKEN,
            token_b: DAI,
            amount_a: ether(1) / U256::from(10u64),
            unit_amount: ether(4000),
            slippage: ether(1) / U256::from(2u64),
            get_id: U256::ZERO,
            set_id: U256::ZERO,
        }
    }

    // -----------------------------------------------------------------
    // test_sushiswap_suite: Arbitrum fork via testcontainers
    // -----------------------------------------------------------------

    #[test]
    #[ignore]
    fn test_sushiswap_suite() {
        let Some((rpc_url, artifact_path)) = env_fork() else {
            eprintln!("skipping: set ARBITRUM_RPC_URL and FORKCAST_SUSHISWAP_ARTIFACT to run");
            return;
        };
        init_tracing();
        let (_anvil, anvil_url) = start_anvil();
        let journal_dir = tempfile::tempdir().unwrap();
        let journal_path = journal_dir.path().join("sushiswap.jsonl");

        let rt = tokio::runtime::Runtime::new().unwrap();
        let result: anyhow::Result<()> = rt.block_on(async {
            let adapter = EvmAdapter::new(&anvil_url).context("connect to Anvil")?;
            let fork = ForkSpec {
                rpc_url,
                block_number: FORK_BLOCK,
            };
            let book = AddressBook::builtin(Network::Arbitrum)?;
            let mut ctx =
                TestContext::new(adapter, fork, book).with_journal(Journal::open(&journal_path)?);

            // Suite setup
            ctx.reset_fork().await.context("fork reset")?;
            assert_eq!(ctx.adapter().get_block_number().await?, FORK_BLOCK);

            let artifact = ConnectorArtifact::from_file(&artifact_path)
                .with_context(|| format!("load {}", artifact_path.display()))?;
            let connector = ctx
                .setup_suite(CONNECTOR_NAME, &artifact)
                .await
                .context("deploy and enable connector")?
                .clone();
            assert_ne!(connector.address, Address::ZERO);
            let registry = *ctx.registry().unwrap();
            assert_ne!(registry.address(), Address::ZERO);
            assert_eq!(
                registry.resolve(ctx.adapter(), CONNECTOR_NAME).await.unwrap(),
                connector.address
            );

            // Enabling the same name twice is rejected before deployment.
            let deployer = ConnectorDeployer::new(ctx.adapter(), Default::default());
            let err = deployer
                .deploy_and_enable(DeployRequest {
                    connector_name: CONNECTOR_NAME,
                    artifact: &artifact,
                    signer: &NodeAccount::unlocked(OWNER),
                    connectors: &registry,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, DeployError::AlreadyRegistered(name) if name == CONNECTOR_NAME));

            // DSA wallet setup
            ForkManager::new(ctx.adapter())
                .set_native_balance(OWNER, ether(1000))
                .await
                .unwrap();
            let owner = NodeAccount::unlocked(OWNER);
            let wallet = ctx
                .setup_wallet(
                    owner,
                    &[Funding::new("eth", ether(10)), Funding::new("dai", ether(10_000))],
                )
                .await
                .expect("build and fund wallet");
            assert_ne!(wallet.address, Address::ZERO);
            assert!(ctx.balance_of(Asset::Native).await.unwrap() >= ether(10));
            assert!(ctx.balance_of(Asset::Erc20(DAI)).await.unwrap() >= ether(10_000));

            // Rebuilding replaces the wallet; USDT uses its own 6 decimals.
            let usdt = ctx.address_book().token("usdt").unwrap().address;
            let wallet = ctx
                .setup_wallet(
                    owner,
                    &[
                        Funding::new("eth", ether(10)),
                        Funding::new("dai", ether(10_000)),
                        Funding::new("usdt", U256::from(10_000_000_000u64)),
                    ],
                )
                .await
                .expect("build and fund second wallet");
            assert_eq!(ctx.wallet().unwrap().address, wallet.address);
            assert_eq!(ctx.phase(), Phase::WalletReady);
            assert!(ctx.balance_of(Asset::Erc20(usdt)).await.unwrap() >= U256::from(10_000_000_000u64));

            // Main
            let lp = Asset::Erc20(ctx.sushiswap_pair(NATIVE_TOKEN, DAI).await.unwrap());

            let deposit = Scenario::new("deposit")
                .spell(Spell::sushiswap(CONNECTOR_NAME, deposit_spell()))
                .origin(ORIGIN)
                .expect(Expectation::BalanceIncreased(lp))
                .expect(Expectation::BalanceDecreased(Asset::Erc20(DAI)));
            let report = ctx.run_scenario(&deposit).await.expect("deposit");
            assert!(report.gas_used > 0);

            let withdraw = Scenario::new("withdraw")
                .spell(Spell::sushiswap(
                    CONNECTOR_NAME,
                    SushiswapSpell::Withdraw {
                        token_a: NATIVE_TOKEN,
                        token_b: DAI,
                        liquidity: ether(1) / U256::from(10u64),
                        unit_amount_a: U256::ZERO,
                        unit_amount_b: U256::ZERO,
                        get_id: U256::ZERO,
                        set_ids: [U256::ZERO; 2],
                    },
                ))
                .origin(ORIGIN)
                .expect(Expectation::BalanceDecreased(lp));
            ctx.run_scenario(&withdraw).await.expect("withdraw");

            let buy = Scenario::new("buy")
                .spell(Spell::sushiswap(
                    CONNECTOR_NAME,
                    SushiswapSpell::Buy {
                        buy_token: NATIVE_TOKEN,
                        sell_token: DAI,
                        buy_amount: ether(1) / U256::from(10u64),
                        unit_amount: ether(4000),
                        get_id: U256::ZERO,
                        set_id: U256::ZERO,
                    },
                ))
                .origin(ORIGIN)
                .expect(Expectation::BalanceIncreased(Asset::Native))
                .expect(Expectation::BalanceDecreased(Asset::Erc20(DAI)));
            ctx.run_scenario(&buy).await.expect("buy");

            // A spell for a connector that was never enabled fails before submission.
            let unknown = Scenario::new("unknown-connector")
                .spell(Spell::sushiswap("Sushiswap-v9", deposit_spell()))
                .origin(ORIGIN);
            let err = ctx.run_scenario(&unknown).await.unwrap_err();
            assert!(matches!(
                err,
                HarnessError::Encoding(EncodeError::UnknownConnector { .. })
            ));
            Ok(())
        });
        result.unwrap();

        let journal = std::fs::read_to_string(&journal_path).unwrap();
        let steps: Vec<serde_json::Value> = journal
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let outcome = |step: &str| {
            steps
                .iter()
                .find(|e| e["step"] == step)
                .map(|e| e["outcome"].as_str().unwrap_or_default().to_string())
        };
        assert_eq!(outcome("fork_reset").as_deref(), Some("passed"));
        assert_eq!(outcome("scenario:deposit").as_deref(), Some("passed"));
        assert_eq!(outcome("scenario:unknown-connector").as_deref(), Some("failed"));
    }

    // -----------------------------------------------------------------
    // test_unregistered_connector_rejected: no Anvil needed
    // -----------------------------------------------------------------

    #[test]
    fn test_unregistered_connector_rejected() {
        let registry: RegistrySnapshot = [(CONNECTOR_NAME, Address::with_last_byte(1))]
            .into_iter()
            .collect();
        let encoder = SpellEncoder::new(&registry);

        let ok = encoder
            .encode(&[Spell::sushiswap(CONNECTOR_NAME, deposit_spell())])
            .unwrap();
        assert_eq!(ok.targets, vec![CONNECTOR_NAME.to_string()]);

        let err = encoder
            .encode(&[
                Spell::sushiswap(CONNECTOR_NAME, deposit_spell()),
                Spell::sushiswap("Sushiswap-v2", deposit_spell()),
            ])
            .unwrap_err();
        match err {
            EncodeError::UnknownConnector { index, connector } => {
                assert_eq!(index, 1);
                assert_eq!(connector, "Sushiswap-v2");
            }
            other => panic!("expected UnknownConnector, got {other:?}"),
        }
    }

    // -----------------------------------------------------------------
    // test_context_from_config: config file + phase order, no Anvil needed
    // -----------------------------------------------------------------

    #[test]
    fn test_context_from_config() {
        let tmp = tempfile::tempdir().unwrap();
        let journal_path = tmp.path().join("runs").join("journal.jsonl");
        let config_path = tmp.path().join("forkcast.yaml");
        std::fs::write(
            &config_path,
            format!(
                r#"
network: 42161
fork:
  rpc_url_env: FORKCAST_TEST_UNSET_RPC_URL
  rpc_url: "https://arb1.example.org"
  block_number: {FORK_BLOCK}
node_url: "http://127.0.0.1:1"
receipt:
  poll_interval_ms: 100
  max_attempts: 20
journal_path: "{}"
"#,
                journal_path.display()
            ),
        )
        .unwrap();

        let config = HarnessConfig::from_file(&config_path).unwrap();
        let mut ctx = TestContext::from_config(&config).unwrap();
        assert_eq!(ctx.phase(), Phase::Idle);
        assert_eq!(ctx.address_book().network, Network::Arbitrum);
        assert!(journal_path.exists());

        let rt = tokio::runtime::Runtime::new().unwrap();
        let err = rt
            .block_on(ctx.setup_suite(
                CONNECTOR_NAME,
                &ConnectorArtifact::new(Default::default(), vec![0x60, 0x00].into()).unwrap(),
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::PhaseOrder {
                expected: Phase::ForkReset,
                actual: Phase::Idle,
                ..
            }
        ));
    }
}
