//! Connector deployment and registration.
//!
//! Deploys a compiled connector artifact and enables it on the registry
//! under a name, acting as the registry's master.

use std::path::Path;
use std::sync::Arc;

use alloy::json_abi::{ContractObject, JsonAbi};
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use thiserror::Error;
use tracing::info;

use crate::abi::IInstaIndex;
use crate::adapter::{EvmAdapter, EvmAdapterError};
use crate::fork::{ForkError, ForkManager};
use crate::registry::ConnectorRegistry;
use crate::tx::{self, NodeAccount, ReceiptWait, TxError};

/// Errors from loading artifacts, deploying and registering connectors.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("invalid artifact: {0}")]
    Artifact(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("deployment of '{name}' failed: {reason}")]
    Deployment { name: String, reason: String },
    #[error("registering '{name}' failed: {reason}")]
    Registration { name: String, reason: String },
    #[error("connector '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("adapter error: {0}")]
    Adapter(#[from] EvmAdapterError),
    #[error("fork error: {0}")]
    Fork(#[from] ForkError),
}

/// 10 native units, enough gas for deployment and registration.
const MASTER_GAS_FUNDS: u128 = 10_000_000_000_000_000_000;

/// Result alias for deployment operations.
pub type Result<T> = std::result::Result<T, DeployError>;

/// Compiled connector: ABI plus creation bytecode.
///
/// Reads Hardhat and Foundry artifact JSON alike.
#[derive(Debug, Clone)]
pub struct ConnectorArtifact {
    abi: Arc<JsonAbi>,
    bytecode: Bytes,
}

impl ConnectorArtifact {
    pub fn new(abi: JsonAbi, bytecode: Bytes) -> Result<Self> {
        if bytecode.is_empty() {
            return Err(DeployError::Artifact("empty creation bytecode".into()));
        }
        Ok(Self {
            abi: Arc::new(abi),
            bytecode,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let object: ContractObject =
            serde_json::from_str(json).map_err(|e| DeployError::Artifact(e.to_string()))?;
        let abi = object
            .abi
            .ok_or_else(|| DeployError::Artifact("missing abi".into()))?;
        let bytecode = object
            .bytecode
            .ok_or_else(|| DeployError::Artifact("missing bytecode".into()))?;
        Self::new(abi, bytecode)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn abi(&self) -> &Arc<JsonAbi> {
        &self.abi
    }

    pub fn bytecode(&self) -> &Bytes {
        &self.bytecode
    }
}

/// A deployed, registered connector.
#[derive(Debug, Clone)]
pub struct Connector {
    pub name: String,
    pub address: Address,
    pub abi: Arc<JsonAbi>,
}

/// Inputs for [`ConnectorDeployer::deploy_and_enable`].
#[derive(Debug)]
pub struct DeployRequest<'a> {
    pub connector_name: &'a str,
    pub artifact: &'a ConnectorArtifact,
    /// Must be the registry's master.
    pub signer: &'a NodeAccount,
    pub connectors: &'a ConnectorRegistry,
}

/// Deploys connectors and enables them on a registry.
#[derive(Debug, Clone, Copy)]
pub struct ConnectorDeployer<'a> {
    adapter: &'a EvmAdapter,
    wait: ReceiptWait,
}

impl<'a> ConnectorDeployer<'a> {
    pub fn new(adapter: &'a EvmAdapter, wait: ReceiptWait) -> Self {
        Self { adapter, wait }
    }

    /// Impersonates the index's master key and funds it for gas.
    pub async fn master_signer(&self, index: Address) -> Result<NodeAccount> {
        let master = self.adapter.call(index, &IInstaIndex::masterCall {}).await?;
        let fork = ForkManager::new(self.adapter);
        let signer = fork.impersonate(master).await?;
        fork.set_native_balance(master, U256::from(MASTER_GAS_FUNDS))
            .await?;
        info!(%master, "master signer ready");
        Ok(signer)
    }

    /// Deploys the artifact and registers it under `connector_name`.
    ///
    /// Not idempotent: a name that is already registered is rejected with
    /// [`DeployError::AlreadyRegistered`] before anything is deployed.
    pub async fn deploy_and_enable(&self, req: DeployRequest<'_>) -> Result<Connector> {
        let name = req.connector_name.to_string();
        let (registered, _) = req
            .connectors
            .is_connectors(self.adapter, std::slice::from_ref(&name))
            .await?;
        if registered {
            return Err(DeployError::AlreadyRegistered(name));
        }

        let deploy = TransactionRequest::default().with_deploy_code(req.artifact.bytecode().clone());
        let receipt = tx::send_and_confirm(self.adapter, req.signer, deploy, &self.wait)
            .await
            .map_err(|e| DeployError::Deployment {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let address = receipt
            .contract_address
            .filter(|a| *a != Address::ZERO)
            .ok_or_else(|| DeployError::Deployment {
                name: name.clone(),
                reason: "receipt carries no contract address".into(),
            })?;

        req.connectors
            .add_connectors(
                self.adapter,
                req.signer,
                vec![name.clone()],
                vec![address],
                &self.wait,
            )
            .await
            .map_err(|e: TxError| DeployError::Registration {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        let resolved = req.connectors.resolve(self.adapter, &name).await?;
        if resolved != address {
            return Err(DeployError::Registration {
                name,
                reason: format!("registry resolves to {resolved}, deployed {address}"),
            });
        }

        info!(connector = %name, %address, "connector deployed and enabled");
        Ok(Connector {
            name,
            address,
            abi: req.artifact.abi().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::providers::{Provider, ProviderBuilder};
    use alloy::sol_types::SolValue;
    use alloy::transports::mock::Asserter;

    const HARDHAT_ARTIFACT: &str = r#"{
        "_format": "hh-sol-artifact-1",
        "contractName": "ConnectV2SushiswapArbitrum",
        "abi": [
            {
                "type": "function",
                "name": "buy",
                "stateMutability": "payable",
                "inputs": [
                    {"name": "buyAddr", "type": "address"},
                    {"name": "sellAddr", "type": "address"},
                    {"name": "buyAmt", "type": "uint256"},
                    {"name": "unitAmt", "type": "uint256"},
                    {"name": "getId", "type": "uint256"},
                    {"name": "setId", "type": "uint256"}
                ],
                "outputs": []
            }
        ],
        "bytecode": "0x6080604052",
        "deployedBytecode": "0x6080"
    }"#;

    #[test]
    fn parse_hardhat_artifact() {
        let artifact = ConnectorArtifact::from_json(HARDHAT_ARTIFACT).unwrap();
        assert_eq!(artifact.bytecode().len(), 5);
        assert!(artifact.abi().function("buy").is_some());
    }

    #[test]
    fn artifact_without_bytecode_is_rejected() {
        let err = ConnectorArtifact::from_json(r#"{"abi": []}"#).unwrap_err();
        assert!(matches!(err, DeployError::Artifact(_)));
    }

    #[test]
    fn empty_bytecode_is_rejected() {
        let err = ConnectorArtifact::new(JsonAbi::default(), Bytes::new()).unwrap_err();
        assert!(err.to_string().contains("empty creation bytecode"));
    }

    #[test]
    fn artifact_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ConnectV2SushiswapArbitrum.json");
        std::fs::write(&path, HARDHAT_ARTIFACT).unwrap();
        assert!(ConnectorArtifact::from_file(&path).is_ok());
        assert!(matches!(
            ConnectorArtifact::from_file(&dir.path().join("missing.json")),
            Err(DeployError::Io(_))
        ));
    }

    #[tokio::test]
    async fn registered_name_is_rejected_before_deploying() {
        let asserter = Asserter::new();
        let provider = ProviderBuilder::new()
            .connect_mocked_client(asserter.clone())
            .erased();
        let adapter = EvmAdapter::from_provider(provider, "mock://node");
        // isConnectors reports the name as taken; no deploy response is queued.
        let existing = Address::with_last_byte(0xc1);
        asserter.push_success(&Bytes::from((true, vec![existing]).abi_encode_params()));

        let artifact =
            ConnectorArtifact::new(JsonAbi::default(), Bytes::from_static(&[0x60, 0x00])).unwrap();
        let signer = NodeAccount::unlocked(Address::with_last_byte(0x01));
        let connectors = ConnectorRegistry::new(Address::with_last_byte(0xcc));
        let err = ConnectorDeployer::new(&adapter, ReceiptWait::default())
            .deploy_and_enable(DeployRequest {
                connector_name: "Sushiswap-v1",
                artifact: &artifact,
                signer: &signer,
                connectors: &connectors,
            })
            .await
            .unwrap_err();
        assert!(
            matches!(&err, DeployError::AlreadyRegistered(name) if name == "Sushiswap-v1"),
            "got {err:?}"
        );
    }
}
