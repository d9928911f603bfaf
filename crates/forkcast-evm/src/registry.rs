//! Connector registry handle and point-in-time snapshots of it.

use std::collections::BTreeMap;

use alloy::primitives::Address;
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;

use crate::abi::IInstaConnectorsV2;
use crate::adapter::{EvmAdapter, EvmAdapterError};
use crate::tx::{self, NodeAccount, ReceiptWait, TxError};

/// Handle to an `InstaConnectorsV2` registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorRegistry {
    address: Address,
}

impl ConnectorRegistry {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Whether every name is registered, with the address of each.
    pub async fn is_connectors(
        &self,
        adapter: &EvmAdapter,
        names: &[String],
    ) -> Result<(bool, Vec<Address>), EvmAdapterError> {
        let ret = adapter
            .call(
                self.address,
                &IInstaConnectorsV2::isConnectorsCall {
                    names: names.to_vec(),
                },
            )
            .await?;
        Ok((ret.isOk, ret.addresses))
    }

    /// Address registered under `name`, zero when absent.
    pub async fn resolve(&self, adapter: &EvmAdapter, name: &str) -> Result<Address, EvmAdapterError> {
        adapter
            .call(
                self.address,
                &IInstaConnectorsV2::connectorsCall {
                    name: name.to_string(),
                },
            )
            .await
    }

    /// Registers `names[i] -> addresses[i]`. Only the registry's master may do this.
    pub async fn add_connectors(
        &self,
        adapter: &EvmAdapter,
        signer: &NodeAccount,
        names: Vec<String>,
        addresses: Vec<Address>,
        wait: &ReceiptWait,
    ) -> Result<(), TxError> {
        let data = IInstaConnectorsV2::addConnectorsCall {
            names,
            connectorAddresses: addresses,
        }
        .abi_encode();
        let request = TransactionRequest::default()
            .to(self.address)
            .input(data.into());
        tx::send_and_confirm(adapter, signer, request, wait).await?;
        Ok(())
    }

    /// Captures which of `names` are currently registered.
    pub async fn snapshot(
        &self,
        adapter: &EvmAdapter,
        names: impl IntoIterator<Item = &str>,
    ) -> Result<RegistrySnapshot, EvmAdapterError> {
        let mut snapshot = RegistrySnapshot::default();
        for name in names {
            let address = self.resolve(adapter, name).await?;
            if address != Address::ZERO {
                snapshot.insert(name, address);
            }
        }
        Ok(snapshot)
    }
}

/// Connector names known to be registered at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    connectors: BTreeMap<String, Address>,
}

impl RegistrySnapshot {
    pub fn insert(&mut self, name: impl Into<String>, address: Address) {
        self.connectors.insert(name.into(), address);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.connectors.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Address> {
        self.connectors.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Address)> for RegistrySnapshot {
    fn from_iter<I: IntoIterator<Item = (S, Address)>>(iter: I) -> Self {
        Self {
            connectors: iter.into_iter().map(|(n, a)| (n.into(), a)).collect(),
        }
    }
}
