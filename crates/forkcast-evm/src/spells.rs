//! Spell encoding.
//!
//! A spell asks the wallet to call one method on a registered connector.
//! [`SpellEncoder::encode`] turns an ordered list of spells into the two
//! parallel sequences `cast` takes. Encoding is pure: it only consults a
//! [`RegistrySnapshot`] taken beforehand, so a bad batch is rejected before
//! any transaction is sent.

use std::sync::Arc;

use alloy::dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier};
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use thiserror::Error;

use crate::abi::IInstaAccountV2;
use crate::registry::RegistrySnapshot;
use crate::sushiswap::SushiswapSpell;

/// Errors from spell encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("spell {index}: connector '{connector}' is not registered")]
    UnknownConnector { index: usize, connector: String },
    #[error("spell {index}: connector '{connector}' has no method '{method}'")]
    UnknownMethod {
        index: usize,
        connector: String,
        method: String,
    },
    #[error("spell {index}: {method} takes {expected} args, got {got}")]
    Arity {
        index: usize,
        method: String,
        expected: usize,
        got: usize,
    },
    #[error("spell {index}: {method}: {reason}")]
    Abi {
        index: usize,
        method: String,
        reason: String,
    },
}

/// A call described by method name and string arguments, encoded against
/// the connector's JSON ABI.
#[derive(Debug, Clone)]
pub struct RawCall {
    pub abi: Arc<JsonAbi>,
    pub method: String,
    /// Positional arguments in Solidity literal form (`"0x.."`, `"100"`, `"[0,0]"`).
    pub args: Vec<String>,
}

/// What a spell calls.
#[derive(Debug, Clone)]
pub enum SpellCall {
    Sushiswap(SushiswapSpell),
    Raw(RawCall),
}

/// One connector call inside a cast.
#[derive(Debug, Clone)]
pub struct Spell {
    pub connector: String,
    pub call: SpellCall,
}

impl Spell {
    pub fn sushiswap(connector: impl Into<String>, spell: SushiswapSpell) -> Self {
        Self {
            connector: connector.into(),
            call: SpellCall::Sushiswap(spell),
        }
    }

    pub fn raw(
        connector: impl Into<String>,
        abi: Arc<JsonAbi>,
        method: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            connector: connector.into(),
            call: SpellCall::Raw(RawCall {
                abi,
                method: method.into(),
                args: args.into_iter().map(Into::into).collect(),
            }),
        }
    }

    pub fn method(&self) -> &str {
        match &self.call {
            SpellCall::Sushiswap(spell) => spell.method(),
            SpellCall::Raw(raw) => &raw.method,
        }
    }
}

/// Parallel target/calldata sequences for `cast`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedBatch {
    pub targets: Vec<String>,
    pub datas: Vec<Bytes>,
}

impl EncodedBatch {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// `cast(targets, datas, origin)` calldata for the wallet.
    pub fn cast_calldata(&self, origin: Address) -> Bytes {
        IInstaAccountV2::castCall {
            targetNames: self.targets.clone(),
            datas: self.datas.clone(),
            origin,
        }
        .abi_encode()
        .into()
    }
}

/// Encodes spells against a registry snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SpellEncoder<'a> {
    registry: &'a RegistrySnapshot,
}

impl<'a> SpellEncoder<'a> {
    pub fn new(registry: &'a RegistrySnapshot) -> Self {
        Self { registry }
    }

    /// Encodes `spells` in order. Any failing spell fails the whole batch.
    pub fn encode(&self, spells: &[Spell]) -> Result<EncodedBatch, EncodeError> {
        let mut batch = EncodedBatch::default();
        for (index, spell) in spells.iter().enumerate() {
            if !self.registry.contains(&spell.connector) {
                return Err(EncodeError::UnknownConnector {
                    index,
                    connector: spell.connector.clone(),
                });
            }
            let data = match &spell.call {
                SpellCall::Sushiswap(call) => call.calldata(),
                SpellCall::Raw(raw) => encode_raw(index, &spell.connector, raw)?,
            };
            batch.targets.push(spell.connector.clone());
            batch.datas.push(data);
        }
        Ok(batch)
    }
}

fn encode_raw(index: usize, connector: &str, raw: &RawCall) -> Result<Bytes, EncodeError> {
    let overloads = raw
        .abi
        .function(&raw.method)
        .filter(|fns| !fns.is_empty())
        .ok_or_else(|| EncodeError::UnknownMethod {
            index,
            connector: connector.to_string(),
            method: raw.method.clone(),
        })?;
    let func = overloads
        .iter()
        .find(|f| f.inputs.len() == raw.args.len())
        .ok_or_else(|| EncodeError::Arity {
            index,
            method: raw.method.clone(),
            expected: overloads[0].inputs.len(),
            got: raw.args.len(),
        })?;

    let abi_err = |reason: String| EncodeError::Abi {
        index,
        method: raw.method.clone(),
        reason,
    };
    let types: Vec<DynSolType> = func
        .inputs
        .iter()
        .map(Specifier::<DynSolType>::resolve)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| abi_err(e.to_string()))?;
    let values = raw
        .args
        .iter()
        .zip(types.iter())
        .map(|(arg, ty)| ty.coerce_str(arg))
        .collect::<Result<Vec<DynSolValue>, _>>()
        .map_err(|e| abi_err(e.to_string()))?;

    let data = func
        .abi_encode_input(&values)
        .map_err(|e| abi_err(e.to_string()))?;
    Ok(data.into())
}
