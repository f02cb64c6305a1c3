//! ABI-bound contract handle.
//!
//! [`BoundContract`] parses a JSON ABI once at construction and exposes
//! named methods: reads go out as eth_call with ABI-encoded arguments and
//! come back decoded, writes run through the transaction pipeline. A
//! binding built without a [`TxBuilder`] is read-only.

use std::sync::Arc;

use alloy::dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::{Address, B256, U256};

use super::{TxBuilder, TxError, TxOptions};
use crate::chain::{CallRequest, Ledger, LedgerError};

/// Errors produced by contract bindings.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ContractError {
    /// The ABI document could not be parsed.
    #[error("failed to parse ABI: {0}")]
    Parse(#[from] serde_json::Error),

    /// The named method does not exist in the ABI.
    #[error("method '{0}' not found in ABI")]
    UnknownMethod(String),

    /// Argument encoding or result decoding failed.
    #[error("ABI coding failed: {0}")]
    Abi(#[from] alloy::dyn_abi::Error),

    /// The binding was built without a signer-backed pipeline.
    #[error("contract binding is read-only: write operations are disabled")]
    ReadOnly,

    /// The read call against the ledger failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The write transaction failed to build or broadcast.
    #[error(transparent)]
    Tx(#[from] TxError),
}

/// A deployed contract bound to its ABI.
pub struct BoundContract {
    address: Address,
    abi: JsonAbi,
    ledger: Arc<dyn Ledger>,
    builder: Option<Arc<TxBuilder>>,
}

impl std::fmt::Debug for BoundContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundContract")
            .field("address", &self.address)
            .field("read_only", &self.builder.is_none())
            .finish_non_exhaustive()
    }
}

impl BoundContract {
    /// Bind a deployed contract in read-only mode.
    ///
    /// The ABI is parsed here; an invalid document fails construction.
    pub fn new(
        address: Address,
        abi_json: &str,
        ledger: Arc<dyn Ledger>,
    ) -> Result<Self, ContractError> {
        let abi: JsonAbi = serde_json::from_str(abi_json)?;
        Ok(Self {
            address,
            abi,
            ledger,
            builder: None,
        })
    }

    /// Attach a transaction pipeline, enabling [`BoundContract::transact`].
    #[must_use]
    pub fn with_builder(mut self, builder: Arc<TxBuilder>) -> Self {
        self.builder = Some(builder);
        self
    }

    /// The bound contract address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Overloaded method names resolve to the first ABI entry.
    fn method(&self, name: &str) -> Result<&Function, ContractError> {
        self.abi
            .function(name)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| ContractError::UnknownMethod(name.to_owned()))
    }

    /// Execute a read-only method and decode its return values.
    pub async fn call(
        &self,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, ContractError> {
        let function = self.method(method)?;
        let data = function.abi_encode_input(args)?;
        let raw = self
            .ledger
            .call(CallRequest {
                to: Some(self.address),
                data: data.into(),
                ..CallRequest::default()
            })
            .await?;
        Ok(function.abi_decode_output(&raw)?)
    }

    /// Build, sign, and broadcast a state-mutating method call; returns
    /// the transaction hash.
    pub async fn transact(
        &self,
        method: &str,
        args: &[DynSolValue],
        value: U256,
        opts: &TxOptions,
    ) -> Result<B256, ContractError> {
        let builder = self.builder.as_ref().ok_or(ContractError::ReadOnly)?;
        let function = self.method(method)?;
        let data = function.abi_encode_input(args)?;
        Ok(builder
            .contract_call(self.address, data.into(), value, opts)
            .await?)
    }
}
