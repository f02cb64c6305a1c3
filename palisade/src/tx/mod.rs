//! Transaction pipeline: intent in, signed broadcast-ready transaction out.
//!
//! [`TxBuilder`] turns a transfer/call/deploy intent into a fully resolved,
//! signed transaction, choosing sensible defaults for every unset field:
//! pending nonce, estimated gas, suggested fees. Two mutually exclusive fee
//! models are supported — the legacy single gas price and the EIP-1559
//! fee-cap/tip-cap scheme — with a transparent per-transaction fallback to
//! legacy on networks whose latest header carries no base fee.
//!
//! Only the final, fully resolved, signed form is ever handed to the
//! ledger for broadcast.
//!
//! [`BoundContract`] sits on top of the pipeline for callers working
//! against a deployed contract's ABI instead of raw payload bytes.

mod contract;

pub use contract::{BoundContract, ContractError};

use std::sync::Arc;

use alloy::consensus::{SignableTransaction, Transaction as _, TxEip1559, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::eip2930::AccessList;
use alloy::primitives::{Address, B256, Bytes, Signature, TxKind, U256};
use tracing::{debug, info};

use crate::chain::{CallRequest, Ledger, LedgerError};
use crate::signer::{Signer, SignerError};

/// Errors produced while building, signing, or broadcasting a transaction.
///
/// Every variant before [`TxError::Broadcast`] is guaranteed to have left
/// no network state behind. A broadcast failure is inherently ambiguous:
/// the transaction may or may not have been accepted — poll by hash to
/// resolve.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TxError {
    /// Fetching the network chain id at construction failed.
    #[error("failed to fetch chain id: {0}")]
    ChainId(#[source] LedgerError),

    /// Nonce resolution failed.
    #[error("failed to resolve nonce: {0}")]
    Nonce(#[source] LedgerError),

    /// Gas estimation failed.
    #[error("failed to estimate gas: {0}")]
    GasEstimate(#[source] LedgerError),

    /// Fee resolution (gas price, tip, or base fee) failed.
    #[error("failed to resolve fees: {0}")]
    Fees(#[source] LedgerError),

    /// The signer refused or failed to sign the digest.
    #[error("signing failed: {0}")]
    Signing(#[source] SignerError),

    /// The signer returned a signature of the wrong length.
    #[error("invalid signature length {0}, expected 65 bytes")]
    SignatureLength(usize),

    /// The network rejected the signed transaction or the call failed
    /// after exhausting retries.
    #[error("broadcast failed: {0}")]
    Broadcast(#[source] LedgerError),
}

/// Optional transaction parameters; unset fields are resolved from the
/// network.
#[derive(Debug, Clone, Default)]
pub struct TxOptions {
    /// Gas limit; `None` or zero estimates via the ledger.
    pub gas_limit: Option<u64>,
    /// Legacy gas price in wei; `None` uses the suggested price.
    pub gas_price: Option<u128>,
    /// EIP-1559 fee cap in wei; setting it selects the dynamic model.
    pub max_fee_per_gas: Option<u128>,
    /// EIP-1559 tip cap in wei; setting it selects the dynamic model.
    pub max_priority_fee_per_gas: Option<u128>,
    /// Explicit nonce; `None` fetches the next pending nonce.
    pub nonce: Option<u64>,
    /// Force the dynamic fee model even with no explicit caps.
    pub dynamic_fee: bool,
}

impl TxOptions {
    fn wants_dynamic(&self) -> bool {
        self.dynamic_fee || self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some()
    }

    fn explicit_gas_limit(&self) -> Option<u64> {
        self.gas_limit.filter(|g| *g > 0)
    }
}

/// Outcome of a contract deployment.
#[derive(Debug, Clone, Copy)]
pub struct Deployment {
    /// Hash of the broadcast transaction.
    pub tx_hash: B256,
    /// The future contract address, derived from sender and nonce before
    /// any confirmation.
    pub contract_address: Address,
}

/// Builds and signs transactions against a ledger.
///
/// Construction fetches the chain id once and caches it, along with the
/// signer's address, for the builder's lifetime.
pub struct TxBuilder {
    ledger: Arc<dyn Ledger>,
    signer: Arc<dyn Signer>,
    chain_id: u64,
    sender: Address,
}

impl std::fmt::Debug for TxBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxBuilder")
            .field("chain_id", &self.chain_id)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

impl TxBuilder {
    /// Create a builder, caching the chain id and sender address.
    pub async fn connect(
        ledger: Arc<dyn Ledger>,
        signer: Arc<dyn Signer>,
    ) -> Result<Self, TxError> {
        let chain_id = ledger.chain_id().await.map_err(TxError::ChainId)?;
        let sender = signer.address();
        Ok(Self {
            ledger,
            signer,
            chain_id,
            sender,
        })
    }

    /// The sender address transactions are built for.
    #[must_use]
    pub const fn sender(&self) -> Address {
        self.sender
    }

    /// The cached chain id.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Build and sign a native-currency transfer.
    pub async fn build_transfer(
        &self,
        to: Address,
        value: U256,
        opts: &TxOptions,
    ) -> Result<TxEnvelope, TxError> {
        self.build(Some(to), value, Bytes::new(), opts).await
    }

    /// Build and sign a contract call.
    pub async fn build_contract_call(
        &self,
        to: Address,
        data: Bytes,
        value: U256,
        opts: &TxOptions,
    ) -> Result<TxEnvelope, TxError> {
        self.build(Some(to), value, data, opts).await
    }

    /// Build and sign a contract deployment (no destination).
    pub async fn build_deploy(
        &self,
        data: Bytes,
        opts: &TxOptions,
    ) -> Result<TxEnvelope, TxError> {
        self.build(None, U256::ZERO, data, opts).await
    }

    /// Build, sign, and broadcast a transfer; returns the transaction hash.
    pub async fn transfer(
        &self,
        to: Address,
        value: U256,
        opts: &TxOptions,
    ) -> Result<B256, TxError> {
        let envelope = self.build_transfer(to, value, opts).await?;
        self.broadcast(&envelope).await
    }

    /// Build, sign, and broadcast a contract call; returns the hash.
    pub async fn contract_call(
        &self,
        to: Address,
        data: Bytes,
        value: U256,
        opts: &TxOptions,
    ) -> Result<B256, TxError> {
        let envelope = self.build_contract_call(to, data, value, opts).await?;
        self.broadcast(&envelope).await
    }

    /// Build, sign, and broadcast a deployment.
    ///
    /// The returned contract address is derived deterministically from the
    /// sender and nonce, so the caller knows it before confirmation.
    pub async fn deploy(&self, data: Bytes, opts: &TxOptions) -> Result<Deployment, TxError> {
        let envelope = self.build_deploy(data, opts).await?;
        let contract_address = self.sender.create(envelope.nonce());
        let tx_hash = self.broadcast(&envelope).await?;
        Ok(Deployment {
            tx_hash,
            contract_address,
        })
    }

    async fn broadcast(&self, envelope: &TxEnvelope) -> Result<B256, TxError> {
        let raw = envelope.encoded_2718();
        let tx_hash = self
            .ledger
            .send_raw_transaction(&raw)
            .await
            .map_err(TxError::Broadcast)?;
        info!(%tx_hash, nonce = envelope.nonce(), "transaction broadcast");
        Ok(tx_hash)
    }

    /// Shared resolve-and-sign routine behind every build operation.
    async fn build(
        &self,
        to: Option<Address>,
        value: U256,
        data: Bytes,
        opts: &TxOptions,
    ) -> Result<TxEnvelope, TxError> {
        let nonce = match opts.nonce {
            Some(nonce) => nonce,
            None => self
                .ledger
                .pending_nonce(self.sender)
                .await
                .map_err(TxError::Nonce)?,
        };

        if opts.wants_dynamic() {
            match self.ledger.base_fee().await.map_err(TxError::Fees)? {
                Some(base_fee) => {
                    return self.build_dynamic(to, value, data, opts, nonce, base_fee).await;
                }
                None => {
                    debug!("network has no base fee; falling back to legacy fee model");
                }
            }
        }
        self.build_legacy(to, value, data, opts, nonce).await
    }

    async fn build_legacy(
        &self,
        to: Option<Address>,
        value: U256,
        data: Bytes,
        opts: &TxOptions,
        nonce: u64,
    ) -> Result<TxEnvelope, TxError> {
        let gas_limit = match opts.explicit_gas_limit() {
            Some(gas) => gas,
            None => {
                self.ledger
                    .estimate_gas(CallRequest {
                        from: Some(self.sender),
                        to,
                        value,
                        data: data.clone(),
                        gas_price: opts.gas_price,
                        ..CallRequest::default()
                    })
                    .await
                    .map_err(TxError::GasEstimate)?
            }
        };

        let gas_price = match opts.gas_price {
            Some(price) => price,
            None => self.ledger.gas_price().await.map_err(TxError::Fees)?,
        };

        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: to.map_or(TxKind::Create, TxKind::Call),
            value,
            input: data,
        };
        let signature = self.sign(tx.signature_hash()).await?;
        Ok(TxEnvelope::Legacy(tx.into_signed(signature)))
    }

    async fn build_dynamic(
        &self,
        to: Option<Address>,
        value: U256,
        data: Bytes,
        opts: &TxOptions,
        nonce: u64,
        base_fee: u128,
    ) -> Result<TxEnvelope, TxError> {
        let gas_limit = match opts.explicit_gas_limit() {
            Some(gas) => gas,
            None => {
                self.ledger
                    .estimate_gas(CallRequest {
                        from: Some(self.sender),
                        to,
                        value,
                        data: data.clone(),
                        max_fee_per_gas: opts.max_fee_per_gas,
                        max_priority_fee_per_gas: opts.max_priority_fee_per_gas,
                        ..CallRequest::default()
                    })
                    .await
                    .map_err(TxError::GasEstimate)?
            }
        };

        let tip_cap = match opts.max_priority_fee_per_gas {
            Some(tip) => tip,
            None => self.ledger.max_priority_fee().await.map_err(TxError::Fees)?,
        };

        // Default fee cap absorbs one doubling of the base fee before the
        // transaction becomes invalid.
        let fee_cap = match opts.max_fee_per_gas {
            Some(cap) => cap,
            None => base_fee.saturating_mul(2).saturating_add(tip_cap),
        };

        let tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas: fee_cap,
            max_priority_fee_per_gas: tip_cap,
            to: to.map_or(TxKind::Create, TxKind::Call),
            value,
            access_list: AccessList::default(),
            input: data,
        };
        let signature = self.sign(tx.signature_hash()).await?;
        Ok(TxEnvelope::Eip1559(tx.into_signed(signature)))
    }

    async fn sign(&self, digest: B256) -> Result<Signature, TxError> {
        let raw = self.signer.sign_digest(digest).await.map_err(TxError::Signing)?;
        normalize_signature(&raw)
    }
}

/// Validate a raw `[R || S || V]` signature and normalize the recovery
/// byte into the {0,1} parity the chain's signature-values convention
/// expects (a legacy 27/28 value has 27 subtracted).
fn normalize_signature(raw: &[u8]) -> Result<Signature, TxError> {
    if raw.len() != 65 {
        return Err(TxError::SignatureLength(raw.len()));
    }
    let r = U256::from_be_slice(&raw[..32]);
    let s = U256::from_be_slice(&raw[32..64]);
    let mut v = raw[64];
    if v >= 27 {
        v -= 27;
    }
    Ok(Signature::new(r, s, v == 1))
}
