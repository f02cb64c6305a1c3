//! [`alloy`]-backed [`Ledger`] implementation for EVM networks.
//!
//! [`EvmLedger`] wraps a type-erased provider and routes every RPC call
//! through the shared retry wrapper. The connection is established eagerly:
//! if the endpoint cannot be dialed, construction fails and the ledger is
//! never handed out.

use alloy::eips::BlockNumberOrTag;
use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::retry::{RetryPolicy, with_retry};
use super::{CallRequest, Ledger, LedgerError, ReceiptInfo};

/// Thread-safe EVM RPC adapter with uniform retry semantics.
pub struct EvmLedger {
    provider: DynProvider<Ethereum>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl std::fmt::Debug for EvmLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmLedger")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl EvmLedger {
    /// Connect to a JSON-RPC endpoint.
    ///
    /// The connection is established immediately; a failure to dial leaves
    /// no usable ledger behind.
    pub async fn connect(rpc_url: &str, retry: RetryPolicy) -> Result<Self, LedgerError> {
        let provider = ProviderBuilder::new()
            .connect(rpc_url)
            .await
            .map_err(|e| LedgerError::Connect {
                url: rpc_url.to_owned(),
                reason: e.to_string(),
            })?
            .erased();

        info!(rpc_url, "ledger connected");
        Ok(Self::from_provider(provider, retry))
    }

    /// Build a ledger from an existing provider.
    ///
    /// Useful for tests and for callers that configure their own transport.
    #[must_use]
    pub fn from_provider(provider: DynProvider<Ethereum>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            retry: retry.clamped(),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a cancellation token that aborts in-flight retry waits.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The cancellation token governing this ledger's waits.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn to_tx_request(request: &CallRequest) -> TransactionRequest {
        let mut tx = TransactionRequest::default().with_value(request.value);
        if let Some(from) = request.from {
            tx = tx.with_from(from);
        }
        tx = match request.to {
            Some(to) => tx.with_to(to),
            None => tx.with_kind(TxKind::Create),
        };
        if !request.data.is_empty() {
            tx = tx.with_input(request.data.clone());
        }
        if let Some(gas) = request.gas_limit {
            tx = tx.with_gas_limit(gas);
        }
        if let Some(price) = request.gas_price {
            tx = tx.with_gas_price(price);
        }
        if let Some(cap) = request.max_fee_per_gas {
            tx = tx.with_max_fee_per_gas(cap);
        }
        if let Some(tip) = request.max_priority_fee_per_gas {
            tx = tx.with_max_priority_fee_per_gas(tip);
        }
        tx
    }
}

#[async_trait]
impl Ledger for EvmLedger {
    async fn balance(&self, address: Address) -> Result<U256, LedgerError> {
        let provider = self.provider.clone();
        with_retry(&self.retry, &self.cancel, "get_balance", move || {
            let provider = provider.clone();
            async move { provider.get_balance(address).await }
        })
        .await
    }

    async fn call(&self, request: CallRequest) -> Result<Bytes, LedgerError> {
        let provider = self.provider.clone();
        let tx = Self::to_tx_request(&request);
        with_retry(&self.retry, &self.cancel, "call", move || {
            let provider = provider.clone();
            let tx = tx.clone();
            async move { provider.call(tx).await }
        })
        .await
    }

    async fn chain_id(&self) -> Result<u64, LedgerError> {
        let provider = self.provider.clone();
        with_retry(&self.retry, &self.cancel, "chain_id", move || {
            let provider = provider.clone();
            async move { provider.get_chain_id().await }
        })
        .await
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        let provider = self.provider.clone();
        with_retry(&self.retry, &self.cancel, "block_number", move || {
            let provider = provider.clone();
            async move { provider.get_block_number().await }
        })
        .await
    }

    async fn estimate_gas(&self, request: CallRequest) -> Result<u64, LedgerError> {
        let provider = self.provider.clone();
        let tx = Self::to_tx_request(&request);
        with_retry(&self.retry, &self.cancel, "estimate_gas", move || {
            let provider = provider.clone();
            let tx = tx.clone();
            async move { provider.estimate_gas(tx).await }
        })
        .await
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, LedgerError> {
        let provider = self.provider.clone();
        with_retry(&self.retry, &self.cancel, "pending_nonce", move || {
            let provider = provider.clone();
            async move { provider.get_transaction_count(address).pending().await }
        })
        .await
    }

    async fn gas_price(&self) -> Result<u128, LedgerError> {
        let provider = self.provider.clone();
        with_retry(&self.retry, &self.cancel, "gas_price", move || {
            let provider = provider.clone();
            async move { provider.get_gas_price().await }
        })
        .await
    }

    async fn max_priority_fee(&self) -> Result<u128, LedgerError> {
        let provider = self.provider.clone();
        with_retry(&self.retry, &self.cancel, "max_priority_fee", move || {
            let provider = provider.clone();
            async move { provider.get_max_priority_fee_per_gas().await }
        })
        .await
    }

    async fn base_fee(&self) -> Result<Option<u128>, LedgerError> {
        let provider = self.provider.clone();
        let block = with_retry(&self.retry, &self.cancel, "latest_header", move || {
            let provider = provider.clone();
            async move { provider.get_block_by_number(BlockNumberOrTag::Latest).await }
        })
        .await?;
        Ok(block.and_then(|b| b.header.base_fee_per_gas).map(u128::from))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, LedgerError> {
        let provider = self.provider.clone();
        let raw = raw.to_vec();
        let pending = with_retry(&self.retry, &self.cancel, "send_raw_transaction", move || {
            let provider = provider.clone();
            let raw = raw.clone();
            async move { provider.send_raw_transaction(&raw).await }
        })
        .await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<ReceiptInfo>, LedgerError> {
        let provider = self.provider.clone();
        let receipt = with_retry(&self.retry, &self.cancel, "transaction_receipt", move || {
            let provider = provider.clone();
            async move { provider.get_transaction_receipt(tx_hash).await }
        })
        .await?;

        Ok(receipt.and_then(|r| {
            // A receipt without a block number is still pending.
            r.block_number.map(|block_number| ReceiptInfo {
                transaction_hash: r.transaction_hash,
                block_number,
                success: r.status(),
                gas_used: r.gas_used,
                contract_address: r.contract_address,
            })
        }))
    }
}
