//! Remote ledger adapter — the narrow interface the engine and the
//! transaction pipeline use to talk to an EVM network.
//!
//! The [`Ledger`] trait covers the read operations (balance, call, gas
//! estimation, fee suggestions, block metadata) and the single write
//! operation (raw broadcast). [`EvmLedger`] is the production implementation
//! backed by an [`alloy`] provider; every call goes through the
//! [`with_retry`](retry::with_retry) wrapper with bounded exponential
//! backoff.
//!
//! Receipt confirmation polling is provided directly on the trait so that
//! any implementation (including test doubles) gets the same semantics.

mod evm;
pub mod retry;

pub use evm::EvmLedger;
pub use retry::RetryPolicy;

use std::time::Duration;

use alloy::primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors produced by remote ledger operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// Failed to connect to the RPC endpoint.
    #[error("failed to connect to '{url}': {reason}")]
    Connect {
        /// The endpoint that was dialed.
        url: String,
        /// Transport-level failure description.
        reason: String,
    },

    /// A retried operation failed on every attempt.
    ///
    /// Wraps the last underlying error and states the total attempts made.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// The logical RPC operation name.
        operation: String,
        /// How many attempts were made.
        attempts: u32,
        /// The last underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The caller's cancellation signal fired during a wait.
    ///
    /// Distinct from [`LedgerError::RetriesExhausted`] so callers can tell
    /// "gave up" apart from "was told to stop".
    #[error("operation cancelled")]
    Cancelled,
}

/// A read-only call or gas-estimation request.
///
/// Mirrors the shape of an unsigned transaction so that gas estimation runs
/// against the same destination/value/payload/fee fields the pipeline will
/// later use.
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    /// Sender address, if relevant to the call.
    pub from: Option<Address>,
    /// Destination; `None` simulates contract creation.
    pub to: Option<Address>,
    /// Value transferred with the call.
    pub value: U256,
    /// Call payload.
    pub data: Bytes,
    /// Gas limit, if constrained.
    pub gas_limit: Option<u64>,
    /// Legacy gas price, if the legacy fee model applies.
    pub gas_price: Option<u128>,
    /// EIP-1559 fee cap, if the dynamic fee model applies.
    pub max_fee_per_gas: Option<u128>,
    /// EIP-1559 tip cap, if the dynamic fee model applies.
    pub max_priority_fee_per_gas: Option<u128>,
}

/// A mined transaction receipt, reduced to the fields the engine consumes.
#[derive(Debug, Clone)]
pub struct ReceiptInfo {
    /// Hash of the mined transaction.
    pub transaction_hash: B256,
    /// Block the transaction was included in.
    pub block_number: u64,
    /// Whether execution succeeded.
    pub success: bool,
    /// Gas consumed by the transaction.
    pub gas_used: u64,
    /// Address of the created contract, for deployments.
    pub contract_address: Option<Address>,
}

/// Abstract handle to a remote EVM-compatible ledger.
///
/// Implementations must be safe to share across tasks. All operations honor
/// retry semantics internally where applicable; the confirmation-polling
/// methods are provided here and additionally honor a caller-supplied
/// cancellation token.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Native balance of `address` at the latest block, in wei.
    async fn balance(&self, address: Address) -> Result<U256, LedgerError>;

    /// Execute a read-only message call and return the raw result data.
    async fn call(&self, request: CallRequest) -> Result<Bytes, LedgerError>;

    /// Chain ID of the connected network.
    async fn chain_id(&self) -> Result<u64, LedgerError>;

    /// Height of the most recent block.
    async fn block_number(&self) -> Result<u64, LedgerError>;

    /// Estimate the gas needed for a transaction or call.
    async fn estimate_gas(&self, request: CallRequest) -> Result<u64, LedgerError>;

    /// Next pending nonce for `address`.
    async fn pending_nonce(&self, address: Address) -> Result<u64, LedgerError>;

    /// Currently suggested legacy gas price, in wei.
    async fn gas_price(&self) -> Result<u128, LedgerError>;

    /// Currently suggested EIP-1559 priority fee, in wei.
    async fn max_priority_fee(&self) -> Result<u128, LedgerError>;

    /// Base fee of the latest block, or `None` if the network predates
    /// EIP-1559.
    async fn base_fee(&self) -> Result<Option<u128>, LedgerError>;

    /// Broadcast a signed, RLP-encoded transaction; returns its hash.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, LedgerError>;

    /// Fetch the receipt for `tx_hash`, or `None` if not yet mined.
    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<ReceiptInfo>, LedgerError>;

    /// Poll at a fixed one-second interval until the transaction is mined
    /// and has been confirmed by at least `confirmations` additional blocks.
    ///
    /// Returns the receipt together with the actual confirmation depth.
    /// Exits promptly with [`LedgerError::Cancelled`] once `cancel` fires.
    async fn wait_for_receipt(
        &self,
        tx_hash: B256,
        confirmations: u64,
        cancel: &CancellationToken,
    ) -> Result<(ReceiptInfo, u64), LedgerError> {
        let interval = Duration::from_secs(1);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(LedgerError::Cancelled),
                () = tokio::time::sleep(interval) => {}
            }
            if let Some(confirmed) = self.check_confirmations(tx_hash, confirmations).await? {
                return Ok(confirmed);
            }
        }
    }

    /// Like [`Ledger::wait_for_receipt`] but probing immediately and with
    /// exponential backoff between polls: 500ms growing by 1.5x, capped at
    /// 30 seconds. An already-confirmed transaction resolves without
    /// sleeping at all.
    async fn wait_for_receipt_with_backoff(
        &self,
        tx_hash: B256,
        confirmations: u64,
        cancel: &CancellationToken,
    ) -> Result<(ReceiptInfo, u64), LedgerError> {
        let max_backoff = Duration::from_secs(30);
        let mut backoff = Duration::from_millis(500);
        loop {
            if cancel.is_cancelled() {
                return Err(LedgerError::Cancelled);
            }
            if let Some(confirmed) = self.check_confirmations(tx_hash, confirmations).await? {
                return Ok(confirmed);
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(LedgerError::Cancelled),
                () = tokio::time::sleep(backoff) => {}
            }
            backoff = backoff.mul_f64(1.5).min(max_backoff);
        }
    }

    /// Single confirmation probe: receipt present and deep enough, or not yet.
    ///
    /// A receipt that exists but lacks the required depth yields `None`, as
    /// does a transaction that has not been mined at all.
    async fn check_confirmations(
        &self,
        tx_hash: B256,
        confirmations: u64,
    ) -> Result<Option<(ReceiptInfo, u64)>, LedgerError> {
        let Some(receipt) = self.transaction_receipt(tx_hash).await? else {
            debug!(tx_hash = %tx_hash, "receipt not yet available");
            return Ok(None);
        };
        let height = self.block_number().await?;
        let depth = height.saturating_sub(receipt.block_number);
        if depth >= confirmations {
            debug!(tx_hash = %tx_hash, depth, "transaction confirmed");
            Ok(Some((receipt, depth)))
        } else {
            debug!(tx_hash = %tx_hash, depth, required = confirmations, "awaiting confirmations");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testutil::MockLedger;

    fn receipt(hash: B256, block_number: u64) -> ReceiptInfo {
        ReceiptInfo {
            transaction_hash: hash,
            block_number,
            success: true,
            gas_used: 21_000,
            contract_address: None,
        }
    }

    #[tokio::test]
    async fn unmined_transaction_has_no_confirmations() {
        let ledger = MockLedger::default();
        let hash = B256::repeat_byte(0x01);
        assert!(ledger.check_confirmations(hash, 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn confirmation_depth_is_height_minus_inclusion_block() {
        let ledger = MockLedger::default();
        let hash = B256::repeat_byte(0x02);
        ledger.insert_receipt(receipt(hash, 10));

        ledger.set_block(10);
        assert!(ledger.check_confirmations(hash, 3).await.unwrap().is_none());

        ledger.set_block(13);
        let (_, depth) = ledger
            .check_confirmations(hash, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(depth, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_resolves_once_the_receipt_lands() {
        let ledger = Arc::new(MockLedger::default());
        let hash = B256::repeat_byte(0x03);
        let cancel = CancellationToken::new();

        let waiter = {
            let ledger = Arc::clone(&ledger);
            let cancel = cancel.clone();
            tokio::spawn(async move { ledger.wait_for_receipt(hash, 0, &cancel).await })
        };

        // Let a few empty polls pass before the receipt shows up.
        tokio::time::sleep(Duration::from_secs(3)).await;
        ledger.insert_receipt(receipt(hash, 5));
        ledger.set_block(5);

        let (found, depth) = waiter.await.unwrap().unwrap();
        assert_eq!(found.transaction_hash, hash);
        assert_eq!(depth, 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_wait() {
        let ledger = MockLedger::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = ledger
            .wait_for_receipt(B256::repeat_byte(0x04), 0, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_polling_resolves_a_confirmed_transaction_without_sleeping() {
        let ledger = MockLedger::default();
        let hash = B256::repeat_byte(0x06);
        ledger.insert_receipt(receipt(hash, 5));
        ledger.set_block(5);
        let cancel = CancellationToken::new();

        let start = tokio::time::Instant::now();
        let (found, depth) = ledger
            .wait_for_receipt_with_backoff(hash, 0, &cancel)
            .await
            .unwrap();

        assert_eq!(found.transaction_hash, hash);
        assert_eq!(depth, 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_polling_also_honors_cancellation() {
        let ledger = Arc::new(MockLedger::default());
        let cancel = CancellationToken::new();

        let waiter = {
            let ledger = Arc::clone(&ledger);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                ledger
                    .wait_for_receipt_with_backoff(B256::repeat_byte(0x05), 0, &cancel)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        cancel.cancel();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, LedgerError::Cancelled));
    }
}
