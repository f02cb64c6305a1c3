//! Shared test doubles.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::primitives::{keccak256, Address, B256, Bytes, U256};
use async_trait::async_trait;

use crate::chain::{CallRequest, Ledger, LedgerError, ReceiptInfo};
use crate::engine::Session;
use crate::signer::{Signer, SignerError};

pub(crate) fn test_session() -> Arc<Session> {
    Arc::new(Session::new(None, None))
}

/// Canned-response ledger. Mutable pieces (block height, receipts, sent
/// transactions) use interior mutability so tests can drive them while the
/// code under test holds the ledger behind an `Arc`.
pub(crate) struct MockLedger {
    pub chain_id: u64,
    pub balance: U256,
    pub nonce: u64,
    pub gas_estimate: u64,
    pub suggested_gas_price: u128,
    pub suggested_priority_fee: u128,
    pub base_fee: Option<u128>,
    pub call_result: Bytes,
    pub block: AtomicU64,
    pub receipts: Mutex<HashMap<B256, ReceiptInfo>>,
    pub sent: Mutex<Vec<Vec<u8>>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self {
            chain_id: 1,
            balance: U256::ZERO,
            nonce: 0,
            gas_estimate: 21_000,
            suggested_gas_price: 7,
            suggested_priority_fee: 10,
            base_fee: None,
            call_result: Bytes::new(),
            block: AtomicU64::new(0),
            receipts: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl MockLedger {
    pub fn insert_receipt(&self, receipt: ReceiptInfo) {
        self.receipts
            .lock()
            .expect("poisoned lock")
            .insert(receipt.transaction_hash, receipt);
    }

    pub fn set_block(&self, height: u64) {
        self.block.store(height, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("poisoned lock").len()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn balance(&self, _address: Address) -> Result<U256, LedgerError> {
        Ok(self.balance)
    }

    async fn call(&self, _request: CallRequest) -> Result<Bytes, LedgerError> {
        Ok(self.call_result.clone())
    }

    async fn chain_id(&self) -> Result<u64, LedgerError> {
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        Ok(self.block.load(Ordering::SeqCst))
    }

    async fn estimate_gas(&self, _request: CallRequest) -> Result<u64, LedgerError> {
        Ok(self.gas_estimate)
    }

    async fn pending_nonce(&self, _address: Address) -> Result<u64, LedgerError> {
        Ok(self.nonce)
    }

    async fn gas_price(&self) -> Result<u128, LedgerError> {
        Ok(self.suggested_gas_price)
    }

    async fn max_priority_fee(&self) -> Result<u128, LedgerError> {
        Ok(self.suggested_priority_fee)
    }

    async fn base_fee(&self) -> Result<Option<u128>, LedgerError> {
        Ok(self.base_fee)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, LedgerError> {
        self.sent.lock().expect("poisoned lock").push(raw.to_vec());
        Ok(keccak256(raw))
    }

    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<ReceiptInfo>, LedgerError> {
        Ok(self
            .receipts
            .lock()
            .expect("poisoned lock")
            .get(&tx_hash)
            .cloned())
    }
}

/// Signer returning a fixed raw signature instead of real cryptography.
///
/// `recovery_byte` lands in the 65th byte so tests can exercise the
/// 27/28-to-parity normalization; `signature_len` other than 65 produces a
/// malformed signature on purpose.
pub(crate) struct MockSigner {
    pub address: Address,
    pub recovery_byte: u8,
    pub signature_len: usize,
}

impl Default for MockSigner {
    fn default() -> Self {
        Self {
            address: Address::repeat_byte(0xaa),
            recovery_byte: 27,
            signature_len: 65,
        }
    }
}

#[async_trait]
impl Signer for MockSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_digest(&self, _digest: B256) -> Result<Vec<u8>, SignerError> {
        if self.signature_len != 65 {
            return Ok(vec![0x11; self.signature_len]);
        }
        let mut raw = vec![0x11; 64];
        raw.push(self.recovery_byte);
        Ok(raw)
    }
}
