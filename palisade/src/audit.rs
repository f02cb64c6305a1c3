//! Audit trail for write operations.
//!
//! Every successful write that produced a transaction hash is recorded
//! through an [`AuditSink`], together with the policy outcomes that let it
//! through. Sinks are best-effort: a recording failure is logged by the
//! engine, never surfaced to the caller.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::policy::PolicyOutcome;

/// One audited write operation.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// Unix timestamp in milliseconds at recording time.
    pub timestamp_ms: u128,
    /// Session the operation ran under.
    pub session_id: Uuid,
    /// Chain label of the session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    /// Hash of the broadcast transaction.
    pub tx_hash: String,
    /// Tool that produced the transaction.
    pub tool: String,
    /// Sender address, when the tool reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Destination address, when the arguments carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Transferred value in wei, when the arguments carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Per-policy outcomes, in chain order.
    pub policies: Vec<PolicyOutcome>,
}

impl AuditRecord {
    /// Current Unix time in milliseconds.
    #[must_use]
    pub fn now_ms() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis())
    }
}

/// Destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one record.
    async fn record(&self, record: &AuditRecord) -> std::io::Result<()>;
}

/// In-memory sink, mainly for tests and short-lived hosts.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("poisoned lock").clone()
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn record(&self, record: &AuditRecord) -> std::io::Result<()> {
        self.records.lock().expect("poisoned lock").push(record.clone());
        Ok(())
    }
}
