//! Unified error types for the palisade engine.
//!
//! Lower layers ([`LedgerError`], [`TxError`], [`SignerError`], [`ToolError`])
//! define their own error enums; this module ties them together into the
//! crate-level [`Error`] returned by [`Engine::execute`](crate::Engine::execute)
//! and friends. Every wrapping layer preserves the original cause via
//! `#[source]` so callers can inspect the full chain.

pub use crate::chain::LedgerError;
pub use crate::signer::SignerError;
pub use crate::tool::ToolError;
pub use crate::tx::TxError;

/// Result type alias for palisade operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the palisade engine.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested tool name is not registered.
    ///
    /// Returned before any policy is consulted; never retried.
    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    /// A tool name is already registered under this name.
    #[error("tool '{0}' already registered")]
    DuplicateTool(String),

    /// The given session id is not in the engine's session table.
    ///
    /// The session was never created, or has already been closed.
    #[error("session '{0}' not found")]
    SessionNotFound(uuid::Uuid),

    /// A policy denied the operation.
    ///
    /// The operation is guaranteed to have had no onchain or signing side
    /// effect; the reason string is sufficient to explain the decision.
    #[error("policy '{policy}' denied operation: {reason}")]
    PolicyDenied {
        /// Name of the denying policy.
        policy: String,
        /// Human-readable denial reason.
        reason: String,
    },

    /// The tool body itself returned an error.
    ///
    /// Not retried by the engine; a tool may retry internally.
    #[error("tool '{tool}' failed: {source}")]
    ToolFailed {
        /// Name of the failing tool.
        tool: String,
        /// The underlying tool error.
        #[source]
        source: ToolError,
    },

    /// A remote ledger operation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Transaction build, signing, or broadcast failed.
    #[error(transparent)]
    Tx(#[from] TxError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a [`Error::PolicyDenied`] from a policy name and reason.
    #[must_use]
    pub fn policy_denied(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PolicyDenied {
            policy: policy.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error originated from a cancellation signal
    /// rather than an exhausted retry budget or a remote failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Ledger(LedgerError::Cancelled))
    }
}
