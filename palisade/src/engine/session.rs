//! Per-run session state.
//!
//! A [`Session`] is the correlation scope for one logical agent run: every
//! log line, policy decision, and audit record produced on behalf of that
//! run carries its id. Sessions are handed out as `Arc` and are immutable
//! after creation; the engine's session table is the only mutable piece.

use std::sync::Arc;
use std::time::SystemTime;

use uuid::Uuid;

use crate::chain::Ledger;

/// Correlation scope for one logical agent run.
pub struct Session {
    /// Globally unique session identifier.
    pub id: Uuid,
    /// When the session was created.
    pub created_at: SystemTime,
    /// Preferred chain for this run, if any.
    pub default_chain: Option<String>,
    ledger: Option<Arc<dyn Ledger>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("default_chain", &self.default_chain)
            .field("has_ledger", &self.ledger.is_some())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(default_chain: Option<String>, ledger: Option<Arc<dyn Ledger>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: SystemTime::now(),
            default_chain,
            ledger,
        }
    }

    /// The ledger attached to this session, if any.
    ///
    /// Tool-less or read-only sessions may have none.
    #[must_use]
    pub fn ledger(&self) -> Option<&Arc<dyn Ledger>> {
        self.ledger.as_ref()
    }
}

/// Request-scoped carrier handed to every tool invocation.
///
/// Tools reach the session (and through it the session's ledger) via this
/// context instead of process-wide globals.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// The session this invocation runs under.
    pub session: Arc<Session>,
}

impl ToolContext {
    /// Create a context for `session`.
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}
