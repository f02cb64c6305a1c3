//! Execution engine: the single entry point through which agent-chosen
//! tool invocations run.
//!
//! The engine owns the tool registry, the policy chain, the session table,
//! and an optional audit sink. Every invocation follows the same path:
//! resolve the tool, resolve or mint a session, evaluate the policy chain,
//! run the tool, and audit successful writes. There is no side door — a
//! tool cannot run without the chain's unanimous approval.

mod session;

pub use session::{Session, ToolContext};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditRecord, AuditSink};
use crate::chain::Ledger;
use crate::error::{Error, Result};
use crate::policy::{Operation, PolicyChain, PolicyOutcome};
use crate::tool::ToolRegistry;

/// Policy-fenced executor for agent tool invocations.
pub struct Engine {
    registry: Arc<ToolRegistry>,
    policies: Arc<PolicyChain>,
    audit: Option<Arc<dyn AuditSink>>,
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("tools", &self.registry.names())
            .field("policies", &self.policies)
            .field("has_audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine over a registry and policy chain, with no audit
    /// sink.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, policies: Arc<PolicyChain>) -> Self {
        Self {
            registry,
            policies,
            audit: None,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Attach an audit sink; successful writes that return a transaction
    /// hash are recorded through it.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// The tool registry this engine executes from.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// The policy chain guarding this engine.
    #[must_use]
    pub fn policies(&self) -> &Arc<PolicyChain> {
        &self.policies
    }

    /// Create and register a session.
    ///
    /// Never fails: id collisions are not a practical concern with random
    /// UUIDs, and the table grows without bound only if callers leak
    /// sessions they never close.
    pub fn create_session(
        &self,
        default_chain: Option<String>,
        ledger: Option<Arc<dyn Ledger>>,
    ) -> Arc<Session> {
        let session = Arc::new(Session::new(default_chain, ledger));
        info!(
            session_id = %session.id,
            has_ledger = session.ledger().is_some(),
            "session created"
        );
        self.sessions
            .write()
            .expect("poisoned lock")
            .insert(session.id, Arc::clone(&session));
        session
    }

    /// Look up a registered session by id.
    #[must_use]
    pub fn session(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.read().expect("poisoned lock").get(&id).cloned()
    }

    /// Remove a session from the table. Idempotent; in-flight invocations
    /// holding the `Arc` run to completion.
    pub fn close_session(&self, id: Uuid) {
        if self
            .sessions
            .write()
            .expect("poisoned lock")
            .remove(&id)
            .is_some()
        {
            info!(session_id = %id, "session closed");
        }
    }

    /// Execute one tool invocation under policy enforcement.
    ///
    /// With `session_id == None` a transient session is minted for this
    /// call and closed afterwards. An unknown tool fails before the policy
    /// chain is consulted; an unknown session id also fails up front.
    pub async fn execute(
        &self,
        session_id: Option<Uuid>,
        tool_name: &str,
        args: Value,
    ) -> Result<Value> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| Error::ToolNotFound(tool_name.to_owned()))?;

        let (session, transient) = match session_id {
            Some(id) => {
                let session = self
                    .session(id)
                    .ok_or_else(|| Error::SessionNotFound(id))?;
                (session, false)
            }
            None => (self.create_session(None, None), true),
        };

        let result = self.run(&session, tool_name, &tool, args).await;

        if transient {
            self.close_session(session.id);
        }
        result
    }

    async fn run(
        &self,
        session: &Arc<Session>,
        tool_name: &str,
        tool: &Arc<dyn crate::tool::Tool>,
        args: Value,
    ) -> Result<Value> {
        let op = Operation::new(tool_name, args, Arc::clone(session));

        let outcomes = match self.policies.evaluate(&op).await {
            Ok(outcomes) => outcomes,
            Err(err) => {
                warn!(session_id = %session.id, tool = tool_name, %err, "operation denied");
                return Err(err);
            }
        };

        debug!(session_id = %session.id, tool = tool_name, "tool invoked");
        let ctx = ToolContext::new(Arc::clone(session));
        let result = tool.call(&ctx, op.args.clone()).await.map_err(|source| {
            warn!(session_id = %session.id, tool = tool_name, err = %source, "tool failed");
            Error::ToolFailed {
                tool: tool_name.to_owned(),
                source,
            }
        })?;

        info!(session_id = %session.id, tool = tool_name, "tool succeeded");
        self.audit_write(&op, &result, outcomes).await;
        Ok(result)
    }

    /// Record a successful write through the audit sink, if one is attached
    /// and the result carries a transaction hash. Best-effort: sink errors
    /// are logged, never propagated.
    async fn audit_write(&self, op: &Operation, result: &Value, policies: Vec<PolicyOutcome>) {
        let Some(sink) = &self.audit else { return };
        if !op.is_write() {
            return;
        }
        let Some(tx_hash) = result.get("tx_hash").and_then(Value::as_str) else {
            return;
        };

        let record = AuditRecord {
            timestamp_ms: AuditRecord::now_ms(),
            session_id: op.session.id,
            chain: op.session.default_chain.clone(),
            tx_hash: tx_hash.to_owned(),
            tool: op.tool.clone(),
            from: result
                .get("from")
                .and_then(Value::as_str)
                .map(str::to_owned),
            to: op.destination().map(str::to_owned),
            value: op.amount().map(|v| v.to_string()),
            policies,
        };
        if let Err(err) = sink.record(&record).await {
            warn!(session_id = %op.session.id, %err, "audit sink failed");
        }
    }
}
