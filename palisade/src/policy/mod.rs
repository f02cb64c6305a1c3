//! Policy enforcement chain — safety guards consulted before every tool run.
//!
//! A [`Policy`] is a single pass/deny rule; the [`PolicyChain`] holds an
//! ordered list of them and requires unanimous approval. Order is
//! caller-controlled and meaningful: cheap checks (read-only mode) belong
//! first, and a whitelist must not be bypassable by evaluating a spend
//! limit ahead of it, so the chain never reorders.
//!
//! Built-in policies:
//!
//! - [`ReadOnlyPolicy`] — denies every write-capable tool.
//! - [`LimitPolicy`] — per-transaction ceiling and rolling 24h spend limit.
//! - [`WhitelistPolicy`] — destination allow/deny sets.
//! - [`HitlPolicy`] — human approval above a value threshold.

mod hitl;
mod limit;
mod readonly;
mod whitelist;

pub use hitl::{ApprovalHandler, ApprovalRequest, ConsoleApproval, HitlPolicy};
pub use limit::LimitPolicy;
pub use readonly::ReadOnlyPolicy;
pub use whitelist::WhitelistPolicy;

use std::sync::{Arc, RwLock};

use alloy::primitives::U256;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::engine::Session;
use crate::error::{Error, Result};

/// The closed set of tool names that mutate onchain state.
///
/// This is explicit configuration, not inference: a tool not named here is
/// treated as read-only by every built-in policy.
pub const WRITE_TOOLS: &[&str] = &["transfer", "send", "swap", "deploy", "approve"];

/// Evaluation context for one tool invocation.
///
/// Built fresh per engine call and passed by reference through the whole
/// chain; immutable once constructed.
#[derive(Debug, Clone)]
pub struct Operation {
    /// The tool being invoked.
    pub tool: String,
    /// The raw, unvalidated argument bag.
    pub args: Value,
    /// The session the invocation runs under.
    pub session: Arc<Session>,
}

impl Operation {
    /// Create a descriptor for a tool invocation.
    #[must_use]
    pub fn new(tool: impl Into<String>, args: Value, session: Arc<Session>) -> Self {
        Self {
            tool: tool.into(),
            args,
            session,
        }
    }

    /// Whether the tool is in the write-capable set.
    #[must_use]
    pub fn is_write(&self) -> bool {
        WRITE_TOOLS.contains(&self.tool.as_str())
    }

    /// Attempt to read a numeric `amount` argument, in wei.
    ///
    /// Accepts a decimal string or a JSON integer. Any other shape means
    /// "not applicable" — policies degrade gracefully on tools they don't
    /// understand.
    #[must_use]
    pub fn amount(&self) -> Option<U256> {
        match self.args.get("amount")? {
            Value::String(s) => U256::from_str_radix(s, 10).ok(),
            Value::Number(n) => n.as_u64().map(U256::from),
            _ => None,
        }
    }

    /// Attempt to read a plain-string `to` destination argument.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        self.args.get("to")?.as_str()
    }
}

/// Outcome of one policy's check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The policy allows the operation.
    Pass,
    /// The policy denies the operation for the stated reason.
    Deny(String),
}

impl Verdict {
    /// Create a denial with a reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny(reason.into())
    }

    /// Returns `true` for [`Verdict::Pass`].
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// A single named guard consulted before a tool runs.
///
/// `check` must be safe to call concurrently across unrelated sessions;
/// stateful policies guard their own state internally.
#[async_trait]
pub trait Policy: Send + Sync {
    /// Stable identifier used in denials and audit records.
    fn name(&self) -> &str;

    /// Evaluate the operation.
    async fn check(&self, op: &Operation) -> Verdict;
}

/// Pass/deny outcome of a consulted policy, recorded for auditing.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyOutcome {
    /// Name of the consulted policy.
    pub policy: String,
    /// Whether it passed the operation.
    pub passed: bool,
}

/// Ordered collection of policies requiring unanimous approval.
#[derive(Default)]
pub struct PolicyChain {
    policies: RwLock<Vec<Arc<dyn Policy>>>,
}

impl std::fmt::Debug for PolicyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .policies
            .read()
            .expect("poisoned lock")
            .iter()
            .map(|p| p.name().to_owned())
            .collect();
        f.debug_struct("PolicyChain").field("policies", &names).finish()
    }
}

impl PolicyChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a policy to the chain.
    ///
    /// Safe to call while evaluations are in flight; an in-flight
    /// evaluation iterates a snapshot taken before the append.
    pub fn add_policy(&self, policy: Arc<dyn Policy>) {
        self.policies.write().expect("poisoned lock").push(policy);
    }

    /// Evaluate all policies in insertion order.
    ///
    /// Stops at the first denial, returning [`Error::PolicyDenied`] wrapped
    /// with the denying policy's name. On unanimous approval, returns the
    /// per-policy outcomes for the audit trail.
    pub async fn evaluate(&self, op: &Operation) -> Result<Vec<PolicyOutcome>> {
        let snapshot: Vec<Arc<dyn Policy>> =
            self.policies.read().expect("poisoned lock").clone();

        let mut outcomes = Vec::with_capacity(snapshot.len());
        for policy in snapshot {
            match policy.check(op).await {
                Verdict::Pass => outcomes.push(PolicyOutcome {
                    policy: policy.name().to_owned(),
                    passed: true,
                }),
                Verdict::Deny(reason) => {
                    return Err(Error::policy_denied(policy.name(), reason));
                }
            }
        }
        Ok(outcomes)
    }

    /// Number of installed policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.read().expect("poisoned lock").len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::testutil::test_session;

    struct Recording {
        name: &'static str,
        calls: AtomicUsize,
        verdict: fn() -> Verdict,
    }

    impl Recording {
        fn passing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                verdict: || Verdict::Pass,
            })
        }

        fn denying(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                verdict: || Verdict::deny("no"),
            })
        }
    }

    #[async_trait]
    impl Policy for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn check(&self, _op: &Operation) -> Verdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.verdict)()
        }
    }

    #[tokio::test]
    async fn evaluation_stops_at_first_denial() {
        let chain = PolicyChain::new();
        let first = Recording::passing("first");
        let denier = Recording::denying("denier");
        let after = Recording::passing("after");
        chain.add_policy(Arc::clone(&first) as Arc<dyn Policy>);
        chain.add_policy(Arc::clone(&denier) as Arc<dyn Policy>);
        chain.add_policy(Arc::clone(&after) as Arc<dyn Policy>);

        let op = Operation::new("transfer", json!({}), test_session());
        let err = chain.evaluate(&op).await.unwrap_err();

        match err {
            Error::PolicyDenied { policy, reason } => {
                assert_eq!(policy, "denier");
                assert_eq!(reason, "no");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(denier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(after.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unanimous_approval_reports_outcomes_in_order() {
        let chain = PolicyChain::new();
        chain.add_policy(Recording::passing("a") as Arc<dyn Policy>);
        chain.add_policy(Recording::passing("b") as Arc<dyn Policy>);

        let op = Operation::new("balance", json!({}), test_session());
        let outcomes = chain.evaluate(&op).await.unwrap();

        let names: Vec<_> = outcomes.iter().map(|o| o.policy.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert!(outcomes.iter().all(|o| o.passed));
    }

    #[tokio::test]
    async fn empty_chain_approves_everything() {
        let chain = PolicyChain::new();
        let op = Operation::new("transfer", json!({"amount": "10"}), test_session());
        assert!(chain.evaluate(&op).await.unwrap().is_empty());
    }

    #[test]
    fn amount_extraction_degrades_gracefully() {
        let session = test_session();
        let op = Operation::new("transfer", json!({"amount": "150"}), Arc::clone(&session));
        assert_eq!(op.amount(), Some(U256::from(150u64)));

        let op = Operation::new("transfer", json!({"amount": 7}), Arc::clone(&session));
        assert_eq!(op.amount(), Some(U256::from(7u64)));

        let op = Operation::new("transfer", json!({"amount": ["nope"]}), Arc::clone(&session));
        assert_eq!(op.amount(), None);

        let op = Operation::new("transfer", json!({}), session);
        assert_eq!(op.amount(), None);
    }
}
