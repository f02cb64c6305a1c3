//! Global read-only policy.

use async_trait::async_trait;

use super::{Operation, Policy, Verdict};

/// Rejects every write-capable tool; read tools always pass.
///
/// Stateless, so cheap — install it first in the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlyPolicy;

impl ReadOnlyPolicy {
    /// Create the policy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Policy for ReadOnlyPolicy {
    fn name(&self) -> &str {
        "read_only"
    }

    async fn check(&self, op: &Operation) -> Verdict {
        if op.is_write() {
            Verdict::deny("read-only mode: write operations are disabled")
        } else {
            Verdict::Pass
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testutil::test_session;

    #[tokio::test]
    async fn denies_every_write_tool() {
        let policy = ReadOnlyPolicy::new();
        for tool in super::super::WRITE_TOOLS {
            let op = Operation::new(*tool, json!({}), test_session());
            assert!(
                !policy.check(&op).await.is_pass(),
                "{tool} should be denied"
            );
        }
    }

    #[tokio::test]
    async fn passes_read_tools() {
        let policy = ReadOnlyPolicy::new();
        let op = Operation::new("balance", json!({"address": "0x00"}), test_session());
        assert!(policy.check(&op).await.is_pass());
    }
}
