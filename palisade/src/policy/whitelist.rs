//! Destination allow/deny lists for write operations.

use std::collections::HashSet;

use async_trait::async_trait;

use super::{Operation, Policy, Verdict};

/// Restricts destination addresses for write operations.
///
/// Membership is case-insensitive, since hex addresses appear in mixed
/// checksum casing in the wild. A non-empty allow-set admits only its
/// members; an empty allow-set imposes no restriction (it does not mean
/// deny-everything). The deny-set is checked after the allow-set.
///
/// Operations without a plain-string `to` argument pass — the policy is
/// not applicable to them.
#[derive(Debug, Clone, Default)]
pub struct WhitelistPolicy {
    allowed: HashSet<String>,
    blocked: HashSet<String>,
}

impl WhitelistPolicy {
    /// Create a policy from allow and deny lists of destination addresses.
    pub fn new<I, S>(allowed: I, blocked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalize = |items: I| {
            items
                .into_iter()
                .map(|s| s.as_ref().to_ascii_lowercase())
                .collect()
        };
        Self {
            allowed: normalize(allowed),
            blocked: normalize(blocked),
        }
    }
}

#[async_trait]
impl Policy for WhitelistPolicy {
    fn name(&self) -> &str {
        "whitelist"
    }

    async fn check(&self, op: &Operation) -> Verdict {
        let Some(to) = op.destination() else {
            return Verdict::Pass;
        };
        let to_key = to.to_ascii_lowercase();

        if !self.allowed.is_empty() && !self.allowed.contains(&to_key) {
            return Verdict::deny(format!("address {to} not in whitelist"));
        }
        if self.blocked.contains(&to_key) {
            return Verdict::deny(format!("address {to} is blocked"));
        }
        Verdict::Pass
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testutil::test_session;

    const ADDR_A: &str = "0xAAaAaAaAaAAAaaAAaaaaAAaAAaaAaAaaAaaaAaaA";
    const ADDR_B: &str = "0xBBbBBbbBbbBbBBbbBBbbbbBBbBbbBBbbBbbbBbbB";

    fn to(addr: &str) -> Operation {
        Operation::new("transfer", json!({"to": addr, "amount": "1"}), test_session())
    }

    #[tokio::test]
    async fn allow_list_admits_only_members() {
        let policy = WhitelistPolicy::new(vec![ADDR_A], vec![]);

        assert!(policy.check(&to(ADDR_A)).await.is_pass());
        match policy.check(&to(ADDR_B)).await {
            Verdict::Deny(reason) => assert!(reason.contains("not in whitelist")),
            Verdict::Pass => panic!("unlisted destination must be denied"),
        }
    }

    #[tokio::test]
    async fn deny_list_blocks_even_with_empty_allow_list() {
        let policy = WhitelistPolicy::new(vec![], vec![ADDR_B]);

        assert!(policy.check(&to(ADDR_A)).await.is_pass());
        match policy.check(&to(ADDR_B)).await {
            Verdict::Deny(reason) => assert!(reason.contains("is blocked")),
            Verdict::Pass => panic!("blocked destination must be denied"),
        }
    }

    #[tokio::test]
    async fn membership_is_case_insensitive() {
        let policy = WhitelistPolicy::new(vec![ADDR_A.to_ascii_uppercase()], vec![]);
        assert!(policy.check(&to(&ADDR_A.to_ascii_lowercase())).await.is_pass());
    }

    #[tokio::test]
    async fn not_applicable_without_destination() {
        let policy = WhitelistPolicy::new(vec![ADDR_A], vec![ADDR_B]);

        let no_to = Operation::new("deploy", json!({"bytecode": "0x00"}), test_session());
        assert!(policy.check(&no_to).await.is_pass());

        let odd_shape = Operation::new("transfer", json!({"to": 42}), test_session());
        assert!(policy.check(&odd_shape).await.is_pass());
    }
}
