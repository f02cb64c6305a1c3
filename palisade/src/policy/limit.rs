//! Per-transaction and rolling-daily spend limits.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use tokio::time::Instant;

use super::{Operation, Policy, Verdict};

/// Per-identity record of spend inside the current rolling window.
#[derive(Debug, Clone, Copy)]
struct SpendWindow {
    spent: U256,
    started_at: Instant,
}

/// Enforces an optional per-transaction ceiling and an optional rolling
/// 24-hour spend ceiling on native-currency value.
///
/// Spend windows are keyed by **session id**: two sessions backed by the
/// same wallet budget independently. Hosts that want per-wallet budgets
/// should run one session per wallet.
///
/// Tools outside the write set, and write tools without a numeric `amount`
/// argument, always pass — value-less operations are not value-limited.
#[derive(Debug)]
pub struct LimitPolicy {
    max_tx_value: Option<U256>,
    daily_limit: Option<U256>,
    window: Duration,
    windows: Mutex<HashMap<String, SpendWindow>>,
}

impl LimitPolicy {
    /// Create a policy with the given ceilings; `None` disables that check.
    #[must_use]
    pub fn new(max_tx_value: Option<U256>, daily_limit: Option<U256>) -> Self {
        Self {
            max_tx_value,
            daily_limit,
            window: Duration::from_secs(24 * 60 * 60),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Override the rolling window duration.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Atomic check-then-commit against the daily window for `key`.
    ///
    /// A denial must never count against future capacity, so the window is
    /// only mutated on the pass path. The lock is never held across an
    /// await point.
    fn check_daily(&self, key: String, amount: U256, limit: U256) -> Verdict {
        let mut windows = self.windows.lock().expect("poisoned lock");
        let now = Instant::now();
        let window = windows.entry(key).or_insert(SpendWindow {
            spent: U256::ZERO,
            started_at: now,
        });

        if now.duration_since(window.started_at) > self.window {
            window.spent = U256::ZERO;
            window.started_at = now;
        }

        let tentative = window.spent.saturating_add(amount);
        if tentative > limit {
            return Verdict::deny(format!(
                "daily limit exceeded: limit {limit}, already spent {spent}, attempted +{amount}",
                spent = window.spent,
            ));
        }
        window.spent = tentative;
        Verdict::Pass
    }
}

#[async_trait]
impl Policy for LimitPolicy {
    fn name(&self) -> &str {
        "limit"
    }

    async fn check(&self, op: &Operation) -> Verdict {
        if !op.is_write() {
            return Verdict::Pass;
        }
        let Some(amount) = op.amount() else {
            return Verdict::Pass;
        };

        if let Some(max) = self.max_tx_value
            && amount > max
        {
            return Verdict::deny(format!(
                "transaction value {amount} exceeds per-transaction limit {max}"
            ));
        }

        if let Some(limit) = self.daily_limit {
            return self.check_daily(op.session.id.to_string(), amount, limit);
        }
        Verdict::Pass
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use std::sync::Arc;

    use super::*;
    use crate::testutil::test_session;

    fn transfer(amount: &str, session: &Arc<crate::engine::Session>) -> Operation {
        Operation::new(
            "transfer",
            json!({"to": "0xaa", "amount": amount}),
            Arc::clone(session),
        )
    }

    #[tokio::test]
    async fn per_transaction_ceiling() {
        let policy = LimitPolicy::new(Some(U256::from(1u64)), None);
        let session = test_session();

        match policy.check(&transfer("2", &session)).await {
            Verdict::Deny(reason) => assert!(reason.contains("exceeds"), "got: {reason}"),
            Verdict::Pass => panic!("2 wei over a 1 wei ceiling must be denied"),
        }
        assert!(policy.check(&transfer("1", &session)).await.is_pass());
    }

    #[tokio::test]
    async fn daily_limit_accumulates_and_denies_without_mutating() {
        // Daily ceiling of 10; three 5-wei transfers from one identity.
        let policy = LimitPolicy::new(None, Some(U256::from(10u64)));
        let session = test_session();

        assert!(policy.check(&transfer("5", &session)).await.is_pass());
        assert!(policy.check(&transfer("5", &session)).await.is_pass());

        match policy.check(&transfer("5", &session)).await {
            Verdict::Deny(reason) => {
                assert!(reason.contains("daily limit exceeded"), "got: {reason}");
                assert!(reason.contains("already spent 10"), "got: {reason}");
            }
            Verdict::Pass => panic!("third transfer must be denied"),
        }

        // The denial must not have counted: zero headroom remains, so a
        // zero-wei transfer at exactly the limit still passes.
        assert!(policy.check(&transfer("0", &session)).await.is_pass());
    }

    #[tokio::test]
    async fn denied_attempt_preserves_headroom() {
        let policy = LimitPolicy::new(None, Some(U256::from(10u64)));
        let session = test_session();

        assert!(policy.check(&transfer("6", &session)).await.is_pass());
        assert!(!policy.check(&transfer("5", &session)).await.is_pass());
        // 4 wei of headroom must still be intact after the denial.
        assert!(policy.check(&transfer("4", &session)).await.is_pass());
    }

    #[tokio::test]
    async fn identities_budget_independently() {
        let policy = LimitPolicy::new(None, Some(U256::from(10u64)));
        let a = test_session();
        let b = test_session();

        assert!(policy.check(&transfer("10", &a)).await.is_pass());
        assert!(policy.check(&transfer("10", &b)).await.is_pass());
        assert!(!policy.check(&transfer("1", &a)).await.is_pass());
    }

    #[tokio::test(start_paused = true)]
    async fn window_reset_restores_capacity() {
        let policy = LimitPolicy::new(None, Some(U256::from(10u64)))
            .with_window(Duration::from_millis(50));
        let session = test_session();

        assert!(policy.check(&transfer("10", &session)).await.is_pass());
        assert!(!policy.check(&transfer("1", &session)).await.is_pass());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(policy.check(&transfer("10", &session)).await.is_pass());
    }

    #[tokio::test]
    async fn ignores_read_tools_and_value_less_operations() {
        let policy = LimitPolicy::new(Some(U256::ZERO), Some(U256::ZERO));
        let session = test_session();

        let read = Operation::new("balance", json!({"amount": "999"}), Arc::clone(&session));
        assert!(policy.check(&read).await.is_pass());

        let no_amount = Operation::new("deploy", json!({"bytecode": "0x00"}), session);
        assert!(policy.check(&no_amount).await.is_pass());
    }
}
