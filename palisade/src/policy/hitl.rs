//! Human-in-the-loop approval gate.
//!
//! Transactions above a configured value threshold are presented through an
//! [`ApprovalHandler`] and held until a human answers, bounded by a timeout.
//! The built-in [`ConsoleApproval`] handler prompts on stdout and reads a
//! y/N line from stdin; hosts with richer UIs plug in their own handler.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use super::{Operation, Policy, Verdict};

/// The operation presented to a human for approval.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    /// Tool being invoked.
    pub tool: String,
    /// Raw argument bag.
    pub args: Value,
    /// The configured threshold that was crossed, in wei.
    pub threshold: U256,
    /// The operation's value, in wei.
    pub amount: U256,
}

/// Channel through which approval is requested.
///
/// Implementations may block for as long as they like; the policy bounds
/// the wait with its timeout and drops the pending future when it elapses.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Present the request and wait for a decision.
    ///
    /// `Ok(true)` approves, `Ok(false)` rejects.
    async fn request_approval(&self, request: &ApprovalRequest) -> std::io::Result<bool>;
}

/// Pauses execution and requests human approval for transactions whose
/// value exceeds the threshold.
///
/// Applies only to write-set tools carrying a numeric amount. Three
/// outcomes: approval within the timeout passes; rejection denies; and an
/// expired timeout denies without waiting on the handler any further.
pub struct HitlPolicy {
    threshold: Option<U256>,
    timeout: Duration,
    handler: Arc<dyn ApprovalHandler>,
}

impl std::fmt::Debug for HitlPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HitlPolicy")
            .field("threshold", &self.threshold)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HitlPolicy {
    /// Default approval timeout when none is configured.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

    /// Create a policy with a threshold, timeout, and approval channel.
    ///
    /// A `None` threshold disables the gate entirely; a zero timeout falls
    /// back to [`Self::DEFAULT_TIMEOUT`].
    #[must_use]
    pub fn new(
        threshold: Option<U256>,
        timeout: Duration,
        handler: Arc<dyn ApprovalHandler>,
    ) -> Self {
        Self {
            threshold,
            timeout: if timeout.is_zero() {
                Self::DEFAULT_TIMEOUT
            } else {
                timeout
            },
            handler,
        }
    }
}

#[async_trait]
impl Policy for HitlPolicy {
    fn name(&self) -> &str {
        "hitl"
    }

    async fn check(&self, op: &Operation) -> Verdict {
        if !op.is_write() {
            return Verdict::Pass;
        }
        let Some(amount) = op.amount() else {
            return Verdict::Pass;
        };
        let Some(threshold) = self.threshold else {
            return Verdict::Pass;
        };
        if amount <= threshold {
            return Verdict::Pass;
        }

        let request = ApprovalRequest {
            tool: op.tool.clone(),
            args: op.args.clone(),
            threshold,
            amount,
        };

        // The timeout drops the pending handler future, so an unanswered
        // prompt does not linger past the deadline.
        match tokio::time::timeout(self.timeout, self.handler.request_approval(&request)).await {
            Ok(Ok(true)) => {
                info!(tool = %op.tool, %amount, "transaction approved by human operator");
                Verdict::Pass
            }
            Ok(Ok(false)) => Verdict::deny("rejected by human operator"),
            Ok(Err(err)) => Verdict::deny(format!("approval channel error: {err}")),
            Err(_) => Verdict::deny(format!(
                "human approval timed out after {:?}",
                self.timeout
            )),
        }
    }
}

/// Console approval channel: prompt on stdout, read a y/N line from stdin.
///
/// Caveat: when the policy's timeout drops a pending prompt, the underlying
/// blocking stdin read stays alive, and a line typed after the deadline may
/// be consumed as the answer to the next prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleApproval;

#[async_trait]
impl ApprovalHandler for ConsoleApproval {
    #[allow(clippy::print_stdout)]
    async fn request_approval(&self, request: &ApprovalRequest) -> std::io::Result<bool> {
        println!("\n=== HUMAN APPROVAL REQUIRED ===");
        println!("Tool:      {}", request.tool);
        println!("Arguments: {}", request.args);
        println!("Threshold: {} wei", request.threshold);
        println!("Amount:    {} wei", request.amount);
        print!("Approve? (y/N): ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        reader.read_line(&mut line).await?;

        let answer = line.trim().to_ascii_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}
