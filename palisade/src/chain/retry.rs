//! Retry-with-backoff as a higher-order operation.
//!
//! Every remote call the adapter makes runs through [`with_retry`], which
//! applies a uniform bounded-retry, exponential-backoff policy regardless of
//! the operation's concrete signature. Backoff waits race against the
//! caller's cancellation token so an in-flight retry loop exits immediately
//! with [`LedgerError::Cancelled`] instead of continuing to retry.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::LedgerError;

/// Bounded-retry policy for remote operations.
///
/// Invariants are enforced by [`RetryPolicy::clamped`]: at least one attempt,
/// positive backoff bounds, and a multiplier of at least 1.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for the backoff between attempts.
    pub max_backoff: Duration,
    /// Multiplicative backoff growth factor.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Return a copy with every field forced into its valid range.
    ///
    /// Out-of-range fields fall back to the corresponding default rather
    /// than erroring; a zero-attempt policy makes no sense for a caller that
    /// asked for the operation to happen at all.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        let default = Self::default();
        if self.max_attempts == 0 {
            self.max_attempts = 1;
        }
        if self.initial_backoff.is_zero() {
            self.initial_backoff = default.initial_backoff;
        }
        if self.max_backoff.is_zero() {
            self.max_backoff = default.max_backoff;
        }
        // The cap applies to every wait, including the first.
        if self.initial_backoff > self.max_backoff {
            self.initial_backoff = self.max_backoff;
        }
        if self.multiplier < 1.0 {
            self.multiplier = default.multiplier;
        }
        self
    }
}

/// Execute `call` up to `policy.max_attempts` times with exponential backoff.
///
/// On success the result is returned immediately and the attempt number is
/// logged at debug level. Each failure is logged as a warning; after the
/// final attempt the last error is wrapped in
/// [`LedgerError::RetriesExhausted`] together with the attempt count. The
/// backoff wait is raced against `cancel`; cancellation wins and surfaces as
/// [`LedgerError::Cancelled`].
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &str,
    mut call: F,
) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let policy = policy.clamped();
    let mut backoff = policy.initial_backoff;
    let mut last_err: Option<E> = None;

    for attempt in 1..=policy.max_attempts {
        match call().await {
            Ok(value) => {
                debug!(operation, attempt, "rpc call succeeded");
                return Ok(value);
            }
            Err(err) => {
                warn!(operation, attempt, error = %err, "rpc call failed");
                last_err = Some(err);
            }
        }

        if attempt == policy.max_attempts {
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(LedgerError::Cancelled),
            () = tokio::time::sleep(backoff) => {}
        }
        backoff = backoff.mul_f64(policy.multiplier).min(policy.max_backoff);
    }

    let source = last_err.map_or_else(
        || "no attempts were made".into(),
        |err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>,
    );
    Err(LedgerError::RetriesExhausted {
        operation: operation.to_owned(),
        attempts: policy.max_attempts,
        source,
    })
}
