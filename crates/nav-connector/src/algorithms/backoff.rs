//! Exponential backoff for transient transport failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::config::RetryPolicy;
use crate::domain::{ConnectorError, TransportError};
use crate::ports::Clock;

/// Why [`retry_with_backoff`] gave up.
#[derive(Debug)]
pub enum RetryError {
    /// Not worth retrying; returned as-is.
    Fatal(ConnectorError),
    /// Retry budget spent.
    Exhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Last failure.
        last: TransportError,
    },
    /// An attempt or the next backoff would end after the deadline.
    DeadlineReached(TransportError),
}

/// Delay before retry number `attempt` (0-based): exponential, capped, plus jitter.
pub fn backoff_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let exp = policy
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped = exp.min(policy.max_backoff_ms);
    let jitter = if policy.jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=policy.jitter_ms)
    };
    Duration::from_millis(capped.saturating_add(jitter))
}

/// Run `op`, retrying retryable transport failures until it succeeds, the
/// policy is spent, or an attempt or backoff would cross `deadline` (on
/// `clock`'s monotonic scale).
///
/// Each attempt gets only the time left before `deadline`; one still running
/// at that point is dropped and reported as [`TransportError::Timeout`].
pub async fn retry_with_backoff<T, F, Fut, C>(
    clock: &C,
    policy: &RetryPolicy,
    deadline: Duration,
    mut op: F,
) -> Result<T, RetryError>
where
    C: Clock + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ConnectorError>> + Send,
    T: Send,
{
    let mut failures = 0u32;
    loop {
        let remaining = deadline.saturating_sub(clock.elapsed());
        let Some(outcome) = clock.timeout(remaining, op()).await else {
            return Err(RetryError::DeadlineReached(TransportError::Timeout));
        };
        match outcome {
            Ok(value) => return Ok(value),
            Err(ConnectorError::Transport(err)) if err.is_retryable() => {
                failures += 1;
                if failures > policy.max_retries {
                    return Err(RetryError::Exhausted {
                        attempts: failures,
                        last: err,
                    });
                }

                let delay = backoff_delay(failures - 1, policy);
                if clock.elapsed().saturating_add(delay) > deadline {
                    return Err(RetryError::DeadlineReached(err));
                }
                warn!(
                    "[nav] Transient failure ({}), retry {}/{} in {:?}",
                    err, failures, policy.max_retries, delay
                );
                clock.sleep(delay).await;
            }
            Err(other) => return Err(RetryError::Fatal(other)),
        }
    }
}
