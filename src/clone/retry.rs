//! clone::retry
//!
//! Bounded retry with exponential backoff.
//!
//! # Overview
//!
//! [`retry`] runs an async operation up to `policy.max_attempts()` times.
//! After a failed attempt `i` that the caller's predicate marks retryable, it
//! sleeps for `policy.delay(i)` on the tokio timer, so other tasks keep
//! running during the backoff. A non-retryable failure returns at once.
//!
//! [`retry_until`] adds a stop future. When it resolves during a backoff the
//! executor gives up and returns the last failure with `cancelled` set. An
//! attempt already in flight is never interrupted.
//!
//! The executor knows nothing about git; the clone pool passes a predicate
//! built on [`super::classify::is_retryable`].
//!
//! # Example
//!
//! ```
//! use mirrorfleet::clone::retry::retry;
//! use mirrorfleet::core::config::RetryPolicy;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let policy = RetryPolicy::default();
//! let result = retry(&policy, |attempt| async move {
//!     if attempt == 1 { Err("connection reset") } else { Ok(attempt) }
//! }, |e: &&str| e.contains("reset")).await;
//! # let _ = result;
//! # }
//! ```

use std::future::Future;

use tracing::debug;

use crate::core::config::RetryPolicy;

/// A successful result and the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// The last failure of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryError<E> {
    /// Error from the final attempt
    pub error: E,
    /// Attempts made, including the final one
    pub attempts: u32,
    /// Whether the policy ran out of attempts (as opposed to a
    /// non-retryable failure)
    pub exhausted: bool,
    /// Whether the stop future ended a backoff early
    pub cancelled: bool,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.exhausted {
            write!(f, "attempts exhausted after {}: {}", self.attempts, self.error)
        } else if self.cancelled {
            write!(f, "cancelled after {} attempts: {}", self.attempts, self.error)
        } else {
            write!(f, "{}", self.error)
        }
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Run `operation` under `policy`.
///
/// `operation` receives the 1-based attempt number. `is_retryable` decides
/// whether a failure earns another attempt.
///
/// # Errors
///
/// Returns the final failure wrapped in [`RetryError`], with `exhausted`
/// set when every allowed attempt failed.
pub async fn retry<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    operation: F,
    is_retryable: R,
) -> Result<Attempted<T>, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    retry_until(policy, operation, is_retryable, std::future::pending()).await
}

/// Like [`retry`], but abandons the remaining attempts once `stop` resolves.
///
/// `stop` is only raced against the backoff sleeps.
///
/// # Errors
///
/// As [`retry`]; a stop during backoff returns the last failure with
/// `cancelled` set.
pub async fn retry_until<T, E, F, Fut, R, S>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: R,
    stop: S,
) -> Result<Attempted<T>, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    S: Future<Output = ()>,
{
    let max_attempts = policy.max_attempts().max(1);
    let mut attempt = 1;
    tokio::pin!(stop);

    loop {
        match operation(attempt).await {
            Ok(value) => {
                return Ok(Attempted {
                    value,
                    attempts: attempt,
                })
            }
            Err(error) => {
                if !is_retryable(&error) {
                    return Err(RetryError {
                        error,
                        attempts: attempt,
                        exhausted: false,
                        cancelled: false,
                    });
                }
                if attempt >= max_attempts {
                    return Err(RetryError {
                        error,
                        attempts: attempt,
                        exhausted: true,
                        cancelled: false,
                    });
                }

                let delay = policy.delay(attempt);
                debug!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retryable failure, backing off"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = &mut stop => {
                        debug!(attempt, "stopped during backoff");
                        return Err(RetryError {
                            error,
                            attempts: attempt,
                            exhausted: false,
                            cancelled: true,
                        });
                    }
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_secs(1), 2.0, Duration::from_secs(3)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_takes_one_attempt() {
        let result = retry(&policy(3), |_| async { Ok::<_, String>(7) }, |_| true).await;
        assert_eq!(
            result.unwrap(),
            Attempted {
                value: 7,
                attempts: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result = retry(
            &policy(3),
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err("Connection refused")
                    } else {
                        Ok("done")
                    }
                }
            },
            |_| true,
        )
        .await
        .unwrap();

        assert_eq!(result.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after attempt 1, 2s after attempt 2
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_returns_immediately() {
        let calls = AtomicU32::new(0);
        let err = retry(
            &policy(5),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("Permission denied") }
            },
            |_| false,
        )
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts, 1);
        assert!(!err.exhausted);
        assert_eq!(err.to_string(), "Permission denied");
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_is_tagged() {
        let start = Instant::now();
        let err = retry(&policy(4), |_| async { Err::<(), _>("timeout") }, |_| true)
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 4);
        assert!(err.exhausted);
        assert!(err.to_string().starts_with("attempts exhausted after 4"));
        // 1 + 2 + 3 (capped)
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_backoff() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let err = retry_until(
            &policy(5),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("Connection refused") }
            },
            |_| true,
            tokio::time::sleep(Duration::from_millis(300)),
        )
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts, 1);
        assert!(err.cancelled);
        assert!(!err.exhausted);
        assert_eq!(err.error, "Connection refused");
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_does_not_cut_short_a_success() {
        let result = retry_until(
            &policy(3),
            |attempt| async move { if attempt < 2 { Err("reset") } else { Ok(attempt) } },
            |_| true,
            tokio::time::sleep(Duration::from_secs(60)),
        )
        .await
        .unwrap();
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_does_not_block_other_tasks() {
        let sibling = tokio::spawn(async { 42 });
        let err = retry(&policy(2), |_| async { Err::<(), _>("reset") }, |_| true)
            .await
            .unwrap_err();
        assert!(err.exhausted);
        assert_eq!(sibling.await.unwrap(), 42);
    }
}
