//! Bounded retry with exponential backoff
//!
//! Every storage request made by the engine goes through a [`RetryPolicy`]:
//! each attempt has its own deadline, transient failures are retried after
//! a capped exponential backoff, and exhausting the attempts turns the last
//! failure into [`Error::RetriesExhausted`].
//!
//! Deadlines never cover an unbounded transfer. Requests without a body get
//! `attempt_timeout`; a buffered range read gets extra time proportional to
//! its length; a streamed body is only bounded by `idle_timeout` between
//! chunks.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::storage::{RetryConfig, TimeoutConfig};

/// Retry ceiling, backoff and per-attempt deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per request, including the first (at least 1)
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Deadline for one attempt, transfer time excluded
    pub attempt_timeout: Duration,
    /// Longest wait for the next chunk of a streamed body
    pub idle_timeout: Duration,
    /// Bytes per second a buffered range read is allowed to crawl at
    pub min_throughput: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default(), &TimeoutConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(retry: &RetryConfig, timeout: &TimeoutConfig) -> Self {
        Self {
            max_attempts: retry.max_attempts.max(1),
            initial_backoff: Duration::from_millis(retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(retry.max_backoff_ms),
            attempt_timeout: Duration::from_millis(timeout.operation_ms),
            idle_timeout: Duration::from_millis(timeout.read_ms),
            min_throughput: timeout.min_throughput_bytes_per_sec.max(1),
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Deadline for one attempt that transfers `bytes` into memory
    pub fn deadline_for(&self, bytes: u64) -> Duration {
        let transfer = Duration::from_secs_f64(bytes as f64 / self.min_throughput.max(1) as f64);
        self.attempt_timeout.saturating_add(transfer)
    }

    /// Run `op` until it succeeds, fails permanently, or runs out of attempts
    pub async fn run<T, F, Fut>(&self, operation: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_with_deadline(operation, self.attempt_timeout, op)
            .await
    }

    /// Like [`RetryPolicy::run`] with an explicit per-attempt deadline
    pub async fn run_with_deadline<T, F, Fut>(
        &self,
        operation: &str,
        deadline: Duration,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match within(operation, deadline, op()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let delay = self.retry_delay(operation, attempt, e)?;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Decide what follows failed attempt number `attempt`
    ///
    /// Returns the backoff before the next attempt, or the error to report
    /// when the failure is permanent or the attempts are used up.
    pub fn retry_delay(&self, operation: &str, attempt: u32, err: Error) -> Result<Duration> {
        let max_attempts = self.max_attempts.max(1);
        if !err.is_retryable() {
            return Err(err);
        }
        if attempt >= max_attempts {
            return Err(Error::RetriesExhausted {
                operation: operation.to_string(),
                attempts: attempt,
                last: Box::new(err),
            });
        }

        let delay = self.backoff(attempt);
        tracing::warn!(
            operation,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying storage request"
        );
        Ok(delay)
    }
}

/// Await `fut`, failing with [`Error::Timeout`] once `deadline` passes
pub async fn within<T, Fut>(operation: &str, deadline: Duration, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(outcome) => outcome,
        Err(_) => Err(Error::Timeout {
            operation: operation.to_string(),
            millis: deadline.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            attempt_timeout: Duration::from_secs(5),
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1000),
            ..fast_policy(10)
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_millis(1000));
        assert_eq!(policy.backoff(64), Duration::from_millis(1000));
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from_config(
            &RetryConfig {
                max_attempts: 0,
                ..Default::default()
            },
            &TimeoutConfig {
                read_ms: 2000,
                ..Default::default()
            },
        );
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(30));
        assert_eq!(policy.idle_timeout, Duration::from_secs(2));
        assert_eq!(policy.min_throughput, 64 * 1024);
    }

    #[test]
    fn test_deadline_scales_with_part_length() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.deadline_for(0), Duration::from_secs(30));
        // 50 MiB at 64 KiB/s is 800 s on top of the request deadline
        assert_eq!(
            policy.deadline_for(50 * 1024 * 1024),
            Duration::from_secs(830)
        );
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let calls = &AtomicU32::new(0);
        let value = fast_policy(3)
            .run("get", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::Network("connection reset".into()))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_fatal() {
        let calls = &AtomicU32::new(0);
        let err = fast_policy(2)
            .run("get", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::Network("connection reset".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(err, Error::RetriesExhausted { attempts: 2, .. }));
        assert_eq!(err.kind(), crate::ErrorKind::FatalFetchFailure);
    }

    #[tokio::test]
    async fn test_terminal_error_not_retried() {
        let calls = &AtomicU32::new(0);
        let err = fast_policy(5)
            .run("head", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::NotFound("object".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_retried() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy {
            attempt_timeout: Duration::from_millis(10),
            ..fast_policy(2)
        };
        let value = policy
            .run("get", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok("done")
            })
            .await
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_longer_deadline_outlasts_request_timeout() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy {
            attempt_timeout: Duration::from_millis(10),
            ..fast_policy(1)
        };
        let value = policy
            .run_with_deadline("read", Duration::from_secs(5), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok("slow but fine")
            })
            .await
            .unwrap();
        assert_eq!(value, "slow but fine");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_delay_decisions() {
        let policy = fast_policy(2);
        assert_eq!(
            policy
                .retry_delay("get", 1, Error::Network("reset".into()))
                .unwrap(),
            Duration::from_millis(1)
        );
        assert!(matches!(
            policy.retry_delay("get", 2, Error::Network("reset".into())),
            Err(Error::RetriesExhausted { attempts: 2, .. })
        ));
        assert!(matches!(
            policy.retry_delay("get", 1, Error::ObjectChanged { key: "k".into() }),
            Err(Error::ObjectChanged { .. })
        ));
    }
}
