//! Bounded retry with provider-specific backoff.

use std::future::Future;
use std::time::Duration;

/// How a failed upstream call should be handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Failure {
    /// HTTP 429. Raw `Retry-After` header value (seconds), if any.
    RateLimited {
        /// Raw header value.
        retry_after: Option<String>,
    },
    /// HTTP 503.
    Unavailable,
    /// HTTP 404. Never retried.
    NotFound,
    /// Anything else.
    Other,
}

/// Errors which can be classified into a [`Failure`].
pub trait Classify {
    /// Classify this error.
    fn classify(&self) -> Failure;
}

/// Retry budget and delays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Sleep before every attempt.
    pub pre_delay: Duration,
    /// Base for linear and exponential backoff.
    pub base_delay: Duration,
    /// Cap on exponential (503) backoff.
    pub max_backoff: Duration,
    /// Used when a 429 has no parseable `Retry-After`.
    pub default_retry_after: Duration,
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            pre_delay: Duration::from_millis(100),
            base_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            default_retry_after: Duration::from_secs(10),
        }
    }
}
impl RetryPolicy {
    /// Single attempt, no delays.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            pre_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// How long to wait after `failure` on the zero-indexed `attempt`.
    /// `None` means rethrow immediately.
    pub fn backoff(&self, failure: &Failure, attempt: u32) -> Option<Duration> {
        match failure {
            Failure::NotFound => None,
            Failure::RateLimited { retry_after } => Some(
                retry_after
                    .as_deref()
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(self.default_retry_after),
            ),
            Failure::Unavailable => Some(
                self.base_delay
                    .saturating_mul(2_u32.saturating_pow(attempt))
                    .min(self.max_backoff),
            ),
            Failure::Other => Some(self.base_delay.saturating_mul(attempt + 1)),
        }
    }
}

/// Run `op` until it succeeds, it fails with [`Failure::NotFound`], or the policy's attempts
/// are exhausted, returning the last error. `context` labels the log lines.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    context: &str,
    mut op: F,
) -> Result<T, E>
where
    E: Classify + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        if !policy.pre_delay.is_zero() {
            tokio::time::sleep(policy.pre_delay).await;
        }
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let failure = err.classify();
        let delay = match policy.backoff(&failure, attempt) {
            Some(delay) if attempt + 1 < attempts => delay,
            _ => {
                log::debug!("{}: giving up after attempt {}: {}", context, attempt + 1, err);
                return Err(err);
            }
        };
        log::warn!(
            "{}: attempt {}/{} failed ({:?}), retrying in {:?}: {}",
            context,
            attempt + 1,
            attempts,
            failure,
            delay,
            err,
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;
    use crate::fake::assert_elapsed;

    #[derive(Debug)]
    struct TestError(Failure);
    impl Classify for TestError {
        fn classify(&self) -> Failure {
            self.0.clone()
        }
    }
    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            pre_delay: Duration::ZERO,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_backoff() {
        let p = policy();
        let limited = |s: &str| Failure::RateLimited {
            retry_after: Some(s.to_owned()),
        };
        assert_eq!(Some(Duration::from_secs(5)), p.backoff(&limited("5"), 0));
        assert_eq!(Some(Duration::from_secs(10)), p.backoff(&limited("soon"), 0));
        assert_eq!(
            Some(Duration::from_secs(10)),
            p.backoff(&Failure::RateLimited { retry_after: None }, 2)
        );
        assert_eq!(Some(Duration::from_secs(1)), p.backoff(&Failure::Unavailable, 0));
        assert_eq!(Some(Duration::from_secs(8)), p.backoff(&Failure::Unavailable, 3));
        assert_eq!(Some(Duration::from_secs(30)), p.backoff(&Failure::Unavailable, 10));
        assert_eq!(Some(Duration::from_secs(3)), p.backoff(&Failure::Other, 2));
        assert_eq!(None, p.backoff(&Failure::NotFound, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_waits_retry_after() {
        let calls = &AtomicU32::new(0);
        let start = Instant::now();
        let out = with_retry(&policy(), "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TestError(Failure::RateLimited {
                    retry_after: Some("5".to_owned()),
                }))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(7, out.unwrap());
        assert_eq!(2, calls.load(Ordering::SeqCst));
        assert_elapsed(start, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let start = Instant::now();
        let out: Result<(), _> = with_retry(&policy(), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError(Failure::NotFound))
        })
        .await;
        assert_eq!(Failure::NotFound, out.unwrap_err().0);
        assert_eq!(1, calls.load(Ordering::SeqCst));
        assert_elapsed(start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_then_success() {
        let calls = &AtomicU32::new(0);
        let start = Instant::now();
        let out = with_retry(&policy(), "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(TestError(Failure::Unavailable))
            } else {
                Ok("ok")
            }
        })
        .await;
        assert_eq!("ok", out.unwrap());
        assert_eq!(4, calls.load(Ordering::SeqCst));
        // 1s + 2s + 4s.
        assert_elapsed(start, Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted() {
        let calls = &AtomicU32::new(0);
        let start = Instant::now();
        let out: Result<(), _> = with_retry(&policy(), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError(Failure::Other))
        })
        .await;
        assert_eq!(Failure::Other, out.unwrap_err().0);
        assert_eq!(4, calls.load(Ordering::SeqCst));
        // 1s + 2s + 3s, no sleep after the last attempt.
        assert_elapsed(start, Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_delay() {
        let p = RetryPolicy {
            pre_delay: Duration::from_millis(250),
            ..RetryPolicy::default()
        };
        let start = Instant::now();
        let out: Result<u8, TestError> = with_retry(&p, "test", || async { Ok(1) }).await;
        assert_eq!(1, out.unwrap());
        assert_elapsed(start, Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_none_policy_single_attempt() {
        let calls = &AtomicU32::new(0);
        let out: Result<(), _> = with_retry(&RetryPolicy::none(), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError(Failure::Unavailable))
        })
        .await;
        assert!(out.is_err());
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }
}
