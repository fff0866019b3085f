//! Retry/Backoff Engine
//!
//! Classifies failures into retryable/rate-limited/fatal and schedules
//! exponential backoff with jitter. Rate limits get their own, much longer
//! backoff ladder (5s, 10s, 20s, ...) and a separate attempt cap, because
//! persistent rate limiting means the caller should rotate providers rather
//! than keep waiting on the same one.
//!
//! The classification and delay math are pure functions so the decision
//! logic is testable without any network mocking; only `execute_with_retry`
//! touches the clock.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::constants::retry as retry_constants;
use crate::types::{ErrorCategory, RedpenError, Result};

/// Retry configuration, immutable per call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retries after the initial attempt
    pub max_retries: u32,
    /// Base delay for the first retry
    pub initial_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Exponential growth factor (>= 1)
    pub backoff_multiplier: f64,
    /// Jitter as a fraction of the computed delay, in [0, 1]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: retry_constants::MAX_RETRIES,
            initial_delay: Duration::from_millis(retry_constants::INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(retry_constants::MAX_DELAY_MS),
            backoff_multiplier: retry_constants::BACKOFF_MULTIPLIER,
            jitter_factor: retry_constants::JITTER_FACTOR,
        }
    }
}

/// How a failure should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Provider quota exceeded - long backoff, then rotate
    RateLimited,
    /// Connection-level fault - retry with generic backoff
    RetryableNetwork,
    /// Everything else - never retry with the same inputs
    Fatal,
}

impl FailureClass {
    pub fn of(err: &RedpenError) -> Self {
        match err {
            RedpenError::Llm(e) => match e.category {
                ErrorCategory::RateLimit => FailureClass::RateLimited,
                ErrorCategory::Network | ErrorCategory::Transient => {
                    FailureClass::RetryableNetwork
                }
                _ => FailureClass::Fatal,
            },
            // A timed-out request was cancelled at the deadline and unwinds
            // like any other connection fault.
            RedpenError::Timeout { .. } | RedpenError::Io(_) => FailureClass::RetryableNetwork,
            _ => FailureClass::Fatal,
        }
    }
}

/// Compute the delay before retry number `attempt` (0-based)
///
/// `min(initial * multiplier^attempt, max)`, jittered by
/// `± delay * jitter_factor`, floored at the initial delay.
pub fn compute_backoff(attempt: u32, policy: &RetryPolicy) -> Duration {
    let initial = policy.initial_delay.as_millis() as f64;
    let capped = (initial * policy.backoff_multiplier.powi(attempt as i32))
        .min(policy.max_delay.as_millis() as f64);

    let jitter = capped * policy.jitter_factor * rand::rng().random_range(-1.0..=1.0);
    let delay = (capped + jitter).max(initial);

    Duration::from_millis(delay.round() as u64)
}

/// Backoff for rate-limited responses: 5s, 10s, 20s, 40s... capped at 2 minutes
pub fn rate_limit_backoff(attempt: u32) -> Duration {
    let policy = RetryPolicy {
        max_retries: retry_constants::RATE_LIMIT_MAX_ATTEMPTS,
        initial_delay: Duration::from_millis(retry_constants::RATE_LIMIT_INITIAL_DELAY_MS),
        max_delay: Duration::from_millis(retry_constants::RATE_LIMIT_MAX_DELAY_MS),
        backoff_multiplier: 2.0,
        jitter_factor: retry_constants::JITTER_FACTOR,
    };
    compute_backoff(attempt, &policy)
}

/// Run an operation with retry and backoff
///
/// - Fatal failures are returned immediately, with no wasted delay.
/// - Rate limits use the long backoff ladder and give up after
///   [`retry_constants::RATE_LIMIT_MAX_ATTEMPTS`] rate-limited attempts.
/// - Retryable network failures back off up to `policy.max_retries` times.
///
/// Exhausting all attempts returns the last observed error.
pub async fn execute_with_retry<T, F, Fut>(
    mut op: F,
    policy: &RetryPolicy,
    op_name: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<RedpenError> = None;
    let mut rate_limit_attempts = 0u32;

    for attempt in 0..=policy.max_retries {
        debug!(
            op = op_name,
            attempt = attempt + 1,
            max = policy.max_retries + 1,
            "attempt"
        );

        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(op = op_name, attempt = attempt + 1, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => match FailureClass::of(&err) {
                FailureClass::Fatal => {
                    warn!(op = op_name, error = %err, "fatal error, not retrying");
                    return Err(err);
                }
                FailureClass::RateLimited => {
                    rate_limit_attempts += 1;
                    if rate_limit_attempts > retry_constants::RATE_LIMIT_MAX_ATTEMPTS {
                        warn!(op = op_name, "too many rate limit errors, giving up");
                        return Err(err);
                    }
                    let delay = rate_limit_backoff(rate_limit_attempts - 1);
                    warn!(
                        op = op_name,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    last_error = Some(err);
                    sleep(delay).await;
                }
                FailureClass::RetryableNetwork => {
                    if attempt < policy.max_retries {
                        let delay = compute_backoff(attempt, policy);
                        warn!(
                            op = op_name,
                            error = %err,
                            delay_ms = delay.as_millis() as u64,
                            "retryable error, backing off"
                        );
                        last_error = Some(err);
                        sleep(delay).await;
                    } else {
                        warn!(
                            op = op_name,
                            attempts = policy.max_retries + 1,
                            "all attempts failed"
                        );
                        last_error = Some(err);
                    }
                }
            },
        }
    }

    Err(last_error.unwrap_or_else(|| {
        RedpenError::llm(
            ErrorCategory::Unknown,
            format!("{} failed after {} attempts", op_name, policy.max_retries + 1),
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LlmError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_jitter_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    fn network_error() -> RedpenError {
        RedpenError::Llm(LlmError::new(
            ErrorCategory::Network,
            "connection reset by peer",
        ))
    }

    fn rate_limit_error() -> RedpenError {
        RedpenError::Llm(LlmError::new(ErrorCategory::RateLimit, "429 too many requests"))
    }

    #[test]
    fn test_backoff_doubles_without_jitter() {
        let policy = no_jitter_policy();
        assert_eq!(compute_backoff(0, &policy), Duration::from_millis(1_000));
        assert_eq!(compute_backoff(1, &policy), Duration::from_millis(2_000));
        assert_eq!(compute_backoff(2, &policy), Duration::from_millis(4_000));
    }

    #[test]
    fn test_backoff_monotonic_and_capped() {
        let policy = no_jitter_policy();
        let mut prev = Duration::ZERO;
        for attempt in 0..12 {
            let delay = compute_backoff(attempt, &policy);
            assert!(delay >= prev);
            assert!(delay <= policy.max_delay);
            prev = delay;
        }
        assert_eq!(compute_backoff(20, &policy), policy.max_delay);
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let policy = RetryPolicy {
            jitter_factor: 0.1,
            ..no_jitter_policy()
        };
        for _ in 0..100 {
            let delay = compute_backoff(1, &policy);
            // 2000ms ± 10%, floored at the initial delay
            assert!(delay >= Duration::from_millis(1_800));
            assert!(delay <= Duration::from_millis(2_200));
        }
    }

    #[test]
    fn test_backoff_floored_at_initial() {
        let policy = RetryPolicy {
            jitter_factor: 1.0,
            ..no_jitter_policy()
        };
        for _ in 0..100 {
            assert!(compute_backoff(0, &policy) >= policy.initial_delay);
        }
    }

    #[test]
    fn test_rate_limit_backoff_ladder() {
        // 5s, 10s, 20s with ±10% jitter
        for _ in 0..20 {
            let first = rate_limit_backoff(0);
            assert!(first >= Duration::from_millis(5_000));
            assert!(first <= Duration::from_millis(5_500));

            let second = rate_limit_backoff(1);
            assert!(second >= Duration::from_millis(9_000));
            assert!(second <= Duration::from_millis(11_000));
        }
    }

    #[test]
    fn test_failure_class_mapping() {
        assert_eq!(
            FailureClass::of(&rate_limit_error()),
            FailureClass::RateLimited
        );
        assert_eq!(
            FailureClass::of(&network_error()),
            FailureClass::RetryableNetwork
        );
        assert_eq!(
            FailureClass::of(&RedpenError::llm(
                ErrorCategory::TokenLimit,
                "message too long"
            )),
            FailureClass::Fatal
        );
        assert_eq!(
            FailureClass::of(&RedpenError::timeout("llm request", Duration::from_secs(15))),
            FailureClass::RetryableNetwork
        );
        assert_eq!(
            FailureClass::of(&RedpenError::Validation("empty manuscript".into())),
            FailureClass::Fatal
        );
    }

    #[tokio::test]
    async fn test_fatal_error_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<()> = execute_with_retry(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(RedpenError::llm(ErrorCategory::TokenLimit, "message too long"))
                }
            },
            &no_jitter_policy(),
            "fatal-op",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_network_errors_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = execute_with_retry(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(network_error())
                    } else {
                        Ok(42)
                    }
                }
            },
            &no_jitter_policy(),
            "flaky-op",
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_gives_up_after_cap() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<()> = execute_with_retry(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(rate_limit_error())
                }
            },
            &no_jitter_policy(),
            "limited-op",
        )
        .await;

        assert!(result.is_err());
        // Initial attempt plus RATE_LIMIT_MAX_ATTEMPTS backoffs
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let policy = RetryPolicy {
            max_retries: 2,
            ..no_jitter_policy()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<()> = execute_with_retry(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(network_error())
                }
            },
            &policy,
            "dead-op",
        )
        .await;

        assert!(matches!(result, Err(RedpenError::Llm(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
