//! Retry driver with exponential backoff and jitter
//!
//! Repeatedly invokes a caller-supplied async operation until it succeeds,
//! a non-retryable failure occurs, or the retry budget is exhausted. The
//! executor keeps no state across calls; everything it needs is in the
//! `RetryConfig` supplied per call site.

use std::collections::HashSet;
use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, warn};

use crate::retry::classify::{ClassifiedError, ErrorCategory};
use crate::transport::TransportError;

/// Retry policy for one call site. Immutable for the duration of a retry
/// sequence.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt; 3 means up to 4 invocations total
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Exponential growth factor between successive delays
    pub backoff_multiplier: f64,
    /// Statuses retried in addition to the blanket 5xx rule
    pub retryable_status_codes: HashSet<u16>,
    /// Whether connection-level failures are retried
    pub retry_on_network_error: bool,
    /// Whether to randomize delays by up to ±10%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
            retryable_status_codes: [408, 429, 500, 502, 503, 504].into_iter().collect(),
            retry_on_network_error: true,
            jitter: true,
        }
    }
}

/// What an eventually-successful retry sequence looked like
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// The operation's result
    pub value: T,
    /// Total invocations, including the successful one
    pub attempts_used: u32,
    /// Wall-clock time across all attempts and backoff waits
    pub elapsed: Duration,
    /// True when at least one retry happened
    pub was_retried: bool,
    /// Classified failures from the attempts that did not succeed
    pub prior_errors: Vec<ClassifiedError>,
}

/// Runs `operation` with retries under `config`.
///
/// On success returns a [`RetryOutcome`]. A non-retryable failure is raised
/// on its first occurrence; a retryable failure is raised only after
/// `max_retries + 1` total attempts, and the error raised is always the
/// last one observed.
pub async fn execute_with_retry<T, F, Fut>(
    mut operation: F,
    config: &RetryConfig,
    context: &str,
) -> Result<RetryOutcome<T>, ClassifiedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let started = Instant::now();
    let mut prior_errors: Vec<ClassifiedError> = Vec::new();
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => {
                debug!(context, attempt = attempt + 1, "call succeeded");
                return Ok(RetryOutcome {
                    value,
                    attempts_used: attempt + 1,
                    elapsed: started.elapsed(),
                    was_retried: attempt > 0,
                    prior_errors,
                });
            }
            Err(err) => {
                let classified = ClassifiedError::from_transport(&err);
                warn!(
                    context,
                    attempt = attempt + 1,
                    category = ?classified.category,
                    retryable = classified.retryable,
                    "call failed: {}",
                    classified.message
                );

                let give_up = !should_retry(&classified, config) || attempt >= config.max_retries;
                if give_up {
                    warn!(context, attempts = attempt + 1, "giving up after final failure");
                    return Err(classified);
                }
                prior_errors.push(classified);

                let delay = compute_delay(attempt, config);
                debug!(
                    context,
                    delay_ms = delay.as_millis() as u64,
                    next_attempt = attempt + 2,
                    max_attempts = config.max_retries + 1,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Applies the config's knobs on top of the classifier's verdict
fn should_retry(err: &ClassifiedError, config: &RetryConfig) -> bool {
    match err.category {
        ErrorCategory::Network => config.retry_on_network_error,
        ErrorCategory::Timeout => true,
        ErrorCategory::Http => match err.http_status {
            Some(status) => config.retryable_status_codes.contains(&status) || status >= 500,
            None => false,
        },
        ErrorCategory::Parse | ErrorCategory::Unknown => false,
    }
}

/// Delay before the retry that follows `attempt` (0-based):
/// `min(base * multiplier^attempt, max)`, with optional ±10% jitter.
fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exponential =
        config.base_delay.as_millis() as f64 * config.backoff_multiplier.powi(attempt as i32);
    let mut delay = exponential.min(config.max_delay.as_millis() as f64);

    if config.jitter {
        let jitter_amount = delay * 0.1;
        delay += rand::thread_rng().gen_range(-1.0..=1.0) * jitter_amount;
    }

    Duration::from_millis(delay.max(0.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> RetryConfig {
        RetryConfig {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
            ..RetryConfig::default()
        }
    }

    fn http_error(status: u16) -> TransportError {
        TransportError::HttpStatus {
            status,
            status_text: String::new(),
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let outcome = execute_with_retry(
            || async { Ok::<_, TransportError>(7u32) },
            &fast_config(),
            "first_attempt",
        )
        .await
        .expect("should succeed");

        assert_eq!(outcome.value, 7);
        assert_eq!(outcome.attempts_used, 1);
        assert!(!outcome.was_retried);
        assert!(outcome.prior_errors.is_empty());
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);

        let outcome = execute_with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(http_error(503))
                    } else {
                        Ok(n)
                    }
                }
            },
            &fast_config(),
            "transient_failure",
        )
        .await
        .expect("should eventually succeed");

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.attempts_used, 3);
        assert!(outcome.was_retried);
        assert_eq!(outcome.prior_errors.len(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_invokes_operation_max_retries_plus_one_times() {
        let calls = AtomicU32::new(0);

        let result = execute_with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, _>(TransportError::Network("refused".to_string())) }
            },
            &fast_config(),
            "always_failing",
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4, "maxRetries=3 means 4 attempts");
        let err = result.expect_err("should raise after exhaustion");
        assert_eq!(err.category, ErrorCategory::Network);
    }

    #[tokio::test]
    async fn test_non_retryable_error_short_circuits() {
        let calls = AtomicU32::new(0);

        let result = execute_with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, _>(http_error(404)) }
            },
            &fast_config(),
            "not_found",
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1, "404 must not be retried");
        let err = result.expect_err("should raise immediately");
        assert_eq!(err.http_status, Some(404));
    }

    #[tokio::test]
    async fn test_network_retries_can_be_disabled() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            retry_on_network_error: false,
            ..fast_config()
        };

        let result = execute_with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, _>(TransportError::Network("down".to_string())) }
            },
            &config,
            "network_disabled",
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_last_error_is_the_one_raised() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 1,
            ..fast_config()
        };

        let result = execute_with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err::<u32, _>(http_error(503))
                    } else {
                        Err(http_error(500))
                    }
                }
            },
            &config,
            "last_error",
        )
        .await;

        let err = result.expect_err("should exhaust");
        assert_eq!(err.http_status, Some(500), "the final failure is propagated");
    }

    #[test]
    fn test_backoff_sequence_is_capped() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            jitter: false,
            ..RetryConfig::default()
        };

        let delays: Vec<u64> = (0..6)
            .map(|attempt| compute_delay(attempt, &config).as_millis() as u64)
            .collect();

        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            jitter: true,
            ..RetryConfig::default()
        };

        for _ in 0..50 {
            let delay = compute_delay(0, &config).as_millis() as u64;
            assert!((90..=110).contains(&delay), "jittered delay {} out of bounds", delay);
        }
    }

    #[test]
    fn test_default_config_matches_documented_values() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay, Duration::from_millis(1000));
        assert_eq!(config.max_delay, Duration::from_millis(10_000));
        assert!(config.retryable_status_codes.contains(&429));
        assert!(config.retry_on_network_error);
        assert!(config.jitter);
    }
}
