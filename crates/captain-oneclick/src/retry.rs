//! Class-based retry policy for transient backend errors.
//!
//! The platform serializes mutating operations behind its own lock
//! and answers HTTP 429 while busy; connectivity blips are likewise
//! expected to clear on their own. Each error class carries its own
//! retry budget and delay; anything else propagates immediately.

use crate::error::{OneClickError, OneClickResult};
use captain_gateway::GatewayError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Failure classification for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The platform's own concurrency lock rejected the request.
    RateLimited,
    /// Transport-level connectivity failure.
    Transport,
    /// Everything else; never retried.
    Fatal,
}

/// Classify a failure into its most specific retry class. A transport
/// error only counts as retryable when it is a connectivity failure
/// (connect/timeout), not a decode or request-building error.
pub fn classify(error: &OneClickError) -> ErrorClass {
    match error {
        OneClickError::Gateway(GatewayError::RateLimited(_)) => ErrorClass::RateLimited,
        OneClickError::Gateway(gateway) if gateway.is_connectivity() => ErrorClass::Transport,
        _ => ErrorClass::Fatal,
    }
}

/// Retry budget and delay for one error class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrySetting {
    /// Maximum retries before the original error propagates.
    pub max_retries: u32,
    /// Delay between attempts in seconds.
    pub delay_secs: u64,
}

impl RetrySetting {
    /// Delay between attempts.
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

/// Per-class retry table, fixed for the lifetime of the policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Budget for platform rate limiting: generous, with a
    /// multi-second delay to let the platform's lock clear.
    #[serde(default = "default_rate_limited")]
    pub rate_limited: RetrySetting,

    /// Budget for connectivity failures: fewer attempts, shorter
    /// delay.
    #[serde(default = "default_transport")]
    pub transport: RetrySetting,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            rate_limited: default_rate_limited(),
            transport: default_transport(),
        }
    }
}

fn default_rate_limited() -> RetrySetting {
    RetrySetting {
        max_retries: 10,
        delay_secs: 5,
    }
}

fn default_transport() -> RetrySetting {
    RetrySetting {
        max_retries: 3,
        delay_secs: 2,
    }
}

/// Wraps fallible gateway operations with per-class retry budgets.
///
/// Budgets are tracked per [`RetryPolicy::run`] invocation, never
/// shared across calls, so concurrent orchestration runs stay
/// independent.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Policy with the given retry table.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    fn setting(&self, class: ErrorClass) -> Option<RetrySetting> {
        match class {
            ErrorClass::RateLimited => Some(self.config.rate_limited),
            ErrorClass::Transport => Some(self.config.transport),
            ErrorClass::Fatal => None,
        }
    }

    /// Run `operation` until it succeeds, a class budget is exhausted
    /// or a fatal error occurs. An operation failing K times within a
    /// class budget sleeps K times at that class's delay; once a
    /// class exceeds its budget the original error propagates.
    pub async fn run<T, F, Fut>(&self, operation: F) -> OneClickResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = OneClickResult<T>>,
    {
        let mut failures: HashMap<ErrorClass, u32> = HashMap::new();

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let class = classify(&error);
                    let Some(setting) = self.setting(class) else {
                        return Err(error);
                    };

                    let count = failures.entry(class).or_insert(0);
                    *count += 1;
                    if *count > setting.max_retries {
                        warn!(
                            class = ?class,
                            retries = setting.max_retries,
                            error = %error,
                            "retry budget exhausted"
                        );
                        return Err(error);
                    }

                    warn!(
                        class = ?class,
                        attempt = *count,
                        max_retries = setting.max_retries,
                        delay_secs = setting.delay_secs,
                        error = %error,
                        "transient error, retrying"
                    );
                    tokio::time::sleep(setting.delay()).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn rate_limited() -> OneClickError {
        GatewayError::RateLimited("busy".into()).into()
    }

    fn rejected() -> OneClickError {
        GatewayError::Rejected {
            status: 1104,
            description: "bad name".into(),
        }
        .into()
    }

    fn test_policy(max_retries: u32, delay_secs: u64) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            rate_limited: RetrySetting {
                max_retries,
                delay_secs,
            },
            transport: default_transport(),
        })
    }

    #[test]
    fn classification_is_subtype_aware() {
        assert_eq!(classify(&rate_limited()), ErrorClass::RateLimited);
        assert_eq!(classify(&rejected()), ErrorClass::Fatal);
        assert_eq!(
            classify(&OneClickError::MissingVariable { id: "x".into() }),
            ErrorClass::Fatal
        );
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_k_failures_within_budget() {
        let policy = test_policy(5, 5);
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = policy
            .run(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(rate_limited())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // Three sleeps at the configured 5s delay (clock is paused,
        // sleeps auto-advance).
        assert_eq!(started.elapsed().as_secs(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn propagates_original_error_after_budget() {
        let policy = test_policy(2, 5);
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: OneClickResult<()> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(rate_limited()) }
            })
            .await;

        assert!(matches!(
            result.unwrap_err(),
            OneClickError::Gateway(GatewayError::RateLimited(_))
        ));
        // Budget of 2 retries: initial attempt + 2 retries, 2 sleeps.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed().as_secs(), 10);
    }

    #[tokio::test]
    async fn fatal_errors_never_retry() {
        let policy = test_policy(5, 5);
        let calls = AtomicU32::new(0);

        let result: OneClickResult<()> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(rejected()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn class_budgets_are_independent_per_run() {
        let policy = test_policy(2, 1);

        for _ in 0..2 {
            let calls = AtomicU32::new(0);
            let result = policy
                .run(|| {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt == 0 {
                            Err(rate_limited())
                        } else {
                            Ok(())
                        }
                    }
                })
                .await;
            // A fresh run gets a fresh budget every time.
            assert!(result.is_ok());
        }
    }
}
