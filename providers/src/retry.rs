//! Sleep-and-retry policy for transient provider failures.
//!
//! # Retry Policy
//!
//! - Any [`TransientProviderError`] is retried after a fixed sleep
//! - Default sleep: 10 seconds, overridable through `OPENAI_RATE_TIMEOUT`
//! - Default attempt cap: none; the call is retried until it succeeds
//! - Optional cap: after `max_attempts` failures the last error is surfaced as
//!   [`ProviderError::RetryExhausted`]
//!
//! Without a cap a permanently failing endpoint blocks the caller forever.
//! A rate-limited call inside a parallel batch therefore stalls the whole batch.
//!
//! Sleeping goes through the [`Sleeper`] trait so tests drive the loop without
//! wall-clock delay.

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::Duration;

use crate::{ProviderError, TransientProviderError};

/// Environment setting that overrides the retry sleep, in seconds.
pub const RATE_TIMEOUT_ENV: &str = "OPENAI_RATE_TIMEOUT";

const DEFAULT_RETRY_SLEEP_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between a failed attempt and the next one.
    pub sleep: Duration,
    /// Total attempts before giving up; `None` retries forever.
    pub max_attempts: Option<NonZeroU32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            sleep: Duration::from_secs(DEFAULT_RETRY_SLEEP_SECS),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    /// Cap total attempts; `0` restores the unbounded policy.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = NonZeroU32::new(max_attempts);
        self
    }

    fn allows_another_attempt(&self, attempts_made: u32) -> bool {
        self.max_attempts
            .is_none_or(|cap| attempts_made < cap.get())
    }
}

/// Parse a sleep duration in (possibly fractional) seconds.
///
/// Negative, non-finite or unparseable values yield `None`.
#[must_use]
pub fn parse_sleep_secs(raw: &str) -> Option<Duration> {
    let secs = raw.trim().parse::<f64>().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

/// Source of delay between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Real sleeping on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|delays| delays.clone())
            .unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
        std::future::ready(())
    }
}

/// Run `op` until it succeeds or the policy's attempt cap is reached.
///
/// `op` receives the 1-based attempt number. `on_retry` is called with the
/// failed attempt number, the upcoming delay and the error, before sleeping.
pub async fn retry_transient<T, F, Fut, S, N>(
    policy: &RetryPolicy,
    sleeper: &S,
    mut on_retry: N,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransientProviderError>>,
    S: Sleeper,
    N: FnMut(u32, Duration, &TransientProviderError),
{
    let mut attempt: u32 = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !policy.allows_another_attempt(attempt) {
                    tracing::error!(attempts = attempt, %error, "Giving up on request");
                    return Err(ProviderError::RetryExhausted {
                        attempts: attempt,
                        last_error: error,
                    });
                }

                tracing::warn!(
                    attempt,
                    %error,
                    delay_ms = policy.sleep.as_millis(),
                    "Request failed, sleeping before retry"
                );
                on_retry(attempt, policy.sleep, &error);
                sleeper.sleep(policy.sleep).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}
