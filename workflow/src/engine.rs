//! Activity execution: retry policy, timeouts, heartbeats, cancellation.

use core::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bindery_core::{BinderyError, Result};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Bounded exponential backoff for transient activity failures.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Backoff multiplier.
    pub backoff_coefficient: f64,
    /// Delay cap.
    pub max_interval: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(5),
            backoff_coefficient: 2.0,
            max_interval: Duration::from_secs(60),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Policy with a different attempt count.
    #[must_use]
    pub const fn with_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Backoff delay after the given 1-based attempt.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_coefficient.powi(attempt.saturating_sub(1) as i32);
        let delay = self.initial_interval.mul_f64(factor);
        delay.min(self.max_interval)
    }
}

/// Per-activity execution options.
#[derive(Clone, Copy, Debug)]
pub struct ActivityOptions {
    /// Start-to-close timeout.
    pub start_to_close: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
}

impl ActivityOptions {
    /// Status-update options: 30 s, three attempts.
    #[must_use]
    pub fn status_update() -> Self {
        Self {
            start_to_close: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Extractor options: 5 min, five attempts.
    #[must_use]
    pub fn extractor() -> Self {
        Self {
            start_to_close: Duration::from_secs(300),
            retry: RetryPolicy::default().with_attempts(5),
        }
    }

    /// OCR / chunking options: 15 min, three attempts.
    #[must_use]
    pub fn long_running() -> Self {
        Self {
            start_to_close: Duration::from_secs(900),
            retry: RetryPolicy::default(),
        }
    }

    /// Compensation options: 1 min, five attempts.
    #[must_use]
    pub fn compensation() -> Self {
        Self {
            start_to_close: Duration::from_secs(60),
            retry: RetryPolicy::default().with_attempts(5),
        }
    }
}

/// Heartbeat handle for long activities. Records the last beat so a
/// supervisor can detect stalls past the heartbeat timeout.
#[derive(Clone, Debug, Default)]
pub struct Heartbeat {
    last: Arc<Mutex<Option<(Instant, String)>>>,
}

impl Heartbeat {
    /// Creates a heartbeat handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a beat with a progress detail.
    pub fn beat(&self, detail: impl Into<String>) {
        let detail = detail.into();
        debug!(detail = %detail, "activity heartbeat");
        *self.last.lock() = Some((Instant::now(), detail));
    }

    /// Time since the last beat, when one was recorded.
    #[must_use]
    pub fn since_last(&self) -> Option<Duration> {
        self.last.lock().as_ref().map(|(at, _)| at.elapsed())
    }
}

/// Runs one activity with timeout, cancellation, and transient-failure
/// retries.
///
/// The factory is invoked once per attempt. Non-transient errors fail
/// immediately; transient ones retry up to the policy's attempt budget
/// with bounded exponential backoff.
///
/// # Errors
///
/// Returns the activity's terminal error, [`BinderyError::Cancelled`] when
/// the token fires, or the last transient error once attempts run out.
pub async fn run_activity<T, F, Fut>(
    name: &str,
    options: ActivityOptions,
    cancel: &CancellationToken,
    factory: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if cancel.is_cancelled() {
            return Err(BinderyError::Cancelled(format!("activity {name}")));
        }

        let outcome = tokio::select! {
            () = cancel.cancelled() => Err(BinderyError::Cancelled(format!("activity {name}"))),
            result = tokio::time::timeout(options.start_to_close, factory()) => {
                result.unwrap_or_else(|_| {
                    Err(BinderyError::transient(anyhow::anyhow!(
                        "activity {name} exceeded start-to-close timeout"
                    )))
                })
            }
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < options.retry.max_attempts => {
                let delay = options.retry.backoff_for(attempt);
                warn!(
                    activity = name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    %err,
                    "transient activity failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Runs a compensating activity shielded from cancellation: the token is
/// ignored so rollback always runs to completion (or exhausts retries).
///
/// # Errors
///
/// Returns the compensation's terminal error once retries run out.
pub async fn run_shielded<T, F, Fut>(name: &str, options: ActivityOptions, factory: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let shielded = CancellationToken::new();
    run_activity(name, options, &shielded, factory).await
}
