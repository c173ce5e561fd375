//! # Backoff Retry Protocol
//!
//! Generic "retry an async operation with exponential backoff, reset on
//! success" protocol shared by every remote call.
//!
//! ## Overview
//!
//! The split of responsibilities is deliberate:
//! - [`with_backoff_and_retry`] owns the retry *loop*: run, sleep on a
//!   classifier-provided delay, run again. It holds no retry bound of its
//!   own.
//! - [`RetryableErrorClassifier`] owns the retry *policy*: which failures
//!   are transient, how long to wait, and when the consecutive-failure
//!   budget is exhausted.
//!
//! One classifier instance is shared across all operations against the same
//! remote endpoint, and its failure count resets on *any* success. The whole
//! endpoint is treated as a single failure domain: a healthy call anywhere
//! is evidence the outage has passed.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bridge_traits::error::RemoteApiError;
use core_runtime::config::UploadSettings;
use rand::Rng;
use tracing::{debug, warn};

/// A classified failure: the causing error plus the backoff delay to apply
/// before retrying. A `None` delay means the failure must be propagated.
#[derive(Debug, Clone)]
pub struct RetryableFailure {
    pub error: RemoteApiError,
    pub backoff_delay_ms: Option<u64>,
}

/// Decides whether a failed remote operation is worth retrying and, if so,
/// after how long.
///
/// Implementations are stateful: they track consecutive failures and
/// [`reset`](Self::reset) is invoked on every successful remote call in the
/// process, not just ones guarded by the retry driver.
pub trait RetryableErrorClassifier: Send + Sync {
    /// Returns the backoff delay in milliseconds, or `None` when the failure
    /// is non-retryable or the retry budget is exhausted.
    fn classify(&self, operation_name: &str, error: &RemoteApiError) -> Option<u64>;

    /// Signal that a remote call succeeded; clears the failure count.
    fn reset(&self);
}

/// Recognizes failures the user can correct (bad file, revoked permission),
/// yielding a human-readable message. Such failures are terminal for the
/// affected file only; processing of other files continues.
pub trait FatalErrorClassifier: Send + Sync {
    fn classify(&self, operation_name: &str, error: &RemoteApiError) -> Option<String>;
}

/// Run `operation`, retrying with classifier-provided backoff until it
/// succeeds or the classifier declines to retry.
///
/// On success the classifier's failure count is reset and the value
/// returned. On failure the classifier is consulted: a delay means
/// `on_backoff(delay)` is invoked (progress/telemetry side channel), the
/// delay is slept, and the operation re-run; no delay means the original
/// error is returned. The retry bound lives entirely in the classifier.
pub async fn with_backoff_and_retry<T, Op, Fut, OnBackoff>(
    classifier: &dyn RetryableErrorClassifier,
    operation_name: &str,
    mut operation: Op,
    mut on_backoff: OnBackoff,
) -> Result<T, RemoteApiError>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteApiError>>,
    OnBackoff: FnMut(u64),
{
    loop {
        match operation().await {
            Ok(value) => {
                classifier.reset();
                return Ok(value);
            }
            Err(error) => {
                let failure = RetryableFailure {
                    backoff_delay_ms: classifier.classify(operation_name, &error),
                    error,
                };
                match failure.backoff_delay_ms {
                    Some(delay_ms) => {
                        debug!(
                            operation = operation_name,
                            delay_ms, "retrying operation with backoff"
                        );
                        on_backoff(delay_ms);
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                    None => return Err(failure.error),
                }
            }
        }
    }
}

/// Production retryable-failure classifier.
///
/// Transport failures and transient service statuses are retried on an
/// exponential schedule (`initial * 2^n`, capped) with up to ±50% jitter.
/// The consecutive-failure count lives in an atomic so one instance can be
/// consulted from any task; it is cleared by [`reset`](RetryableErrorClassifier::reset).
pub struct ExponentialBackoffClassifier {
    initial_delay_ms: u64,
    max_delay_ms: u64,
    max_retries: u32,
    consecutive_failures: AtomicU32,
}

impl ExponentialBackoffClassifier {
    pub fn new(initial_delay_ms: u64, max_delay_ms: u64, max_retries: u32) -> Self {
        Self {
            initial_delay_ms,
            max_delay_ms,
            max_retries,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn from_settings(settings: &UploadSettings) -> Self {
        Self::new(
            settings.initial_backoff_ms,
            settings.max_backoff_ms,
            settings.max_retries,
        )
    }

    /// Transient statuses worth retrying: DEADLINE_EXCEEDED,
    /// RESOURCE_EXHAUSTED, ABORTED, INTERNAL, UNAVAILABLE. Transport-level
    /// failures are always considered transient.
    fn is_retryable(error: &RemoteApiError) -> bool {
        match error {
            RemoteApiError::Transport(_) => true,
            RemoteApiError::Status { code, .. } => matches!(code, 4 | 8 | 10 | 13 | 14),
        }
    }

    fn delay_for_failure(&self, consecutive_failures: u32) -> u64 {
        let shift = consecutive_failures.saturating_sub(1).min(20);
        let base = self
            .initial_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay_ms);
        // up to ±50% jitter, still capped
        let jitter_span = base / 2;
        if jitter_span == 0 {
            return base;
        }
        let jittered = base - jitter_span + rand::thread_rng().gen_range(0..=jitter_span * 2);
        jittered.min(self.max_delay_ms)
    }
}

impl RetryableErrorClassifier for ExponentialBackoffClassifier {
    fn classify(&self, operation_name: &str, error: &RemoteApiError) -> Option<u64> {
        if !Self::is_retryable(error) {
            return None;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures > self.max_retries {
            warn!(
                operation = operation_name,
                failures, "retry budget exhausted, giving up"
            );
            return None;
        }

        Some(self.delay_for_failure(failures))
    }

    fn reset(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }
}

/// Production fatal-failure classifier: statuses the user can act on.
///
/// INVALID_ARGUMENT, NOT_FOUND, PERMISSION_DENIED and FAILED_PRECONDITION
/// become human-readable per-file failure messages; everything else is left
/// to the retry path.
#[derive(Debug, Clone, Default)]
pub struct StatusCodeFatalClassifier;

impl FatalErrorClassifier for StatusCodeFatalClassifier {
    fn classify(&self, _operation_name: &str, error: &RemoteApiError) -> Option<String> {
        match error {
            RemoteApiError::Status { code, .. } if matches!(code, 3 | 5 | 7 | 9) => {
                Some(error.to_string())
            }
            _ => None,
        }
    }
}
