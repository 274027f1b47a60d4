//! `with_retry` — the generic retry/backoff wrapper (spec §4.4).
//!
//! Same attempt-loop-with-backoff shape as a string-matching transient-error
//! classifier, generalized to the typed [`ErrorClass`], and extended with
//! jitter and a cap ("base 500ms, factor 2, jitter +/-20%, cap 30s").

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::classify::ErrorClass;

const BASE_DELAY: Duration = Duration::from_millis(500);
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY: Duration = Duration::from_secs(30);
const JITTER_FRACTION: f64 = 0.20;

/// How many attempts a call to [`with_retry`] is allowed before giving up.
/// One unit corresponds to `SyncOptions::retry_attempts`; an `authExpired`
/// classification triggers a refresh-and-retry without consuming a unit
/// (spec §4.4).
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    pub max_attempts: u32,
}

impl RetryBudget {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1) }
    }
}

/// Outcome of an exhausted or aborted retry loop.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The classifier marked the error fatal; no retry was attempted.
    Fatal(E),
    /// Every attempt in the budget was consumed by retryable errors.
    Exhausted(E),
    /// The cancellation token fired before the operation completed (spec §5).
    Cancelled,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Fatal(e) => write!(f, "fatal error: {e}"),
            RetryError::Exhausted(e) => write!(f, "retry budget exhausted: {e}"),
            RetryError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryError<E> {}

fn backoff_delay(attempt: u32) -> Duration {
    let base = BASE_DELAY.as_secs_f64() * BACKOFF_FACTOR.powi(attempt as i32);
    let capped = base.min(MAX_DELAY.as_secs_f64());
    // Deterministic-ish jitter derived from the attempt number rather than
    // `rand` — keeps this crate dependency-light and the schedule
    // reproducible in tests, at the cost of not being truly random.
    let phase = (attempt as f64 * 0.6180339887).fract(); // golden-ratio spread
    let jitter = 1.0 + JITTER_FRACTION * (2.0 * phase - 1.0);
    Duration::from_secs_f64((capped * jitter).max(0.0))
}

/// Runs `f` with exponential backoff, classifying each error via
/// `classify`. On [`ErrorClass::AuthExpired`], `on_auth_expired` is
/// awaited once and the next attempt does not consume retry budget
/// (spec §4.4). Every sleep and every attempt observes `cancel`.
///
/// # Errors
/// Returns [`RetryError::Fatal`] immediately for non-retryable errors,
/// [`RetryError::Exhausted`] once `budget.max_attempts` retryable
/// attempts have failed, or [`RetryError::Cancelled`] if `cancel` fires.
pub async fn with_retry<F, Fut, T, E, C, R, RFut>(
    op_name: &str,
    budget: RetryBudget,
    cancel: &CancellationToken,
    classify: C,
    mut on_auth_expired: R,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> ErrorClass,
    R: FnMut() -> RFut,
    RFut: Future<Output = ()>,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = f() => result,
        };

        let err = match outcome {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation = op_name, attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        match classify(&err) {
            ErrorClass::Fatal => return Err(RetryError::Fatal(err)),
            ErrorClass::AuthExpired => {
                warn!(operation = op_name, "auth expired, refreshing token before retry");
                on_auth_expired().await;
                // Does not consume retry budget (spec §4.4).
            }
            ErrorClass::Retryable => {
                if attempt >= budget.max_attempts.saturating_sub(1) {
                    return Err(RetryError::Exhausted(err));
                }
                let delay = backoff_delay(attempt);
                warn!(
                    operation = op_name,
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %format_err(&err),
                    "retryable error, backing off"
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(RetryError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}

fn format_err<E: std::fmt::Debug>(e: &E) -> String {
    format!("{e:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Boom(&'static str);

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result = with_retry(
            "test_op",
            RetryBudget::new(5),
            &cancel,
            |_: &Boom| ErrorClass::Retryable,
            || async {},
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Boom("transient"))
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;
        assert!(matches!(result, Ok(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_never_retry() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result: Result<(), RetryError<Boom>> = with_retry(
            "test_op",
            RetryBudget::new(5),
            &cancel,
            |_: &Boom| ErrorClass::Fatal,
            || async {},
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Boom("permanent")) }
            },
        )
        .await;
        assert!(matches!(result, Err(RetryError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_on_persistent_retryable_errors() {
        let cancel = CancellationToken::new();
        let result: Result<(), RetryError<Boom>> = with_retry(
            "test_op",
            RetryBudget::new(3),
            &cancel,
            |_: &Boom| ErrorClass::Retryable,
            || async {},
            || async { Err(Boom("always")) },
        )
        .await;
        assert!(matches!(result, Err(RetryError::Exhausted(_))));
    }

    #[tokio::test]
    async fn auth_expired_refreshes_without_consuming_budget() {
        let refreshes = AtomicU32::new(0);
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result = with_retry(
            "test_op",
            RetryBudget::new(1),
            &cancel,
            |_: &Boom| ErrorClass::AuthExpired,
            || {
                refreshes.fetch_add(1, Ordering::SeqCst);
                async {}
            },
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err(Boom("stale")) } else { Ok(7) } }
            },
        )
        .await;
        assert!(matches!(result, Ok(7)));
        assert_eq!(refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancellation_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), RetryError<Boom>> = with_retry(
            "test_op",
            RetryBudget::new(5),
            &cancel,
            |_: &Boom| ErrorClass::Retryable,
            || async {},
            || async { Err(Boom("irrelevant")) },
        )
        .await;
        assert!(matches!(result, Err(RetryError::Cancelled)));
    }
}
