//! Error classification (spec §4.4, §7).

/// The three buckets every classifier must sort an error into before
/// `with_retry` decides whether to retry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry with backoff (spec §7 `TransientUpstream`, `StorageFailure`,
    /// `ObjectStoreFailure`).
    Retryable,
    /// No retry; the caller surfaces it as a record- or sync-level failure.
    Fatal,
    /// A single silent token refresh is attempted before the next retry,
    /// without consuming retry budget (spec §4.4, §7 `AuthExpired`).
    AuthExpired,
}
