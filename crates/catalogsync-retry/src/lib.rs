//! Generic retry/backoff wrapper and process-wide rate limiting (spec §4.4, §5).
//!
//! This crate has no knowledge of upstream tables, images, or the
//! document store: callers supply the operation, a classifier for its
//! error type, and a budget; everything else (sleeping, jitter, the
//! authExpired refresh hook) lives here so every adapter backs off the
//! same way.

mod backoff;
mod classify;
mod token_bucket;

pub use backoff::{with_retry, RetryBudget, RetryError};
pub use classify::ErrorClass;
pub use token_bucket::TokenBucket;
