//! Domain error types
//!
//! Errors raised by domain entities and pure transforms: validation
//! failures, invalid state transitions, and malformed identifiers.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid product id format
    #[error("invalid product id: {0}")]
    InvalidProductId(String),

    /// Invalid image id format
    #[error("invalid image id: {0}")]
    InvalidImageId(String),

    /// Invalid sync run id format
    #[error("invalid sync run id: {0}")]
    InvalidSyncRunId(String),

    /// Invalid state transition attempt
    #[error("invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Invalid barcode format (expected 8-13 digits)
    #[error("invalid barcode: {0}")]
    InvalidBarcode(String),

    /// Invalid link (expected http(s):// URL)
    #[error("invalid link: {0}")]
    InvalidLink(String),

    /// Invalid monetary amount
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// `version` would not increase
    #[error("version must increase: current={current}, proposed={proposed}")]
    VersionNotIncreasing {
        /// Currently stored version
        current: i64,
        /// Proposed version that failed the monotonicity check
        proposed: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidProductId("".to_string());
        assert_eq!(err.to_string(), "invalid product id: ");

        let err = DomainError::InvalidState {
            from: "running".to_string(),
            to: "pending".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid state transition from running to pending"
        );
    }

    #[test]
    fn test_error_equality() {
        let a = DomainError::InvalidBarcode("12".to_string());
        let b = DomainError::InvalidBarcode("12".to_string());
        let c = DomainError::InvalidBarcode("34".to_string());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
