//! Structured reason codes for audit entries (spec §4.11, §7 taxonomy).

use std::fmt;

use catalogsync_core::domain::SyncErrorKind;
use serde::{Deserialize, Serialize};

/// Mirrors [`SyncErrorKind`] (spec §7) but lives on the audit side so an
/// entry's reason can be queried/filtered independently of any one
/// in-memory [`catalogsync_core::domain::SyncRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    TransientUpstream,
    AuthExpired,
    PermanentUpstream,
    TransformFailure,
    StorageFailure,
    ObjectStoreFailure,
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::TransientUpstream => "transient_upstream",
            ReasonCode::AuthExpired => "auth_expired",
            ReasonCode::PermanentUpstream => "permanent_upstream",
            ReasonCode::TransformFailure => "transform_failure",
            ReasonCode::StorageFailure => "storage_failure",
            ReasonCode::ObjectStoreFailure => "object_store_failure",
            ReasonCode::Cancelled => "cancelled",
            ReasonCode::DeadlineExceeded => "deadline_exceeded",
        };
        write!(f, "{s}")
    }
}

impl From<SyncErrorKind> for ReasonCode {
    fn from(kind: SyncErrorKind) -> Self {
        match kind {
            SyncErrorKind::TransientUpstream => ReasonCode::TransientUpstream,
            SyncErrorKind::AuthExpired => ReasonCode::AuthExpired,
            SyncErrorKind::PermanentUpstream => ReasonCode::PermanentUpstream,
            SyncErrorKind::TransformFailure => ReasonCode::TransformFailure,
            SyncErrorKind::StorageFailure => ReasonCode::StorageFailure,
            SyncErrorKind::ObjectStoreFailure => ReasonCode::ObjectStoreFailure,
            SyncErrorKind::Cancelled => ReasonCode::Cancelled,
            SyncErrorKind::DeadlineExceeded => ReasonCode::DeadlineExceeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_code_display() {
        assert_eq!(ReasonCode::TransientUpstream.to_string(), "transient_upstream");
        assert_eq!(ReasonCode::DeadlineExceeded.to_string(), "deadline_exceeded");
    }

    #[test]
    fn converts_from_sync_error_kind() {
        assert_eq!(ReasonCode::from(SyncErrorKind::AuthExpired), ReasonCode::AuthExpired);
    }

    #[test]
    fn reason_code_serialization() {
        let code = ReasonCode::ObjectStoreFailure;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"object_store_failure\"");
        let deserialized: ReasonCode = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, code);
    }
}
