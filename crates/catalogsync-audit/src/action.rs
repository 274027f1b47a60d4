//! Audit action taxonomy (spec §4.11 supplement).

use serde::{Deserialize, Serialize};

/// Significant operations worth recording beyond the per-run `logs[]`
/// ring buffer (spec §3.2), so an operator can ask "why did product X
/// fail to sync three runs ago" after the buffer has rotated past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    SyncStart,
    SyncComplete,
    ProductUpserted,
    ProductSoftDeleted,
    TransformRejected,
    ImageDownloadFailed,
    UpstreamError,
    ScheduledTriggerSkipped,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::SyncStart => "sync_start",
            AuditAction::SyncComplete => "sync_complete",
            AuditAction::ProductUpserted => "product_upserted",
            AuditAction::ProductSoftDeleted => "product_soft_deleted",
            AuditAction::TransformRejected => "transform_rejected",
            AuditAction::ImageDownloadFailed => "image_download_failed",
            AuditAction::UpstreamError => "upstream_error",
            AuditAction::ScheduledTriggerSkipped => "scheduled_trigger_skipped",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync_start" => Ok(AuditAction::SyncStart),
            "sync_complete" => Ok(AuditAction::SyncComplete),
            "product_upserted" => Ok(AuditAction::ProductUpserted),
            "product_soft_deleted" => Ok(AuditAction::ProductSoftDeleted),
            "transform_rejected" => Ok(AuditAction::TransformRejected),
            "image_download_failed" => Ok(AuditAction::ImageDownloadFailed),
            "upstream_error" => Ok(AuditAction::UpstreamError),
            "scheduled_trigger_skipped" => Ok(AuditAction::ScheduledTriggerSkipped),
            other => Err(format!("unknown audit action: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        for action in [
            AuditAction::SyncStart,
            AuditAction::SyncComplete,
            AuditAction::ProductUpserted,
            AuditAction::ProductSoftDeleted,
            AuditAction::TransformRejected,
            AuditAction::ImageDownloadFailed,
            AuditAction::UpstreamError,
            AuditAction::ScheduledTriggerSkipped,
        ] {
            let rendered = action.to_string();
            assert_eq!(rendered.parse::<AuditAction>().unwrap(), action);
        }
    }
}
