//! Convenience wrapper recording audit entries without letting storage
//! failures interrupt the sync pipeline (spec §4.11).

use std::sync::Arc;

use catalogsync_core::domain::{ProductId, SyncRunId};
use serde_json::Value;

use crate::action::AuditAction;
use crate::entry::{AuditEntry, AuditResult};
use crate::reason::ReasonCode;
use crate::repository::AuditRepository;

/// Records audit entries via an [`AuditRepository`], logging (never
/// propagating) any storage failure. A sync run must never fail because
/// its own audit trail couldn't be written.
pub struct AuditLogger {
    repo: Arc<dyn AuditRepository>,
}

impl AuditLogger {
    #[must_use]
    pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
        Self { repo }
    }

    async fn save(&self, entry: AuditEntry) {
        if let Err(err) = self.repo.insert(&entry).await {
            tracing::warn!(action = %entry.action(), error = %err, "failed to persist audit entry");
        }
    }

    pub async fn log_sync_start(&self, sync_id: SyncRunId, details: Value) {
        let entry = AuditEntry::new(AuditAction::SyncStart, AuditResult::success())
            .with_sync_id(sync_id)
            .with_details(details);
        self.save(entry).await;
    }

    pub async fn log_sync_complete(&self, sync_id: SyncRunId, result: AuditResult, duration_ms: u64, details: Value) {
        let entry = AuditEntry::new(AuditAction::SyncComplete, result)
            .with_sync_id(sync_id)
            .with_duration_ms(duration_ms)
            .with_details(details);
        self.save(entry).await;
    }

    pub async fn log_product_upserted(&self, sync_id: SyncRunId, product_id: ProductId) {
        let entry = AuditEntry::new(AuditAction::ProductUpserted, AuditResult::success())
            .with_sync_id(sync_id)
            .with_product_id(product_id);
        self.save(entry).await;
    }

    pub async fn log_product_soft_deleted(&self, sync_id: SyncRunId, product_id: ProductId) {
        let entry = AuditEntry::new(AuditAction::ProductSoftDeleted, AuditResult::success())
            .with_sync_id(sync_id)
            .with_product_id(product_id);
        self.save(entry).await;
    }

    pub async fn log_transform_rejected(
        &self,
        sync_id: SyncRunId,
        product_id: Option<ProductId>,
        reason: impl Into<String>,
    ) {
        let mut entry = AuditEntry::new(
            AuditAction::TransformRejected,
            AuditResult::failed(ReasonCode::TransformFailure, reason),
        )
        .with_sync_id(sync_id);
        if let Some(product_id) = product_id {
            entry = entry.with_product_id(product_id);
        }
        self.save(entry).await;
    }

    pub async fn log_image_download_failed(
        &self,
        sync_id: SyncRunId,
        product_id: ProductId,
        message: impl Into<String>,
    ) {
        let entry = AuditEntry::new(
            AuditAction::ImageDownloadFailed,
            AuditResult::failed(ReasonCode::ObjectStoreFailure, message),
        )
        .with_sync_id(sync_id)
        .with_product_id(product_id);
        self.save(entry).await;
    }

    pub async fn log_upstream_error(&self, sync_id: SyncRunId, reason: ReasonCode, message: impl Into<String>) {
        let entry =
            AuditEntry::new(AuditAction::UpstreamError, AuditResult::failed(reason, message)).with_sync_id(sync_id);
        self.save(entry).await;
    }

    pub async fn log_scheduled_trigger_skipped(&self, label: impl Into<String>, message: impl Into<String>) {
        let label = label.into();
        let entry = AuditEntry::new(
            AuditAction::ScheduledTriggerSkipped,
            AuditResult::failed(ReasonCode::Cancelled, message),
        )
        .with_details(serde_json::json!({"trigger": label}));
        self.save(entry).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::repository::{AuditError, AuditFilter};

    #[derive(Default)]
    struct MockRepo {
        entries: Mutex<Vec<AuditEntry>>,
    }

    #[async_trait]
    impl AuditRepository for MockRepo {
        async fn insert(&self, entry: &AuditEntry) -> Result<(), AuditError> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
        async fn query(&self, _filter: &AuditFilter, _limit: u32) -> Result<Vec<AuditEntry>, AuditError> {
            Ok(self.entries.lock().unwrap().clone())
        }
    }

    struct FailingRepo;

    #[async_trait]
    impl AuditRepository for FailingRepo {
        async fn insert(&self, _entry: &AuditEntry) -> Result<(), AuditError> {
            Err(AuditError::Store("disk full".to_string()))
        }
        async fn query(&self, _filter: &AuditFilter, _limit: u32) -> Result<Vec<AuditEntry>, AuditError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn logs_sync_start_and_complete() {
        let repo = Arc::new(MockRepo::default());
        let logger = AuditLogger::new(repo.clone());
        let sync_id = SyncRunId::generate(1);

        logger.log_sync_start(sync_id.clone(), Value::Null).await;
        logger
            .log_sync_complete(sync_id.clone(), AuditResult::success(), 1200, Value::Null)
            .await;

        let entries = repo.entries.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(*entries[0].action(), AuditAction::SyncStart);
        assert_eq!(*entries[1].action(), AuditAction::SyncComplete);
        assert_eq!(entries[1].duration_ms(), Some(1200));
    }

    #[tokio::test]
    async fn audit_failure_is_non_fatal() {
        let logger = AuditLogger::new(Arc::new(FailingRepo));
        logger.log_sync_start(SyncRunId::generate(1), Value::Null).await;
    }
}
