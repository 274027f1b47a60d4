//! Integration test: `AuditLogger` → SQLite → query back.
//!
//! Exercises the full flow against a real in-memory SQLite database:
//! `AuditLogger` writes entries via `SqliteAuditRepository`, and
//! `ExplainFailureUseCase` reads them back to produce an explanation.

use std::sync::Arc;

use catalogsync_audit::{AuditLogger, ExplainFailureUseCase, ReasonCode};
use catalogsync_core::domain::{ProductId, SyncRunId};
use catalogsync_repo::DatabasePool;
use serde_json::Value;

#[tokio::test]
async fn audit_trail_round_trips_through_sqlite() {
    let pool = Arc::new(DatabasePool::in_memory().await.unwrap());
    let repo = Arc::new(
        catalogsync_audit::SqliteAuditRepository::new(pool)
            .await
            .unwrap(),
    );
    let logger = AuditLogger::new(repo.clone());

    let sync_id = SyncRunId::generate(1_700_000_000_000);
    let product_id = ProductId::new("p-42").unwrap();

    logger.log_sync_start(sync_id.clone(), Value::Null).await;
    logger
        .log_transform_rejected(sync_id.clone(), Some(product_id.clone()), "missing required field: sku")
        .await;
    logger
        .log_upstream_error(sync_id.clone(), ReasonCode::AuthExpired, "token expired")
        .await;

    let usecase = ExplainFailureUseCase::new(repo);

    let product_explanation = usecase.explain_product(&product_id).await.unwrap();
    assert!(product_explanation.message.contains("missing required field: sku"));
    assert!(!product_explanation.suggestions.is_empty());

    let sync_explanation = usecase.explain_sync(&sync_id).await.unwrap();
    assert_eq!(sync_explanation.entries.len(), 3);
    // Most recent failure in a sync-scoped query is the upstream auth error.
    assert!(sync_explanation.message.contains("token expired"));
}

#[tokio::test]
async fn explain_without_failures_reports_clean_state() {
    let pool = Arc::new(DatabasePool::in_memory().await.unwrap());
    let repo = Arc::new(
        catalogsync_audit::SqliteAuditRepository::new(pool)
            .await
            .unwrap(),
    );
    let logger = AuditLogger::new(repo.clone());
    let sync_id = SyncRunId::generate(1);
    let product_id = ProductId::new("p-ok").unwrap();

    logger.log_product_upserted(sync_id, product_id.clone()).await;

    let usecase = ExplainFailureUseCase::new(repo);
    let explanation = usecase.explain_product(&product_id).await.unwrap();
    assert!(explanation.suggestions.is_empty());
}
