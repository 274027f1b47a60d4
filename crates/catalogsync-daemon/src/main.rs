//! catalogsync daemon — background synchronization service
//!
//! Loads configuration from the environment (spec §6.5), wires the
//! document store, object store, upstream client, sync engine, cron
//! scheduler and HTTP/WebSocket API together, then runs until a
//! termination signal arrives.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use catalogsync_audit::{AuditLogger, AuditResult, SqliteAuditRepository};
use catalogsync_bus::ProgressEvent;
use catalogsync_core::config::Config;
use catalogsync_core::domain::SyncStatus;
use catalogsync_core::ports::{ObjectStore, ProductRepository, UpstreamTableClient};
use catalogsync_engine::{EngineConfig, SyncEngine, SyncEngineHandle};
use catalogsync_images::LocalObjectStore;
use catalogsync_repo::{DatabasePool, SqliteProductRepository};
use catalogsync_retry::TokenBucket;
use catalogsync_scheduler::Scheduler;
use catalogsync_upstream::client::UpstreamTableRestClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn document_store_path(uri: &str) -> &Path {
    Path::new(uri.strip_prefix("sqlite://").unwrap_or(uri))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::info!("starting catalogsync daemon");

    let db_path = document_store_path(&config.document_store.uri).to_path_buf();
    let pool = DatabasePool::new(&db_path).await.context("connecting to document store")?;

    let repo: Arc<dyn ProductRepository> = Arc::new(SqliteProductRepository::new(pool.clone()));

    let upstream: Arc<dyn UpstreamTableClient> = Arc::new(UpstreamTableRestClient::new(
        config.upstream.base_url.clone(),
        config.upstream.app_id.clone(),
        config.upstream.app_secret.clone(),
        config.upstream.app_token.clone(),
        config.upstream.table_id.clone(),
    ));

    let object_store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(
        config.object_store.endpoint.clone(),
        config.object_store.public_base_url.clone(),
    ));

    let audit_repo = Arc::new(
        SqliteAuditRepository::new(Arc::new(pool))
            .await
            .context("initializing audit store")?,
    );
    let audit = Arc::new(AuditLogger::new(audit_repo));

    let bus = Arc::new(catalogsync_bus::ProgressBus::new());

    let upstream_limiter = Arc::new(TokenBucket::new(config.sync.upstream_rps, f64::from(config.sync.upstream_rps)));
    let image_limiter = Arc::new(TokenBucket::new(config.sync.image_rps, f64::from(config.sync.image_rps)));

    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&upstream),
        Arc::clone(&repo),
        Arc::clone(&object_store),
        Arc::clone(&bus),
        upstream_limiter,
        image_limiter,
        EngineConfig { operation_deadline: Duration::from_millis(config.sync.operation_deadline_ms) },
    ));
    let engine_handle = Arc::new(SyncEngineHandle::new(engine));

    let scheduler = Arc::new(Scheduler::new(&config.schedule, Arc::clone(&engine_handle))?);

    let health = catalogsync_api::HealthCheck::new();
    let state = catalogsync_api::AppState::new(
        Arc::clone(&engine_handle),
        Arc::clone(&repo),
        Arc::clone(&upstream),
        Arc::clone(&object_store),
        Arc::clone(&bus),
        health,
    );
    let app = catalogsync_api::router(state);

    let cancel = CancellationToken::new();

    let scheduler_task = {
        let scheduler = Arc::clone(&scheduler);
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    let audit_task = {
        let audit = Arc::clone(&audit);
        let mut subscription = bus.subscribe_all();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = subscription.recv() => {
                        match event {
                            Some(event) => forward_to_audit(&audit, event).await,
                            None => break,
                        }
                    }
                    () = cancel.cancelled() => break,
                }
            }
        })
    };

    let listener = tokio::net::TcpListener::bind(&config.api.bind_addr)
        .await
        .with_context(|| format!("binding API listener on {}", config.api.bind_addr))?;
    tracing::info!(addr = %config.api.bind_addr, "API listening");

    let server_cancel = cancel.clone();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
    });

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, stopping");
    cancel.cancel();

    let _ = audit_task.await;
    let _ = scheduler_task.await;
    let _ = server_task.await?;

    tracing::info!("catalogsync daemon stopped");
    Ok(())
}

/// Translates bus events into durable audit entries (spec §4.11
/// supplement): sync start/completion and per-record errors are worth
/// recording beyond the bounded `SyncRun.logs[]` ring buffer. Progress
/// and lag events carry nothing audit-worthy and are dropped.
async fn forward_to_audit(audit: &AuditLogger, event: ProgressEvent) {
    match event {
        ProgressEvent::StatusChange { sync_id, new_status: SyncStatus::Running, message, .. } => {
            audit.log_sync_start(sync_id, serde_json::json!({"message": message})).await;
        }
        ProgressEvent::Completion { sync_id, status, duration_secs, created, updated, skipped, errors, summary } => {
            let result = if status == SyncStatus::Failed {
                AuditResult::failed(catalogsync_audit::ReasonCode::StorageFailure, summary.clone())
            } else {
                AuditResult::success()
            };
            audit
                .log_sync_complete(
                    sync_id,
                    result,
                    duration_secs * 1000,
                    serde_json::json!({
                        "status": status,
                        "created": created,
                        "updated": updated,
                        "skipped": skipped,
                        "errors": errors,
                        "summary": summary,
                    }),
                )
                .await;
        }
        ProgressEvent::Error { sync_id, error_type, message, product_id, .. } => {
            use catalogsync_core::domain::SyncErrorKind;
            match (error_type, product_id) {
                (SyncErrorKind::TransformFailure, product_id) => {
                    audit.log_transform_rejected(sync_id, product_id, message).await;
                }
                (SyncErrorKind::ObjectStoreFailure, Some(product_id)) => {
                    audit.log_image_download_failed(sync_id, product_id, message).await;
                }
                (kind, _) => {
                    audit.log_upstream_error(sync_id, kind.into(), message).await;
                }
            }
        }
        ProgressEvent::StatusChange { .. } | ProgressEvent::Progress { .. } | ProgressEvent::Lagged { .. } => {}
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
