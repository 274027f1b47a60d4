//! Integration tests for the `/api/v1` surface, exercised via
//! `tower::ServiceExt::oneshot` against the real router (spec §6.1).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use catalogsync_api::{router, AppState, HealthCheck};
use catalogsync_bus::ProgressBus;
use catalogsync_core::domain::{
    ContentDigest, Image, ImageRole, Page, Product, ProductId, SyncLog, SyncLogFilter,
    SyncLogPage, SyncRunId,
};
use catalogsync_core::ports::{
    Cursor, ObjectStore, ProductRepository, RecordPage, ResolvedAttachment, UpstreamTableClient,
    UpsertOutcome,
};
use catalogsync_engine::{EngineConfig, SyncEngine, SyncEngineHandle};
use catalogsync_images::LocalObjectStore;
use catalogsync_retry::TokenBucket;
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt;

struct EmptyUpstream;

#[async_trait::async_trait]
impl UpstreamTableClient for EmptyUpstream {
    async fn list_records(&self, _cursor: Option<&Cursor>, _page_size: u32) -> anyhow::Result<RecordPage> {
        Ok(RecordPage { records: Vec::new(), next_cursor: None, total_hint: Some(0) })
    }
    async fn resolve_attachments(&self, _tokens: &[String]) -> anyhow::Result<HashMap<String, ResolvedAttachment>> {
        Ok(HashMap::new())
    }
    async fn table_revision(&self) -> anyhow::Result<i64> {
        Ok(1)
    }
}

#[derive(Default)]
struct InMemoryRepo {
    ids: Mutex<HashSet<ProductId>>,
    logs: Mutex<Vec<SyncLog>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryRepo {
    async fn upsert_batch(&self, products: &[Product]) -> anyhow::Result<UpsertOutcome> {
        let mut ids = self.ids.lock().unwrap();
        for p in products {
            ids.insert(p.product_id.clone());
        }
        Ok(UpsertOutcome::default())
    }
    async fn find_ids(&self, _since: Option<chrono::DateTime<Utc>>) -> anyhow::Result<HashSet<ProductId>> {
        Ok(self.ids.lock().unwrap().clone())
    }
    async fn content_digest(&self, _id: &ProductId) -> anyhow::Result<Option<ContentDigest>> {
        Ok(None)
    }
    async fn soft_delete(&self, _product_ids: &[ProductId]) -> anyhow::Result<()> {
        Ok(())
    }
    async fn get_image(&self, _product_id: &ProductId, _role: ImageRole) -> anyhow::Result<Option<Image>> {
        Ok(None)
    }
    async fn put_image(&self, _image: &Image) -> anyhow::Result<()> {
        Ok(())
    }
    async fn put_sync_log(&self, log: &SyncLog) -> anyhow::Result<()> {
        self.logs.lock().unwrap().push(log.clone());
        Ok(())
    }
    async fn list_sync_logs(&self, _filter: &SyncLogFilter, page: Page) -> anyhow::Result<SyncLogPage> {
        let logs = self.logs.lock().unwrap();
        Ok(SyncLogPage {
            items: logs.iter().skip(page.offset as usize).take(page.limit as usize).cloned().collect(),
            total: logs.len() as u64,
        })
    }
    async fn get_sync_log(&self, id: &SyncRunId) -> anyhow::Result<Option<SyncLog>> {
        Ok(self.logs.lock().unwrap().iter().find(|l| &l.id == id).cloned())
    }
}

fn build_state() -> AppState {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> =
        Arc::new(LocalObjectStore::new(dir.path().to_path_buf(), "http://objects.local".to_string()));
    let repo: Arc<dyn ProductRepository> = Arc::new(InMemoryRepo::default());
    let upstream: Arc<dyn UpstreamTableClient> = Arc::new(EmptyUpstream);
    let bus = Arc::new(ProgressBus::new());
    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&upstream),
        Arc::clone(&repo),
        Arc::clone(&store),
        Arc::clone(&bus),
        Arc::new(TokenBucket::new(100, 100.0)),
        Arc::new(TokenBucket::new(100, 100.0)),
        EngineConfig { operation_deadline: Duration::from_secs(60) },
    ));
    let handle = Arc::new(SyncEngineHandle::new(engine));
    AppState::new(handle, repo, upstream, store, bus, HealthCheck::new())
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn start_sync_then_conflict_on_second_start() {
    let app = router(build_state());

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/sync/start")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"mode":"full"}"#))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body["data"]["syncId"].as_str().unwrap().starts_with('S'));

    let req2 = Request::builder()
        .method("POST")
        .uri("/api/v1/sync/start")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"mode":"full"}"#))
        .unwrap();
    let response2 = app.oneshot(req2).await.unwrap();
    assert_eq!(response2.status(), StatusCode::CONFLICT);
    let body2 = body_json(response2).await;
    assert_eq!(body2["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn current_sync_is_null_before_any_run() {
    let app = router(build_state());
    let req = Request::builder().uri("/api/v1/sync/current").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], serde_json::Value::Null);
}

#[tokio::test]
async fn unknown_sync_id_pause_returns_not_found() {
    let app = router(build_state());
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/sync/S999-doesnotexist/pause")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn history_returns_empty_page_initially() {
    let app = router(build_state());
    let req = Request::builder().uri("/api/v1/sync/history").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["total"], 0);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn health_reports_all_dependencies_healthy() {
    let app = router(build_state());
    let req = Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["scheduler"]["healthy"], true);
}
