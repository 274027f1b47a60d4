//! `GET /health` (spec §6.1: "service health + dependency status").

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::dto::{ApiResponse, DependencyStatus, HealthResponse};
use crate::state::{AppState, HEALTH_CHECK_TIMEOUT};

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let document_store = ping(async {
        state.repo.find_ids(Some(Utc::now())).await.map(|_| ())
    })
    .await;

    let upstream = ping(async { state.upstream.table_revision().await.map(|_| ()) }).await;

    let object_store = ping(async {
        state.object_store.exists("__health_check__").await.map(|_| ())
    })
    .await;

    let scheduler = DependencyStatus { healthy: state.health.scheduler_alive(), detail: None };

    let overall_healthy = document_store.healthy && upstream.healthy && object_store.healthy && scheduler.healthy;

    Json(ApiResponse::ok(HealthResponse {
        status: if overall_healthy { "healthy" } else { "degraded" },
        document_store,
        upstream,
        object_store,
        scheduler,
    }))
}

async fn ping<F>(fut: F) -> DependencyStatus
where
    F: std::future::Future<Output = anyhow::Result<()>>,
{
    match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, fut).await {
        Ok(Ok(())) => DependencyStatus { healthy: true, detail: None },
        Ok(Err(err)) => DependencyStatus { healthy: false, detail: Some(err.to_string()) },
        Err(_) => DependencyStatus { healthy: false, detail: Some("timed out".to_string()) },
    }
}
