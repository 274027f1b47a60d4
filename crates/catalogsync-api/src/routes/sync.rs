//! `/sync/*` routes (spec §6.1).

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use catalogsync_core::domain::{Page, ProductId, SyncLogFilter, SyncRunId};

use crate::dto::{
    ApiResponse, HistoryQuery, StartSyncRequest, StartSyncResponse, SyncHistoryResponse,
    SyncLogView, SyncRunView,
};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync/start", post(start))
        .route("/sync/current", get(current))
        .route("/sync/history", get(history))
        .route("/sync/:id/pause", post(pause))
        .route("/sync/:id/resume", post(resume))
        .route("/sync/:id/cancel", post(cancel))
        .route("/sync/:id", get(get_one))
}

async fn start(
    State(state): State<AppState>,
    Json(req): Json<StartSyncRequest>,
) -> Result<Json<ApiResponse<StartSyncResponse>>, ApiError> {
    let product_ids = req
        .product_ids
        .map(|ids| {
            ids.into_iter()
                .map(ProductId::new)
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let options = req.options.unwrap_or_default().into_sync_options(product_ids);
    let sync_id = state.engine.start(req.mode, options)?;
    Ok(Json(ApiResponse::ok(StartSyncResponse { sync_id: sync_id.as_str().to_string() })))
}

async fn pause(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let id = SyncRunId::new(id)?;
    state.engine.request_pause(&id)?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "syncId": id.as_str() }))))
}

async fn resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let id = SyncRunId::new(id)?;
    state.engine.request_resume(&id)?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "syncId": id.as_str() }))))
}

async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let id = SyncRunId::new(id)?;
    state.engine.request_cancel(&id)?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "syncId": id.as_str() }))))
}

async fn current(
    State(state): State<AppState>,
) -> Json<ApiResponse<Option<SyncRunView>>> {
    let run = state.engine.current();
    Json(ApiResponse::ok(run.as_ref().map(SyncRunView::from)))
}

async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<SyncHistoryResponse>>, ApiError> {
    let filter = SyncLogFilter {
        status: query.status,
        mode: query.mode,
        date_from: query.date_from,
        date_to: query.date_to,
    };
    let page = Page {
        offset: query.offset.unwrap_or(0),
        limit: query.limit.unwrap_or(20),
    };
    let result = state.repo.list_sync_logs(&filter, page).await?;
    Ok(Json(ApiResponse::ok(SyncHistoryResponse {
        items: result.items.iter().map(SyncLogView::from).collect(),
        total: result.total,
        offset: page.offset,
        limit: page.limit,
    })))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SyncLogView>>, ApiError> {
    let id = SyncRunId::new(id)?;
    let log = state.repo.get_sync_log(&id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(ApiResponse::ok(SyncLogView::from(&log))))
}
