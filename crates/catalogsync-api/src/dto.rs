//! Wire DTOs for the `/api/v1` JSON surface (spec §6.1).

use catalogsync_core::domain::{
    ProductId, SyncLog, SyncMode, SyncOptions, SyncRun, SyncStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{success, data?, error?, timestamp}` response envelope used by every
/// route (spec §6.1).
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub timestamp: DateTime<Utc>,
}

/// `{code, message}` error shape (spec §6.1).
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, timestamp: Utc::now() }
    }
}

impl ApiResponse<Value> {
    #[must_use]
    pub fn err(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody { code, message: message.into() }),
            timestamp: Utc::now(),
        }
    }
}

/// Body of `POST /sync/start` (spec §6.1).
#[derive(Debug, Deserialize)]
pub struct StartSyncRequest {
    pub mode: SyncMode,
    #[serde(default)]
    pub options: Option<StartSyncOptions>,
    #[serde(default)]
    pub product_ids: Option<Vec<String>>,
}

/// Caller-suppliable subset of [`SyncOptions`]; fields left unset fall
/// back to `SyncOptions::default()`.
#[derive(Debug, Default, Deserialize)]
pub struct StartSyncOptions {
    pub batch_size: Option<u32>,
    pub concurrent_images: Option<u32>,
    pub retry_attempts: Option<u32>,
    pub skip_image_download: Option<bool>,
    pub force_update: Option<bool>,
    pub skip_delete: Option<bool>,
}

impl StartSyncOptions {
    pub(crate) fn into_sync_options(self, product_ids: Option<Vec<ProductId>>) -> SyncOptions {
        let defaults = SyncOptions::default();
        SyncOptions {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            concurrent_images: self.concurrent_images.unwrap_or(defaults.concurrent_images),
            retry_attempts: self.retry_attempts.unwrap_or(defaults.retry_attempts),
            skip_image_download: self.skip_image_download.unwrap_or(defaults.skip_image_download),
            force_update: self.force_update.unwrap_or(defaults.force_update),
            product_ids,
            skip_delete: self.skip_delete.unwrap_or(defaults.skip_delete),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartSyncResponse {
    pub sync_id: String,
}

/// Query parameters for `GET /sync/history` (spec §6.1).
#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub status: Option<SyncStatus>,
    pub mode: Option<SyncMode>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SyncRunView {
    pub id: String,
    pub mode: SyncMode,
    pub status: SyncStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub progress: catalogsync_core::domain::Progress,
    pub error_count: usize,
}

impl From<&SyncRun> for SyncRunView {
    fn from(run: &SyncRun) -> Self {
        Self {
            id: run.id.as_str().to_string(),
            mode: run.mode,
            status: run.status,
            start_time: run.start_time,
            end_time: run.end_time,
            progress: run.progress.clone(),
            error_count: run.errors.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncLogView {
    pub id: String,
    pub mode: SyncMode,
    pub status: SyncStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub progress: catalogsync_core::domain::Progress,
    pub errors: Vec<catalogsync_core::domain::SyncError>,
}

impl From<&SyncLog> for SyncLogView {
    fn from(log: &SyncLog) -> Self {
        Self {
            id: log.id.as_str().to_string(),
            mode: log.mode,
            status: log.status,
            start_time: log.start_time,
            end_time: log.end_time,
            progress: log.progress.clone(),
            errors: log.errors.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncHistoryResponse {
    pub items: Vec<SyncLogView>,
    pub total: u64,
    pub offset: u32,
    pub limit: u32,
}

/// `GET /health` response (spec §6.1: "service health + dependency status").
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub document_store: DependencyStatus,
    pub upstream: DependencyStatus,
    pub object_store: DependencyStatus,
    pub scheduler: DependencyStatus,
}

#[derive(Debug, Serialize)]
pub struct DependencyStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
