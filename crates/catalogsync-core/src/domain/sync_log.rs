//! SyncLog — the durable record of a finished (or in-flight) sync run
//! (spec §3.2, §4.6 step 5)

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sync_run::{Progress, SyncError, SyncMode, SyncOptions, SyncRun, SyncStatus};
use super::newtypes::SyncRunId;

/// Durable counterpart of [`SyncRun`], written via `ProductRepository::put_sync_log`
/// on every terminal transition (spec §4.6 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: SyncRunId,
    pub mode: SyncMode,
    pub status: SyncStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub options: SyncOptions,
    pub progress: Progress,
    pub errors: Vec<SyncError>,
    pub logs: VecDeque<String>,
}

impl From<&SyncRun> for SyncLog {
    fn from(run: &SyncRun) -> Self {
        Self {
            id: run.id.clone(),
            mode: run.mode,
            status: run.status,
            start_time: run.start_time,
            end_time: run.end_time,
            options: run.options.clone(),
            progress: run.progress.clone(),
            errors: run.errors.clone(),
            logs: run.logs.clone(),
        }
    }
}

/// Filter criteria for `ProductRepository::list_sync_logs` (spec §6.1 `/sync/history`).
#[derive(Debug, Clone, Default)]
pub struct SyncLogFilter {
    pub status: Option<SyncStatus>,
    pub mode: Option<SyncMode>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

/// Offset/limit pagination for sync log history.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { offset: 0, limit: 20 }
    }
}

/// A page of [`SyncLog`]s plus the total count matching the filter.
#[derive(Debug, Clone)]
pub struct SyncLogPage {
    pub items: Vec<SyncLog>,
    pub total: u64,
}
