//! SyncRun domain entity — the in-memory sync state machine (spec §3.2, §4.6)

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{ProductId, SyncRunId};

/// How the sync run selects which upstream records to process (spec §3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    Incremental,
    Selective,
}

/// Lifecycle status of a sync run (spec §3.2, state diagram in §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl SyncStatus {
    /// Terminal states never transition further (spec §3.2).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Failed | SyncStatus::Cancelled)
    }

    /// True for the two states that count as "a run is active" for the
    /// global singleton-lock invariant (spec §3.2).
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, SyncStatus::Running | SyncStatus::Paused)
    }
}

/// Which stage of the main loop is currently executing (spec §6.3 `stage`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Preparing,
    Fetching,
    Processing,
    Images,
    Validating,
    Completed,
}

/// Caller-supplied options for a sync run (spec §3.2 `options`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOptions {
    pub batch_size: u32,
    pub concurrent_images: u32,
    pub retry_attempts: u32,
    pub skip_image_download: bool,
    pub force_update: bool,
    /// Only meaningful when `mode == Selective` (spec §3.2, §4.6 step d).
    pub product_ids: Option<Vec<ProductId>>,
    /// When true, the full-mode soft-delete pass (spec §4.6 step 4) is skipped.
    pub skip_delete: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            concurrent_images: 5,
            retry_attempts: 3,
            skip_image_download: false,
            force_update: false,
            product_ids: None,
            skip_delete: false,
        }
    }
}

/// Running tallies and current stage (spec §3.2 `progress`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Progress {
    pub stage: Option<SyncStage>,
    pub current: u64,
    pub total: Option<u64>,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
    pub current_operation: Option<String>,
}

impl Progress {
    /// `created + updated + skipped + errors == current` (spec §3.2 invariant).
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.created + self.updated + self.skipped + self.errors == self.current
    }

    /// `current <= total` once `total` is known (spec §3.2 invariant).
    #[must_use]
    pub fn within_total(&self) -> bool {
        match self.total {
            Some(total) => self.current <= total,
            None => true,
        }
    }
}

/// Error-kind taxonomy from spec §7, attached to each per-record error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    TransientUpstream,
    AuthExpired,
    PermanentUpstream,
    TransformFailure,
    StorageFailure,
    ObjectStoreFailure,
    Cancelled,
    DeadlineExceeded,
}

/// A single recorded error within a sync run (spec §3.2 `errors[]`, §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncError {
    pub kind: SyncErrorKind,
    pub message: String,
    pub product_id: Option<ProductId>,
    pub recoverable: bool,
    pub timestamp: DateTime<Utc>,
}

impl SyncError {
    /// Builds a new error record stamped with the current time.
    #[must_use]
    pub fn new(kind: SyncErrorKind, message: impl Into<String>, product_id: Option<ProductId>) -> Self {
        let recoverable = !matches!(
            kind,
            SyncErrorKind::Cancelled | SyncErrorKind::DeadlineExceeded
        );
        Self {
            kind,
            message: message.into(),
            product_id,
            recoverable,
            timestamp: Utc::now(),
        }
    }
}

/// Maximum number of human-readable lines retained in [`SyncRun::logs`]
/// (spec §3.2: "bounded ring buffer").
pub const LOG_RING_CAPACITY: usize = 500;

/// In-memory state for one active (or just-finished) sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
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

impl SyncRun {
    /// Creates a new run in `Pending`, immediately transitioned to `Running`
    /// by the caller via [`SyncRun::start`] (spec §4.6 `start` transition).
    #[must_use]
    pub fn new(id: SyncRunId, mode: SyncMode, options: SyncOptions, now: DateTime<Utc>) -> Self {
        Self {
            id,
            mode,
            status: SyncStatus::Pending,
            start_time: now,
            end_time: None,
            options,
            progress: Progress::default(),
            errors: Vec::new(),
            logs: VecDeque::new(),
        }
    }

    /// `pending -> running` (spec §4.6).
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` unless the run is `Pending`.
    pub fn start(&mut self) -> Result<(), DomainError> {
        self.transition(SyncStatus::Pending, SyncStatus::Running)
    }

    /// `running -> paused` (spec §4.6 `pauseReq`).
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` unless the run is `Running`.
    pub fn request_pause(&mut self) -> Result<(), DomainError> {
        self.transition(SyncStatus::Running, SyncStatus::Paused)
    }

    /// `paused -> running` (spec §4.6 `resume`).
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` unless the run is `Paused`.
    pub fn resume(&mut self) -> Result<(), DomainError> {
        self.transition(SyncStatus::Paused, SyncStatus::Running)
    }

    /// `{running, paused} -> cancelled` (spec §4.6 `cancelReq`).
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` if the run is already terminal.
    pub fn request_cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidState {
                from: format!("{:?}", self.status),
                to: "Cancelled".to_string(),
            });
        }
        self.status = SyncStatus::Cancelled;
        self.end_time = Some(now);
        Ok(())
    }

    /// `running -> completed` (spec §4.6, reached when the main loop exits
    /// cleanly).
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` unless the run is `Running`.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(SyncStatus::Running, SyncStatus::Completed)?;
        self.end_time = Some(now);
        Ok(())
    }

    /// `{running, paused} -> failed` (spec §4.6, non-retryable fatal error).
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` if the run is already terminal.
    pub fn fail(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidState {
                from: format!("{:?}", self.status),
                to: "Failed".to_string(),
            });
        }
        self.status = SyncStatus::Failed;
        self.end_time = Some(now);
        Ok(())
    }

    fn transition(&mut self, from: SyncStatus, to: SyncStatus) -> Result<(), DomainError> {
        if self.status != from {
            return Err(DomainError::InvalidState {
                from: format!("{:?}", self.status),
                to: format!("{to:?}"),
            });
        }
        self.status = to;
        Ok(())
    }

    /// Appends a line to the bounded log ring buffer, dropping the oldest
    /// entry once [`LOG_RING_CAPACITY`] is reached.
    pub fn log(&mut self, line: impl Into<String>) {
        if self.logs.len() >= LOG_RING_CAPACITY {
            self.logs.pop_front();
        }
        self.logs.push_back(line.into());
    }

    /// Records a per-record error and bumps `progress.errors`.
    pub fn record_error(&mut self, error: SyncError) {
        self.progress.errors += 1;
        self.progress.current += 1;
        self.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> SyncRun {
        SyncRun::new(
            SyncRunId::generate(1_700_000_000_000),
            SyncMode::Full,
            SyncOptions::default(),
            Utc::now(),
        )
    }

    #[test]
    fn happy_path_transitions() {
        let mut run = fresh();
        assert_eq!(run.status, SyncStatus::Pending);
        run.start().unwrap();
        assert_eq!(run.status, SyncStatus::Running);
        run.request_pause().unwrap();
        assert_eq!(run.status, SyncStatus::Paused);
        run.resume().unwrap();
        assert_eq!(run.status, SyncStatus::Running);
        run.complete(Utc::now()).unwrap();
        assert_eq!(run.status, SyncStatus::Completed);
        assert!(run.end_time.is_some());
    }

    #[test]
    fn cannot_pause_when_not_running() {
        let mut run = fresh();
        assert!(run.request_pause().is_err());
    }

    #[test]
    fn cannot_leave_terminal_state() {
        let mut run = fresh();
        run.start().unwrap();
        run.request_cancel(Utc::now()).unwrap();
        assert!(run.resume().is_err());
        assert!(run.request_cancel(Utc::now()).is_err());
        assert!(run.fail(Utc::now()).is_err());
    }

    #[test]
    fn progress_consistency_invariant() {
        let mut p = Progress {
            total: Some(10),
            ..Default::default()
        };
        p.created = 3;
        p.updated = 2;
        p.skipped = 1;
        p.errors = 1;
        p.current = 7;
        assert!(p.is_consistent());
        assert!(p.within_total());

        p.current = 8;
        assert!(!p.is_consistent());
    }

    #[test]
    fn log_ring_buffer_is_bounded() {
        let mut run = fresh();
        for i in 0..(LOG_RING_CAPACITY + 10) {
            run.log(format!("line {i}"));
        }
        assert_eq!(run.logs.len(), LOG_RING_CAPACITY);
        assert_eq!(run.logs.front().unwrap(), "line 10");
    }
}
