//! `SyncEngineHandle` — the guarded singleton owning the one active (or
//! just-finished) [`SyncRun`] (spec §4.6, §9 "global mutable singleton
//! re-expressed as a guarded state value").

use std::sync::{Arc, Mutex as StdMutex};

use catalogsync_core::domain::{SyncMode, SyncOptions, SyncRun, SyncRunId};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::engine::{PauseLatch, SyncEngine};

/// Errors `SyncEngineHandle` methods map onto HTTP status codes in C7
/// (spec §4.6, §6.1).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A run is already in `{running, paused}`; `start` refuses a second one.
    #[error("a sync run is already active")]
    AlreadyRunning,
    /// No run matches the requested id, or there has never been one.
    #[error("no matching sync run")]
    NotFound,
    /// The requested transition isn't legal from the run's current status.
    #[error("invalid state transition")]
    InvalidTransition,
}

struct RunSlot {
    run: Arc<StdMutex<SyncRun>>,
    cancel: CancellationToken,
    pause: Arc<PauseLatch>,
}

/// Singleton entry point for starting and controlling sync runs.
///
/// Holds at most one [`SyncRun`] at a time behind a mutex; `start`
/// refuses a second run while the held one is active (spec §4.6).
pub struct SyncEngineHandle {
    engine: Arc<SyncEngine>,
    slot: Arc<StdMutex<Option<RunSlot>>>,
}

impl SyncEngineHandle {
    #[must_use]
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine, slot: Arc::new(StdMutex::new(None)) }
    }

    /// Starts a new sync run unless one is already active.
    ///
    /// # Errors
    /// Returns `EngineError::AlreadyRunning` if the held run's status is
    /// `running` or `paused`.
    pub fn start(&self, mode: SyncMode, options: SyncOptions) -> Result<SyncRunId, EngineError> {
        let mut guard = self.slot.lock().unwrap();
        if let Some(existing) = guard.as_ref() {
            if existing.run.lock().unwrap().status.is_active() {
                return Err(EngineError::AlreadyRunning);
            }
        }

        let id = SyncRunId::generate(Utc::now().timestamp_millis());
        let mut run = SyncRun::new(id.clone(), mode, options.clone(), Utc::now());
        run.start().expect("a freshly created run is always Pending");
        let run = Arc::new(StdMutex::new(run));
        let cancel = CancellationToken::new();
        let pause = Arc::new(PauseLatch::new());

        *guard = Some(RunSlot { run: Arc::clone(&run), cancel: cancel.clone(), pause: Arc::clone(&pause) });
        drop(guard);

        self.engine.bus().publish(catalogsync_bus::ProgressEvent::StatusChange {
            sync_id: id.clone(),
            old_status: catalogsync_core::domain::SyncStatus::Pending,
            new_status: catalogsync_core::domain::SyncStatus::Running,
            message: "sync started".to_string(),
            timestamp: Utc::now(),
        });

        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            engine.run_sync(run, mode, options, cancel, pause).await;
        });

        Ok(id)
    }

    /// Requests that the active run pause at the next page boundary.
    ///
    /// # Errors
    /// `EngineError::NotFound` if `id` doesn't match the active run;
    /// `EngineError::InvalidTransition` unless that run is `running`.
    pub fn request_pause(&self, id: &SyncRunId) -> Result<(), EngineError> {
        let guard = self.slot.lock().unwrap();
        let slot = guard.as_ref().ok_or(EngineError::NotFound)?;
        let mut run = slot.run.lock().unwrap();
        if &run.id != id {
            return Err(EngineError::NotFound);
        }
        run.request_pause().map_err(|_| EngineError::InvalidTransition)?;
        let snapshot_id = run.id.clone();
        drop(run);
        slot.pause.set_paused(true);
        self.engine.bus().publish(catalogsync_bus::ProgressEvent::StatusChange {
            sync_id: snapshot_id,
            old_status: catalogsync_core::domain::SyncStatus::Running,
            new_status: catalogsync_core::domain::SyncStatus::Paused,
            message: "sync paused".to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Requests that a paused run resume.
    ///
    /// # Errors
    /// `EngineError::NotFound` if `id` doesn't match the active run;
    /// `EngineError::InvalidTransition` unless that run is `paused`.
    pub fn request_resume(&self, id: &SyncRunId) -> Result<(), EngineError> {
        let guard = self.slot.lock().unwrap();
        let slot = guard.as_ref().ok_or(EngineError::NotFound)?;
        let mut run = slot.run.lock().unwrap();
        if &run.id != id {
            return Err(EngineError::NotFound);
        }
        run.resume().map_err(|_| EngineError::InvalidTransition)?;
        let snapshot_id = run.id.clone();
        drop(run);
        slot.pause.set_paused(false);
        self.engine.bus().publish(catalogsync_bus::ProgressEvent::StatusChange {
            sync_id: snapshot_id,
            old_status: catalogsync_core::domain::SyncStatus::Paused,
            new_status: catalogsync_core::domain::SyncStatus::Running,
            message: "sync resumed".to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Requests cancellation of the active run, regardless of whether it
    /// is currently `running` or `paused`.
    ///
    /// # Errors
    /// `EngineError::NotFound` if `id` doesn't match the active run or
    /// that run is already terminal.
    pub fn request_cancel(&self, id: &SyncRunId) -> Result<(), EngineError> {
        let guard = self.slot.lock().unwrap();
        let slot = guard.as_ref().ok_or(EngineError::NotFound)?;
        let mut run = slot.run.lock().unwrap();
        if &run.id != id {
            return Err(EngineError::NotFound);
        }
        let old_status = run.status;
        run.request_cancel(Utc::now()).map_err(|_| EngineError::InvalidTransition)?;
        let snapshot_id = run.id.clone();
        drop(run);
        slot.pause.set_paused(false);
        slot.cancel.cancel();
        self.engine.bus().publish(catalogsync_bus::ProgressEvent::StatusChange {
            sync_id: snapshot_id,
            old_status,
            new_status: catalogsync_core::domain::SyncStatus::Cancelled,
            message: "sync cancelled".to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Returns a snapshot of the active (or just-terminated) run.
    ///
    /// A terminal run remains visible for 5 seconds past its `end_time`
    /// so late-subscribing clients still see the outcome (spec §7), then
    /// reads as if no run had ever started.
    #[must_use]
    pub fn current(&self) -> Option<SyncRun> {
        let guard = self.slot.lock().unwrap();
        let slot = guard.as_ref()?;
        let run = slot.run.lock().unwrap();
        if run.status.is_terminal() {
            if let Some(end) = run.end_time {
                if Utc::now().signed_duration_since(end) > chrono::Duration::seconds(5) {
                    return None;
                }
            }
        }
        Some(run.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use catalogsync_bus::ProgressBus;
    use catalogsync_core::domain::{
        ContentDigest, Image, ImageRole, Page, Product, ProductId, SyncLog, SyncLogFilter,
        SyncLogPage, SyncRunId as CoreSyncRunId,
    };
    use catalogsync_core::ports::{
        Cursor, ObjectStore, ProductRepository, RecordPage, ResolvedAttachment, UpstreamTableClient,
        UpsertOutcome,
    };
    use catalogsync_images::LocalObjectStore;
    use catalogsync_retry::TokenBucket;
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;
    use tempfile::tempdir;

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
        ids: StdMutex<HashSet<ProductId>>,
    }

    #[async_trait::async_trait]
    impl ProductRepository for InMemoryRepo {
        async fn upsert_batch(&self, products: &[Product]) -> anyhow::Result<UpsertOutcome> {
            let mut ids = self.ids.lock().unwrap();
            let mut outcome = UpsertOutcome::default();
            for p in products {
                ids.insert(p.product_id.clone());
                outcome.created += 1;
            }
            Ok(outcome)
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
        async fn put_sync_log(&self, _log: &SyncLog) -> anyhow::Result<()> {
            Ok(())
        }
        async fn list_sync_logs(&self, _filter: &SyncLogFilter, _page: Page) -> anyhow::Result<SyncLogPage> {
            Ok(SyncLogPage { items: Vec::new(), total: 0 })
        }
        async fn get_sync_log(&self, _id: &CoreSyncRunId) -> anyhow::Result<Option<SyncLog>> {
            Ok(None)
        }
    }

    fn build_handle() -> SyncEngineHandle {
        let dir = tempdir().unwrap();
        let store: Arc<dyn ObjectStore> =
            Arc::new(LocalObjectStore::new(dir.path().to_path_buf(), "http://objects.local".to_string()));
        let engine = Arc::new(SyncEngine::new(
            Arc::new(EmptyUpstream),
            Arc::new(InMemoryRepo::default()),
            store,
            Arc::new(ProgressBus::new()),
            Arc::new(TokenBucket::new(100, 100.0)),
            Arc::new(TokenBucket::new(100, 100.0)),
            EngineConfig { operation_deadline: Duration::from_secs(60) },
        ));
        SyncEngineHandle::new(engine)
    }

    #[tokio::test]
    async fn second_start_is_refused_while_active() {
        let handle = build_handle();
        let id = handle.start(SyncMode::Full, SyncOptions::default()).unwrap();
        let err = handle.start(SyncMode::Full, SyncOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyRunning));
        // let the first run finish so the test doesn't leak a task
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if let Some(run) = handle.current() {
                if run.status.is_terminal() {
                    break;
                }
            } else {
                break;
            }
        }
        let _ = id;
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let handle = build_handle();
        let bogus = SyncRunId::new("S-bogus").unwrap();
        assert!(matches!(handle.request_pause(&bogus), Err(EngineError::NotFound)));
        assert!(matches!(handle.request_resume(&bogus), Err(EngineError::NotFound)));
        assert!(matches!(handle.request_cancel(&bogus), Err(EngineError::NotFound)));
    }

    #[tokio::test]
    async fn current_is_none_before_any_run() {
        let handle = build_handle();
        assert!(handle.current().is_none());
    }
}
