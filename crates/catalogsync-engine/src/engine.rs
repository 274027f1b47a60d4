//! `SyncEngine` main loop (spec §4.6).

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use catalogsync_bus::{ProgressBus, ProgressEvent};
use catalogsync_core::domain::{
    product::ImageRef, Product, ProductId, SyncError, SyncErrorKind, SyncLog, SyncMode, SyncOptions,
    SyncRun, SyncStage,
};
use catalogsync_core::ports::{Cursor, ObjectStore, ProductRepository, UpstreamTableClient};
use catalogsync_core::usecases::{classify, content_digest, selective_accepts, DiffAction};
use catalogsync_images::{FetcherConfig, ImageFetchOutcome, ImageFetcher, ImageRequest};
use catalogsync_mapper::{FieldMapper, TransformOutcome};
use catalogsync_retry::{with_retry, ErrorClass, RetryBudget, RetryError, TokenBucket};
use chrono::Utc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Engine-wide tunables that don't vary per run (spec §6.5).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub operation_deadline: Duration,
}

/// Cooperative pause gate observed by the main loop at page boundaries
/// (spec §4.6 `pauseReq`/`resume`).
pub(crate) struct PauseLatch {
    paused: AtomicBool,
    notify: Notify,
}

impl PauseLatch {
    pub(crate) fn new() -> Self {
        Self { paused: AtomicBool::new(false), notify: Notify::new() }
    }

    pub(crate) fn set_paused(&self, value: bool) {
        self.paused.store(value, Ordering::SeqCst);
        if !value {
            self.notify.notify_waiters();
        }
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Blocks while paused, waking early if `cancel` fires.
    async fn wait_while_paused(&self, cancel: &CancellationToken) {
        loop {
            if !self.is_paused() {
                return;
            }
            let notified = self.notify.notified();
            tokio::select! {
                () = notified => {}
                () = cancel.cancelled() => return,
            }
        }
    }
}

/// Wires C1 (mapper), C2 (image fetcher), C3 (repository), C4 (retry +
/// rate limiting) and C5 (progress bus) together behind the state
/// machine described in spec §4.6.
pub struct SyncEngine {
    upstream: Arc<dyn UpstreamTableClient>,
    repo: Arc<dyn ProductRepository>,
    mapper: FieldMapper,
    image_fetcher: ImageFetcher,
    bus: Arc<ProgressBus>,
    upstream_limiter: Arc<TokenBucket>,
    config: EngineConfig,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        upstream: Arc<dyn UpstreamTableClient>,
        repo: Arc<dyn ProductRepository>,
        object_store: Arc<dyn ObjectStore>,
        bus: Arc<ProgressBus>,
        upstream_limiter: Arc<TokenBucket>,
        image_limiter: Arc<TokenBucket>,
        config: EngineConfig,
    ) -> Self {
        let image_fetcher =
            ImageFetcher::new(Arc::clone(&upstream), object_store, Arc::clone(&repo), image_limiter);
        Self {
            upstream,
            repo,
            mapper: FieldMapper::standard(),
            image_fetcher,
            bus,
            upstream_limiter,
            config,
        }
    }

    pub(crate) fn bus(&self) -> &Arc<ProgressBus> {
        &self.bus
    }

    /// Runs the main loop described in spec §4.6 to completion, mutating
    /// `run` in place so [`crate::SyncEngineHandle::current`] observes
    /// live progress, and persisting a terminal [`SyncLog`] on exit.
    pub(crate) async fn run_sync(
        &self,
        run: Arc<StdMutex<SyncRun>>,
        mode: SyncMode,
        options: SyncOptions,
        cancel: CancellationToken,
        pause: Arc<PauseLatch>,
    ) {
        let deadline_task = tokio::spawn({
            let cancel = cancel.clone();
            let deadline = self.config.operation_deadline;
            async move {
                tokio::time::sleep(deadline).await;
                cancel.cancel();
            }
        });

        self.drive_main_loop(&run, mode, &options, &cancel, &pause).await;
        deadline_task.abort();

        let snapshot = {
            let mut guard = run.lock().unwrap();
            if !guard.status.is_terminal() {
                // Deadline fired: handle.request_cancel was never called,
                // so the run is still nominally active.
                guard.record_error(SyncError::new(SyncErrorKind::DeadlineExceeded, "operation deadline exceeded", None));
                let _ = guard.fail(Utc::now());
            }
            guard.clone()
        };

        let log = SyncLog::from(&snapshot);
        if let Err(err) = self.repo.put_sync_log(&log).await {
            warn!(error = %err, sync_id = snapshot.id.as_str(), "failed to persist sync log");
        }

        let duration_secs = snapshot
            .end_time
            .map(|end| (end - snapshot.start_time).num_seconds().max(0) as u64)
            .unwrap_or(0);
        self.bus.publish(ProgressEvent::Completion {
            sync_id: snapshot.id.clone(),
            status: snapshot.status,
            duration_secs,
            created: snapshot.progress.created,
            updated: snapshot.progress.updated,
            skipped: snapshot.progress.skipped,
            errors: snapshot.progress.errors,
            summary: format!(
                "{:?}: {} created, {} updated, {} skipped, {} errors",
                snapshot.status,
                snapshot.progress.created,
                snapshot.progress.updated,
                snapshot.progress.skipped,
                snapshot.progress.errors
            ),
        });
    }

    async fn drive_main_loop(
        &self,
        run: &Arc<StdMutex<SyncRun>>,
        mode: SyncMode,
        options: &SyncOptions,
        cancel: &CancellationToken,
        pause: &Arc<PauseLatch>,
    ) {
        let sync_id = run.lock().unwrap().id.clone();

        self.set_stage(run, SyncStage::Preparing);
        self.publish_progress(run);

        let mut cursor: Option<Cursor> = None;
        let mut first_page = true;
        let mut observed_ids: HashSet<ProductId> = HashSet::new();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let budget = RetryBudget::new(options.retry_attempts);
            let fetch_result = with_retry(
                "list_records",
                budget,
                cancel,
                |_err: &anyhow::Error| ErrorClass::Retryable,
                || async {},
                || async {
                    self.upstream_limiter.acquire().await;
                    match self.upstream.list_records(cursor.as_ref(), options.batch_size).await {
                        Ok(page) => {
                            self.upstream_limiter.on_success();
                            Ok(page)
                        }
                        Err(err) => {
                            self.upstream_limiter.on_throttle();
                            let mut guard = run.lock().unwrap();
                            guard.errors.push(SyncError::new(SyncErrorKind::TransientUpstream, err.to_string(), None));
                            drop(guard);
                            self.publish_error(&sync_id, SyncErrorKind::TransientUpstream, &err.to_string(), None, true);
                            Err(err)
                        }
                    }
                },
            )
            .await;

            let page = match fetch_result {
                Ok(page) => page,
                Err(RetryError::Cancelled) => break,
                Err(RetryError::Fatal(err) | RetryError::Exhausted(err)) => {
                    let mut guard = run.lock().unwrap();
                    guard.errors.push(SyncError::new(SyncErrorKind::TransientUpstream, err.to_string(), None));
                    let _ = guard.fail(Utc::now());
                    drop(guard);
                    self.publish_error(&sync_id, SyncErrorKind::TransientUpstream, &err.to_string(), None, true);
                    return;
                }
            };

            if first_page {
                first_page = false;
                if let Some(total) = page.total_hint {
                    let mut guard = run.lock().unwrap();
                    guard.progress.total = Some(total);
                }
                self.publish_progress(run);
            }

            self.set_stage(run, SyncStage::Fetching);
            self.publish_progress(run);

            self.process_page(run, &sync_id, mode, options, &page.records, &mut observed_ids, cancel).await;

            cursor = page.next_cursor;

            pause.wait_while_paused(cancel).await;
            if cancel.is_cancelled() {
                break;
            }

            if cursor.is_none() {
                break;
            }
        }

        if cancel.is_cancelled() {
            return;
        }

        if mode == SyncMode::Full && !options.skip_delete {
            self.soft_delete_missing(run, &observed_ids).await;
        }

        self.set_stage(run, SyncStage::Validating);
        self.publish_progress(run);

        let mut guard = run.lock().unwrap();
        if !guard.status.is_terminal() {
            let now = Utc::now();
            let _ = guard.complete(now);
        }
        drop(guard);
        self.set_stage(run, SyncStage::Completed);
    }

    async fn process_page(
        &self,
        run: &Arc<StdMutex<SyncRun>>,
        sync_id: &catalogsync_core::domain::SyncRunId,
        mode: SyncMode,
        options: &SyncOptions,
        records: &[catalogsync_core::ports::RawRecord],
        observed_ids: &mut HashSet<ProductId>,
        cancel: &CancellationToken,
    ) {
        let mut to_process: Vec<Product> = Vec::new();

        for raw in records {
            if cancel.is_cancelled() {
                return;
            }
            match self.mapper.transform(raw) {
                TransformOutcome::Rejected { reasons } => {
                    let message = reasons.join("; ");
                    let mut guard = run.lock().unwrap();
                    guard.record_error(SyncError::new(SyncErrorKind::TransformFailure, message.clone(), None));
                    drop(guard);
                    self.publish_error(sync_id, SyncErrorKind::TransformFailure, &message, None, true);
                }
                TransformOutcome::Transformed { product, warnings } => {
                    for warning in &warnings {
                        info!(path = %warning.path, message = %warning.message, "field transform warning");
                    }
                    let product = *product;
                    if !selective_accepts(&options.product_ids, &product.product_id) {
                        continue;
                    }
                    observed_ids.insert(product.product_id.clone());

                    let stored_digest = self.repo.content_digest(&product.product_id).await.unwrap_or(None);
                    let incoming_digest = content_digest(&product);
                    let action = classify(mode, options.force_update, stored_digest.as_ref(), &incoming_digest);

                    if action == DiffAction::Skip {
                        let mut guard = run.lock().unwrap();
                        guard.progress.skipped += 1;
                        guard.progress.current += 1;
                        continue;
                    }

                    to_process.push(product);
                }
            }
        }

        if to_process.is_empty() {
            self.publish_progress(run);
            return;
        }

        self.set_stage(run, SyncStage::Images);
        self.publish_progress(run);

        if !options.skip_image_download {
            self.resolve_images(&mut to_process, options, cancel, run, sync_id).await;
        }

        self.set_stage(run, SyncStage::Processing);

        let budget = RetryBudget::new(options.retry_attempts);
        let result = with_retry(
            "repository_upsert",
            budget,
            cancel,
            |_err: &anyhow::Error| ErrorClass::Retryable,
            || async {},
            || self.repo.upsert_batch(&to_process),
        )
        .await;

        match result {
            Ok(outcome) => {
                let mut guard = run.lock().unwrap();
                guard.progress.created += outcome.created;
                guard.progress.updated += outcome.updated;
                guard.progress.skipped += outcome.skipped;
                guard.progress.current += outcome.created + outcome.updated + outcome.skipped;
            }
            Err(RetryError::Cancelled) => {}
            Err(other) => {
                let message = other.to_string();
                let mut guard = run.lock().unwrap();
                guard.record_error(SyncError::new(SyncErrorKind::StorageFailure, message.clone(), None));
                let _ = guard.fail(Utc::now());
                drop(guard);
                self.publish_error(sync_id, SyncErrorKind::StorageFailure, &message, None, true);
            }
        }

        self.publish_progress(run);
    }

    async fn resolve_images(
        &self,
        products: &mut [Product],
        options: &SyncOptions,
        cancel: &CancellationToken,
        run: &Arc<StdMutex<SyncRun>>,
        sync_id: &catalogsync_core::domain::SyncRunId,
    ) {
        let mut requests: Vec<ImageRequest> = Vec::new();
        for product in products.iter() {
            for (role, image_ref) in &product.images {
                if let ImageRef::Token(token) = image_ref {
                    requests.push(ImageRequest {
                        product_id: product.product_id.clone(),
                        role: *role,
                        token: token.clone(),
                    });
                }
            }
        }
        if requests.is_empty() {
            return;
        }

        let outcomes = self
            .image_fetcher
            .fetch(
                requests,
                FetcherConfig { concurrent_images: options.concurrent_images, retry_attempts: options.retry_attempts },
                cancel,
            )
            .await;

        for outcome in outcomes {
            match outcome {
                ImageFetchOutcome::Fetched(image) => {
                    if let Some(product) = products.iter_mut().find(|p| p.product_id == image.product_id) {
                        product.images.insert(image.role, ImageRef::Stored(image.object_key.clone()));
                    }
                }
                ImageFetchOutcome::Failed { product_id, role, reason } => {
                    warn!(product_id = %product_id.as_str(), role = role.as_str(), reason = %reason, "image fetch failed, record kept without image");
                    let mut guard = run.lock().unwrap();
                    guard.errors.push(SyncError::new(SyncErrorKind::ObjectStoreFailure, reason.clone(), Some(product_id.clone())));
                    drop(guard);
                    self.publish_error(sync_id, SyncErrorKind::ObjectStoreFailure, &reason, Some(product_id), true);
                }
            }
        }
    }

    async fn soft_delete_missing(&self, run: &Arc<StdMutex<SyncRun>>, observed_ids: &HashSet<ProductId>) {
        let all_ids = match self.repo.find_ids(None).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "failed to list stored ids for soft-delete pass");
                return;
            }
        };
        let missing: Vec<ProductId> = all_ids.difference(observed_ids).cloned().collect();
        if missing.is_empty() {
            return;
        }
        if let Err(err) = self.repo.soft_delete(&missing).await {
            warn!(error = %err, count = missing.len(), "soft-delete pass failed");
            return;
        }
        let mut guard = run.lock().unwrap();
        guard.log(format!("soft-deleted {} products absent from this full sync", missing.len()));
    }

    fn set_stage(&self, run: &Arc<StdMutex<SyncRun>>, stage: SyncStage) {
        let mut guard = run.lock().unwrap();
        guard.progress.stage = Some(stage);
    }

    fn publish_progress(&self, run: &Arc<StdMutex<SyncRun>>) {
        let guard = run.lock().unwrap();
        self.bus.publish(ProgressEvent::Progress {
            sync_id: guard.id.clone(),
            stage: guard.progress.stage.unwrap_or(SyncStage::Preparing),
            current: guard.progress.current,
            total: guard.progress.total,
            current_operation: guard.progress.current_operation.clone(),
            estimated_time_remaining_secs: None,
        });
    }

    fn publish_error(
        &self,
        sync_id: &catalogsync_core::domain::SyncRunId,
        kind: SyncErrorKind,
        message: &str,
        product_id: Option<ProductId>,
        recoverable: bool,
    ) {
        self.bus.publish(ProgressEvent::Error {
            sync_id: sync_id.clone(),
            error_type: kind,
            message: message.to_string(),
            product_id,
            recoverable,
            timestamp: Utc::now(),
        });
    }
}
