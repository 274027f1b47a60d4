//! `Scheduler` — cron-expression-driven sync triggers (spec §4.8).
//!
//! Each configured cron string becomes one independent trigger loop: it
//! sleeps until its next scheduled fire time (computed in the configured
//! timezone, default `Asia/Shanghai`), then asks the [`SyncEngineHandle`]
//! to start a run of the preset mode. If the engine refuses because a run
//! is already active, the trigger is logged and skipped — there is no
//! queue (spec §4.8).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use catalogsync_core::config::ScheduleConfig;
use catalogsync_core::domain::{SyncMode, SyncOptions};
use catalogsync_engine::{EngineError, SyncEngineHandle};
use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors building a [`Scheduler`] from configuration.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid cron expression for {label} schedule: {source}")]
    InvalidCron {
        label: &'static str,
        #[source]
        source: cron::error::Error,
    },
    #[error("invalid schedule timezone: {0}")]
    InvalidTimezone(String),
}

struct Trigger {
    label: &'static str,
    schedule: Schedule,
    mode: SyncMode,
    options: SyncOptions,
}

fn parse_cron(label: &'static str, expr: &str) -> Result<Schedule, SchedulerError> {
    Schedule::from_str(expr).map_err(|source| SchedulerError::InvalidCron { label, source })
}

/// Drives zero or more cron-triggered sync runs against a shared
/// [`SyncEngineHandle`]. One independent loop per configured schedule;
/// an idle scheduler (no cron strings configured) just waits for
/// cancellation.
pub struct Scheduler {
    engine: Arc<SyncEngineHandle>,
    triggers: Vec<Trigger>,
    timezone: Tz,
}

impl Scheduler {
    /// Builds a scheduler from the `full`/`incremental`/`validation` cron
    /// strings in `config`. A `None` cron string simply omits that
    /// trigger. "Validation" (spec §4.8) is a full resync with
    /// `forceUpdate` set, so every stored product is re-diffed against
    /// the upstream table rather than skipped via `contentDigest`.
    ///
    /// # Errors
    /// Returns `SchedulerError::InvalidCron` if a configured cron string
    /// doesn't parse, or `SchedulerError::InvalidTimezone` if
    /// `config.timezone` isn't a recognized IANA zone.
    pub fn new(config: &ScheduleConfig, engine: Arc<SyncEngineHandle>) -> Result<Self, SchedulerError> {
        let timezone: Tz = config
            .timezone
            .parse()
            .map_err(|_| SchedulerError::InvalidTimezone(config.timezone.clone()))?;

        let mut triggers = Vec::new();
        if let Some(expr) = &config.full_sync_cron {
            triggers.push(Trigger {
                label: "full",
                schedule: parse_cron("full", expr)?,
                mode: SyncMode::Full,
                options: SyncOptions::default(),
            });
        }
        if let Some(expr) = &config.incremental_sync_cron {
            triggers.push(Trigger {
                label: "incremental",
                schedule: parse_cron("incremental", expr)?,
                mode: SyncMode::Incremental,
                options: SyncOptions::default(),
            });
        }
        if let Some(expr) = &config.validation_cron {
            triggers.push(Trigger {
                label: "validation",
                schedule: parse_cron("validation", expr)?,
                mode: SyncMode::Full,
                options: SyncOptions { force_update: true, ..SyncOptions::default() },
            });
        }

        Ok(Self { engine, triggers, timezone })
    }

    /// Runs every configured trigger concurrently until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        if self.triggers.is_empty() {
            info!("no cron schedules configured, scheduler idle");
            cancel.cancelled().await;
            return;
        }

        let mut tasks = tokio::task::JoinSet::new();
        for idx in 0..self.triggers.len() {
            let this = Arc::clone(&self);
            let cancel = cancel.clone();
            tasks.spawn(async move { this.run_trigger(idx, cancel).await });
        }
        while tasks.join_next().await.is_some() {}
    }

    async fn run_trigger(&self, idx: usize, cancel: CancellationToken) {
        let trigger = &self.triggers[idx];
        loop {
            let now = Utc::now().with_timezone(&self.timezone);
            let Some(next) = trigger.schedule.after(&now).next() else {
                info!(trigger = trigger.label, "cron schedule has no further occurrences, trigger retiring");
                return;
            };
            let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => return,
            }
            if cancel.is_cancelled() {
                return;
            }

            match self.engine.start(trigger.mode, trigger.options.clone()) {
                Ok(id) => {
                    info!(trigger = trigger.label, sync_id = id.as_str(), "scheduled sync triggered");
                }
                Err(EngineError::AlreadyRunning) => {
                    warn!(trigger = trigger.label, "scheduled trigger skipped: a sync run is already active");
                }
                Err(err) => {
                    warn!(trigger = trigger.label, error = %err, "scheduled trigger failed to start");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogsync_bus::ProgressBus;
    use catalogsync_core::domain::{
        ContentDigest, Image, ImageRole, Page, Product, ProductId, SyncLog, SyncLogFilter,
        SyncLogPage, SyncRunId,
    };
    use catalogsync_core::ports::{
        Cursor, ObjectStore, ProductRepository, RecordPage, ResolvedAttachment, UpstreamTableClient,
        UpsertOutcome,
    };
    use catalogsync_engine::EngineConfig;
    use catalogsync_images::LocalObjectStore;
    use catalogsync_retry::TokenBucket;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

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
        log_count: Mutex<u32>,
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
            *self.log_count.lock().unwrap() += 1;
            Ok(())
        }
        async fn list_sync_logs(&self, _filter: &SyncLogFilter, _page: Page) -> anyhow::Result<SyncLogPage> {
            Ok(SyncLogPage { items: Vec::new(), total: 0 })
        }
        async fn get_sync_log(&self, _id: &SyncRunId) -> anyhow::Result<Option<SyncLog>> {
            Ok(None)
        }
    }

    fn build_engine() -> Arc<SyncEngineHandle> {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> =
            Arc::new(LocalObjectStore::new(dir.path().to_path_buf(), "http://objects.local".to_string()));
        let engine = Arc::new(catalogsync_engine::SyncEngine::new(
            Arc::new(EmptyUpstream),
            Arc::new(InMemoryRepo::default()),
            store,
            Arc::new(ProgressBus::new()),
            Arc::new(TokenBucket::new(100, 100.0)),
            Arc::new(TokenBucket::new(100, 100.0)),
            EngineConfig { operation_deadline: StdDuration::from_secs(60) },
        ));
        Arc::new(SyncEngineHandle::new(engine))
    }

    #[test]
    fn invalid_cron_expression_is_rejected() {
        let engine = build_engine();
        let config = ScheduleConfig { full_sync_cron: Some("not a cron".to_string()), ..ScheduleConfig::default() };
        let err = Scheduler::new(&config, engine).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron { label: "full", .. }));
    }

    #[test]
    fn invalid_timezone_is_rejected() {
        let engine = build_engine();
        let config = ScheduleConfig { timezone: "Not/AZone".to_string(), ..ScheduleConfig::default() };
        let err = Scheduler::new(&config, engine).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidTimezone(_)));
    }

    #[test]
    fn no_schedules_configured_is_valid() {
        let engine = build_engine();
        let config = ScheduleConfig::default();
        let scheduler = Scheduler::new(&config, engine).unwrap();
        assert!(scheduler.triggers.is_empty());
    }

    #[tokio::test]
    async fn every_second_trigger_starts_a_run() {
        let engine = build_engine();
        let config = ScheduleConfig {
            full_sync_cron: Some("* * * * * * *".to_string()),
            timezone: "UTC".to_string(),
            ..ScheduleConfig::default()
        };
        let scheduler = Arc::new(Scheduler::new(&config, Arc::clone(&engine)).unwrap());
        let cancel = CancellationToken::new();

        let run_cancel = cancel.clone();
        let handle = tokio::spawn(async move { scheduler.run(run_cancel).await });

        tokio::time::sleep(StdDuration::from_millis(1500)).await;
        cancel.cancel();
        let _ = tokio::time::timeout(StdDuration::from_secs(2), handle).await;

        assert!(engine.current().is_some());
    }
}
