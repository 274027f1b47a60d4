//! Shared application state injected into every route handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use catalogsync_bus::ProgressBus;
use catalogsync_core::ports::{ObjectStore, ProductRepository, UpstreamTableClient};
use catalogsync_engine::SyncEngineHandle;

/// Liveness flag a [`catalogsync_scheduler::Scheduler`] task can be asked
/// to flip, surfaced by `GET /health` (spec §6.1 "scheduler" dependency).
#[derive(Clone, Default)]
pub struct HealthCheck {
    scheduler_alive: Arc<AtomicBool>,
}

impl HealthCheck {
    #[must_use]
    pub fn new() -> Self {
        Self { scheduler_alive: Arc::new(AtomicBool::new(true)) }
    }

    pub fn mark_scheduler_alive(&self, alive: bool) {
        self.scheduler_alive.store(alive, Ordering::Relaxed);
    }

    #[must_use]
    pub fn scheduler_alive(&self) -> bool {
        self.scheduler_alive.load(Ordering::Relaxed)
    }
}

/// Timeout applied to each dependency ping in `GET /health`, so one
/// unreachable dependency can't hang the whole health check.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngineHandle>,
    pub repo: Arc<dyn ProductRepository>,
    pub upstream: Arc<dyn UpstreamTableClient>,
    pub object_store: Arc<dyn ObjectStore>,
    pub bus: Arc<ProgressBus>,
    pub health: HealthCheck,
}

impl AppState {
    #[must_use]
    pub fn new(
        engine: Arc<SyncEngineHandle>,
        repo: Arc<dyn ProductRepository>,
        upstream: Arc<dyn UpstreamTableClient>,
        object_store: Arc<dyn ObjectStore>,
        bus: Arc<ProgressBus>,
        health: HealthCheck,
    ) -> Self {
        Self { engine, repo, upstream, object_store, bus, health }
    }
}
