//! Cron-driven sync triggers (spec §4.8).
//!
//! Generalizes the teacher's debounce-queue-driven `SyncScheduler` from
//! filesystem-change triggers to cron-tick triggers: same `tokio::select!`
//! loop shape, same "sets a flag / fires, doesn't queue" discipline when
//! the engine refuses a run that's already active.

mod scheduler;

pub use scheduler::{Scheduler, SchedulerError};
