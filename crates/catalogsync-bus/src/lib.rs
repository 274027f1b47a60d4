//! ProgressBus — in-process pub-sub fan-out of sync events (spec §4.5).
//!
//! Publishers (the sync engine) never block on subscribers (HTTP/WebSocket
//! clients via `catalogsync-api`); a subscriber that falls behind sees a
//! single synthetic `Lagged` event rather than stalling the pipeline.

mod bus;
mod event;

pub use bus::{ProgressBus, ProgressSubscription, DEFAULT_CAPACITY};
pub use event::ProgressEvent;
