//! Domain entities and pure business rules.
//!
//! Nothing in this module performs I/O. Adapters (repository, upstream
//! client, object store) live in sibling crates and depend on this one,
//! never the other way around.

pub mod errors;
pub mod image;
pub mod image_url;
pub mod localized;
pub mod money;
pub mod newtypes;
pub mod product;
pub mod sync_log;
pub mod sync_run;

pub use errors::DomainError;
pub use image::{Image, ImageFormat};
pub use image_url::normalize_object_key;
pub use localized::LocalizedText;
pub use money::{Money, Price};
pub use newtypes::{Barcode, ContentDigest, ImageId, Link, ProductId, SyncRunId};
pub use product::{Category, ImageRef, ImageRole, Origin, Product, ProductStatus};
pub use sync_log::{Page, SyncLog, SyncLogFilter, SyncLogPage};
pub use sync_run::{
    Progress, SyncError, SyncErrorKind, SyncMode, SyncOptions, SyncRun, SyncStage, SyncStatus,
    LOG_RING_CAPACITY,
};
