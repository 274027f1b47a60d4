//! Product repository port (driven/secondary port, spec §4.3)
//!
//! CRUD + bulk diff queries against the document store for product
//! entities, images, and sync logs.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, a hosted document database, etc.) and don't need
//!   domain-level classification at this boundary.
//! - `upsert_batch` must be atomic per product but not across the whole
//!   batch (spec §4.3): a partial batch failure leaves already-written
//!   products written.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::domain::{
    ContentDigest, Image, ImageRole, Page, Product, ProductId, SyncLog, SyncLogFilter,
    SyncLogPage, SyncRunId,
};

/// Result of a bulk upsert (spec §4.3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: u64,
    pub updated: u64,
    /// Incoming `contentDigest` equalled the stored one; no write occurred.
    pub skipped: u64,
}

impl std::ops::AddAssign for UpsertOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.updated += rhs.updated;
        self.skipped += rhs.skipped;
    }
}

/// Port trait for persistent product/image/sync-log storage.
#[async_trait::async_trait]
pub trait ProductRepository: Send + Sync {
    /// Upserts a batch of products keyed by `productId`.
    ///
    /// # Errors
    /// Returns an error if the underlying storage is unreachable or a
    /// write fails; per spec §4.3 this is not required to roll back
    /// products already written earlier in the same batch.
    async fn upsert_batch(&self, products: &[Product]) -> anyhow::Result<UpsertOutcome>;

    /// Enumerates all product ids, optionally filtered by `sync_time > since`.
    async fn find_ids(&self, since: Option<DateTime<Utc>>) -> anyhow::Result<HashSet<ProductId>>;

    /// Looks up the stored `contentDigest` for a product, used by
    /// incremental-mode diffing (spec §4.6 step 3c).
    async fn content_digest(&self, id: &ProductId) -> anyhow::Result<Option<ContentDigest>>;

    /// Marks the given products deleted without erasing them (spec §4.3).
    async fn soft_delete(&self, product_ids: &[ProductId]) -> anyhow::Result<()>;

    /// Looks up the current `Image` for a `(productId, role)` pair, used
    /// by the image fetcher's hash-based dedup (spec §4.2 step 4).
    async fn get_image(&self, product_id: &ProductId, role: ImageRole) -> anyhow::Result<Option<Image>>;

    /// Records (or supersedes) the current image for a `(productId, role)` pair.
    async fn put_image(&self, image: &Image) -> anyhow::Result<()>;

    /// Persists a terminal or in-progress sync log snapshot.
    async fn put_sync_log(&self, log: &SyncLog) -> anyhow::Result<()>;

    /// Lists sync logs matching `filter`, paginated.
    async fn list_sync_logs(&self, filter: &SyncLogFilter, page: Page) -> anyhow::Result<SyncLogPage>;

    /// Fetches a single sync log by id.
    async fn get_sync_log(&self, id: &SyncRunId) -> anyhow::Result<Option<SyncLog>>;
}
