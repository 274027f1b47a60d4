//! Upstream table client port (driven/secondary port, spec §6.2)
//!
//! This is the only contact point with the external multi-dimensional
//! table service. The trait captures exactly the three capabilities the
//! sync core depends on; everything else (token acquisition, request
//! signing, endpoint shape) is the adapter's concern.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific and don't need domain-level classification here;
//!   `catalogsync-retry` classifies them into `ErrorClass` at the call site.
//! - `RawRecord` is a port-level DTO (opaque upstream JSON), not a domain
//!   entity; `catalogsync-mapper` is responsible for turning it into a `Product`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// One upstream record, keyed by the upstream's own field identifiers.
/// Field mapping (catalogsync-mapper) interprets these keys; this port
/// never interprets them itself.
pub type RawRecord = serde_json::Map<String, Value>;

/// Opaque pagination cursor returned by `list_records`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(pub String);

/// Response from a single page of `list_records`.
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<RawRecord>,
    pub next_cursor: Option<Cursor>,
    /// Total record count hint, present at least on the first page
    /// (spec §4.6 step 2: used as the progress denominator).
    pub total_hint: Option<u64>,
}

/// A temporary signed URL resolved from an attachment token (spec §4.2 step 1).
#[derive(Debug, Clone)]
pub struct ResolvedAttachment {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Port trait for the upstream multi-dimensional table service.
#[async_trait::async_trait]
pub trait UpstreamTableClient: Send + Sync {
    /// Fetches one page of records.
    ///
    /// `cursor` is `None` for the first page. `page_size` is a hint, not
    /// a hard contract — implementations may return fewer records.
    async fn list_records(
        &self,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> anyhow::Result<RecordPage>;

    /// Batch-resolves attachment tokens into short-lived signed URLs
    /// (spec §4.2 step 1). Up to `tokens.len()` entries are returned;
    /// tokens the upstream rejects are simply absent from the map.
    async fn resolve_attachments(
        &self,
        tokens: &[String],
    ) -> anyhow::Result<HashMap<String, ResolvedAttachment>>;

    /// Returns the upstream table's current revision, required as
    /// context for `resolve_attachments` by some upstream implementations
    /// (spec §6.2).
    async fn table_revision(&self) -> anyhow::Result<i64>;
}
