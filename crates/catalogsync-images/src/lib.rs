//! Attachment resolution, download, verification, and object-store
//! upload — C2 `ImageFetcher` (spec §4.2).
//!
//! Also hosts [`local_store::LocalObjectStore`], a filesystem-backed
//! reference [`catalogsync_core::ports::ObjectStore`] adapter for local
//! runs and tests (spec §4.10); production deployments supply their own
//! adapter against the same port.

mod fetcher;
mod local_store;
mod sniff;

pub use fetcher::{FetcherConfig, ImageFetchOutcome, ImageFetcher, ImageRequest};
pub use local_store::LocalObjectStore;
pub use sniff::sniff_format;
