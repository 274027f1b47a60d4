//! Port (trait) definitions for adapters. Implementations live in
//! sibling crates (`catalogsync-upstream`, `catalogsync-repo`,
//! `catalogsync-images`) and in test doubles.

pub mod object_store;
pub mod product_repository;
pub mod upstream_table;

pub use object_store::ObjectStore;
pub use product_repository::{ProductRepository, UpsertOutcome};
pub use upstream_table::{Cursor, RawRecord, RecordPage, ResolvedAttachment, UpstreamTableClient};
