//! Pure use-case logic shared by the adapter crates: nothing here
//! performs I/O, so it is exercised directly by unit tests rather than
//! integration tests.

pub mod classify;
pub mod content_digest;

pub use classify::{classify, selective_accepts, DiffAction};
pub use content_digest::content_digest;
