//! Domain model, ports, and pure use-case logic for catalogsync.
//!
//! This crate has no I/O of its own: it defines the entities (`domain`),
//! the trait boundaries adapters implement (`ports`), the dependency-free
//! decision logic shared across adapters (`usecases`), and the typed
//! configuration loaded at startup (`config`).

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;

pub use config::Config;
