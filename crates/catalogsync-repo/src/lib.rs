//! SQLite-backed `ProductRepository` adapter (spec §4.3).

pub mod errors;
pub mod pool;
pub mod repository;

pub use errors::RepoError;
pub use pool::DatabasePool;
pub use repository::SqliteProductRepository;
