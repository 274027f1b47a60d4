//! Repository-level error type. Adapter methods expose `anyhow::Result`
//! at the port boundary (spec §4.3 design notes); this enum is the
//! concrete error that gets wrapped there, mirroring the teacher's
//! `CacheError` shape.

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),
    #[error("schema migration failed: {0}")]
    MigrationFailed(String),
    #[error("failed to (de)serialize stored row: {0}")]
    Serialization(String),
    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),
}
