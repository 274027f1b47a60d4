//! Database connection pool management
//!
//! Provides a wrapper around SQLx's `SqlitePool` with:
//! - Automatic directory creation for database files
//! - WAL journal mode for concurrent reads
//! - Automatic schema migration on first connection
//! - In-memory mode for testing

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::errors::RepoError;

/// Manages a pool of SQLite connections for product/sync-log/image
/// persistence.
///
/// The pool is configured with:
/// - WAL journal mode for concurrent read access
/// - 5 max connections for file-based databases
/// - 1 connection for in-memory databases (required for data persistence)
/// - 5-second busy timeout to handle write contention
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Creates a new database pool connected to the specified file.
    ///
    /// This will:
    /// 1. Create parent directories if they don't exist
    /// 2. Create the database file if it doesn't exist
    /// 3. Enable WAL journal mode
    /// 4. Run schema migrations
    ///
    /// # Errors
    /// Returns `RepoError::ConnectionFailed` if the connection cannot be
    /// established, or `RepoError::MigrationFailed` if schema migrations fail.
    pub async fn new(db_path: &Path) -> Result<Self, RepoError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RepoError::ConnectionFailed(format!(
                    "failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                RepoError::ConnectionFailed(format!(
                    "failed to connect to database at {}: {e}",
                    db_path.display()
                ))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::info!(path = %db_path.display(), "database pool initialized");

        Ok(Self { pool })
    }

    /// Creates an in-memory database pool, mainly for tests.
    ///
    /// Uses a single connection to ensure data persistence across
    /// queries (SQLite in-memory databases are per-connection).
    ///
    /// # Errors
    /// Returns `RepoError::ConnectionFailed` if the connection cannot be
    /// established, or `RepoError::MigrationFailed` if schema migrations fail.
    pub async fn in_memory() -> Result<Self, RepoError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| RepoError::ConnectionFailed(format!("failed to create in-memory database: {e}")))?;

        sqlx::raw_sql("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await
            .map_err(|e| RepoError::MigrationFailed(format!("failed to enable foreign keys: {e}")))?;

        Self::run_migrations(&pool).await?;

        tracing::debug!("in-memory database pool initialized");

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying SQLite connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs the initial schema migration (spec §4.3).
    async fn run_migrations(pool: &SqlitePool) -> Result<(), RepoError> {
        let migration_sql = include_str!("migrations/20260728_initial.sql");
        sqlx::raw_sql(migration_sql)
            .execute(pool)
            .await
            .map_err(|e| RepoError::MigrationFailed(format!("failed to run initial migration: {e}")))?;

        tracing::debug!("database migrations completed");
        Ok(())
    }
}
