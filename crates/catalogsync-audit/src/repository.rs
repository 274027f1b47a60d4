//! Persistence port for audit entries, backed by SQLite (spec §4.11).

use async_trait::async_trait;
use catalogsync_core::domain::{ProductId, SyncRunId};
use catalogsync_repo::DatabasePool;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::action::AuditAction;
use crate::entry::{AuditEntry, AuditResult};
use crate::reason::ReasonCode;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store error: {0}")]
    Store(String),
}

/// Filter for querying the audit trail.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub sync_id: Option<SyncRunId>,
    pub product_id: Option<ProductId>,
    pub action: Option<AuditAction>,
    pub since: Option<DateTime<Utc>>,
}

/// Port for recording and querying audit entries.
///
/// Implementations must never let a storage failure propagate into the
/// sync pipeline (spec §4.11): callers treat a write failure as
/// best-effort and log it, they never abort a sync run over it.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn insert(&self, entry: &AuditEntry) -> Result<(), AuditError>;

    async fn query(&self, filter: &AuditFilter, limit: u32) -> Result<Vec<AuditEntry>, AuditError>;
}

/// SQLite-backed [`AuditRepository`], reusing the product repository's
/// connection pool rather than owning a separate database file.
pub struct SqliteAuditRepository {
    pool: std::sync::Arc<DatabasePool>,
}

impl SqliteAuditRepository {
    /// Creates the repository and its backing table if absent.
    ///
    /// # Errors
    /// Returns `AuditError::Store` if the table cannot be created.
    pub async fn new(pool: std::sync::Arc<DatabasePool>) -> Result<Self, AuditError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS audit_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                sync_id TEXT,
                product_id TEXT,
                action TEXT NOT NULL,
                result TEXT NOT NULL,
                reason TEXT,
                message TEXT,
                details TEXT NOT NULL,
                duration_ms INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_audit_sync_id ON audit_entries(sync_id);
            CREATE INDEX IF NOT EXISTS idx_audit_product_id ON audit_entries(product_id);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_entries(timestamp);
            ",
        )
        .execute(pool.pool())
        .await
        .map_err(|e| AuditError::Store(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn insert(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let (reason, message) = match entry.result() {
            AuditResult::Success => (None, None),
            AuditResult::Failed { reason, message } => (Some(reason.to_string()), Some(message.clone())),
        };
        let result_str = if entry.result().is_success() { "success" } else { "failed" };

        sqlx::query(
            r"
            INSERT INTO audit_entries
                (timestamp, sync_id, product_id, action, result, reason, message, details, duration_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(entry.timestamp().to_rfc3339())
        .bind(entry.sync_id().map(ToString::to_string))
        .bind(entry.product_id().map(ToString::to_string))
        .bind(entry.action().to_string())
        .bind(result_str)
        .bind(reason)
        .bind(message)
        .bind(entry.details().to_string())
        .bind(entry.duration_ms().map(|d| d as i64))
        .execute(self.pool.pool())
        .await
        .map_err(|e| AuditError::Store(e.to_string()))?;

        Ok(())
    }

    async fn query(&self, filter: &AuditFilter, limit: u32) -> Result<Vec<AuditEntry>, AuditError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r"
            SELECT id, timestamp, sync_id, product_id, action, result, reason, message, details, duration_ms
            FROM audit_entries
            WHERE (?1 IS NULL OR sync_id = ?1)
              AND (?2 IS NULL OR product_id = ?2)
              AND (?3 IS NULL OR action = ?3)
              AND (?4 IS NULL OR timestamp >= ?4)
            ORDER BY id DESC
            LIMIT ?5
            ",
        )
        .bind(filter.sync_id.as_ref().map(ToString::to_string))
        .bind(filter.product_id.as_ref().map(ToString::to_string))
        .bind(filter.action.map(|a| a.to_string()))
        .bind(filter.since.map(|t| t.to_rfc3339()))
        .bind(i64::from(limit))
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| AuditError::Store(e.to_string()))?;

        rows.into_iter().map(AuditRow::into_entry).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: i64,
    timestamp: String,
    sync_id: Option<String>,
    product_id: Option<String>,
    action: String,
    result: String,
    reason: Option<String>,
    message: Option<String>,
    details: String,
    duration_ms: Option<i64>,
}

impl AuditRow {
    fn into_entry(self) -> Result<AuditEntry, AuditError> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| AuditError::Store(format!("corrupt timestamp: {e}")))?
            .with_timezone(&Utc);
        let action: AuditAction = self
            .action
            .parse()
            .map_err(|e| AuditError::Store(format!("corrupt action: {e}")))?;
        let result = if self.result == "success" {
            AuditResult::success()
        } else {
            let reason: ReasonCode = serde_json::from_value(serde_json::Value::String(
                self.reason.unwrap_or_default(),
            ))
            .map_err(|e| AuditError::Store(format!("corrupt reason: {e}")))?;
            AuditResult::failed(reason, self.message.unwrap_or_default())
        };
        let details: serde_json::Value =
            serde_json::from_str(&self.details).map_err(|e| AuditError::Store(format!("corrupt details: {e}")))?;

        let mut entry = AuditEntry::new(action, result)
            .with_id(self.id)
            .with_details(details)
            .with_timestamp(timestamp);
        if let Some(sync_id) = self.sync_id {
            entry = entry.with_sync_id(
                SyncRunId::new(sync_id).map_err(|e| AuditError::Store(format!("corrupt sync_id: {e}")))?,
            );
        }
        if let Some(product_id) = self.product_id {
            entry = entry.with_product_id(
                ProductId::new(product_id).map_err(|e| AuditError::Store(format!("corrupt product_id: {e}")))?,
            );
        }
        if let Some(duration_ms) = self.duration_ms {
            entry = entry.with_duration_ms(duration_ms as u64);
        }
        Ok(entry)
    }
}
