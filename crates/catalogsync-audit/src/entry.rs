//! `AuditEntry` — one recorded audit-trail row (spec §4.11).

use catalogsync_core::domain::{ProductId, SyncRunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::AuditAction;
use crate::reason::ReasonCode;

/// Outcome of an audited action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Failed { reason: ReasonCode, message: String },
}

impl AuditResult {
    #[must_use]
    pub fn success() -> Self {
        AuditResult::Success
    }

    #[must_use]
    pub fn failed(reason: ReasonCode, message: impl Into<String>) -> Self {
        AuditResult::Failed { reason, message: message.into() }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, AuditResult::Success)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, AuditResult::Failed { .. })
    }
}

/// A single audit-trail row, queryable independently of any one sync
/// run's bounded `logs[]` ring buffer (spec §3.2, §4.11).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    id: Option<i64>,
    timestamp: DateTime<Utc>,
    sync_id: Option<SyncRunId>,
    product_id: Option<ProductId>,
    action: AuditAction,
    result: AuditResult,
    details: Value,
    duration_ms: Option<u64>,
}

impl AuditEntry {
    #[must_use]
    pub fn new(action: AuditAction, result: AuditResult) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            sync_id: None,
            product_id: None,
            action,
            result,
            details: Value::Null,
            duration_ms: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Overrides the timestamp, used when rehydrating a row from storage.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn sync_id(&self) -> Option<&SyncRunId> {
        self.sync_id.as_ref()
    }

    #[must_use]
    pub fn with_sync_id(mut self, sync_id: SyncRunId) -> Self {
        self.sync_id = Some(sync_id);
        self
    }

    #[must_use]
    pub fn product_id(&self) -> Option<&ProductId> {
        self.product_id.as_ref()
    }

    #[must_use]
    pub fn with_product_id(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    #[must_use]
    pub fn action(&self) -> &AuditAction {
        &self.action
    }

    #[must_use]
    pub fn result(&self) -> &AuditResult {
        &self.result
    }

    #[must_use]
    pub fn details(&self) -> &Value {
        &self.details
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}
