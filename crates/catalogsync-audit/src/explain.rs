//! Human-readable failure explanations over the audit trail (spec §4.11).
//!
//! Generalizes the teacher's `explain_failure` usecase: instead of
//! looking up a single filesystem item's conflict history, this looks
//! up a product's (or a whole sync run's) most recent audit entries and
//! renders them into a message plus suggested next actions.

use std::sync::Arc;

use catalogsync_core::domain::{ProductId, SyncRunId};
use serde::Serialize;

use crate::action::AuditAction;
use crate::entry::AuditEntry;
use crate::reason::ReasonCode;
use crate::repository::{AuditFilter, AuditRepository};

/// Rendered explanation for why a product or sync run is in its current
/// state, derived from the audit trail rather than live domain state.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub message: String,
    pub suggestions: Vec<String>,
    pub entries: Vec<AuditEntry>,
}

/// Looks up a product's or sync run's recent audit history and explains
/// the most recent failure found, if any.
pub struct ExplainFailureUseCase {
    audit: Arc<dyn AuditRepository>,
}

impl ExplainFailureUseCase {
    #[must_use]
    pub fn new(audit: Arc<dyn AuditRepository>) -> Self {
        Self { audit }
    }

    /// Explains the most recent audit activity for a single product.
    ///
    /// # Errors
    /// Propagates `AuditError` if the underlying query fails.
    pub async fn explain_product(&self, product_id: &ProductId) -> Result<Explanation, crate::repository::AuditError> {
        let filter = AuditFilter { product_id: Some(product_id.clone()), ..Default::default() };
        let entries = self.audit.query(&filter, 20).await?;
        Ok(Self::render(&entries))
    }

    /// Explains the most recent audit activity for a single sync run.
    ///
    /// # Errors
    /// Propagates `AuditError` if the underlying query fails.
    pub async fn explain_sync(&self, sync_id: &SyncRunId) -> Result<Explanation, crate::repository::AuditError> {
        let filter = AuditFilter { sync_id: Some(sync_id.clone()), ..Default::default() };
        let entries = self.audit.query(&filter, 100).await?;
        Ok(Self::render(&entries))
    }

    fn render(entries: &[AuditEntry]) -> Explanation {
        let Some(latest_failure) = entries.iter().find(|e| e.result().is_failed()) else {
            return Explanation {
                message: "No recorded failures in the queried audit window.".to_string(),
                suggestions: Vec::new(),
                entries: entries.to_vec(),
            };
        };

        let crate::entry::AuditResult::Failed { reason, message } = latest_failure.result() else {
            unreachable!("filtered to failed entries");
        };

        let explanation_message = format!(
            "{} failed during {}: {message}",
            latest_failure.product_id().map_or_else(|| "Sync run".to_string(), ToString::to_string),
            latest_failure.action(),
        );

        Explanation {
            message: explanation_message,
            suggestions: Self::suggestions_for(reason, latest_failure.action()),
            entries: entries.to_vec(),
        }
    }

    fn suggestions_for(reason: &ReasonCode, action: &AuditAction) -> Vec<String> {
        match reason {
            ReasonCode::AuthExpired => vec![
                "Refresh the upstream access token and retry the sync.".to_string(),
            ],
            ReasonCode::TransientUpstream => vec![
                "The upstream table was temporarily unavailable; a scheduled retry should resolve this.".to_string(),
            ],
            ReasonCode::PermanentUpstream => vec![
                "Check the upstream table id and field mapping configuration for this product.".to_string(),
            ],
            ReasonCode::TransformFailure => vec![
                "Inspect the raw record for this product; a required field is likely missing or malformed."
                    .to_string(),
            ],
            ReasonCode::StorageFailure => {
                vec!["Check local document store health and available disk space.".to_string()]
            }
            ReasonCode::ObjectStoreFailure => vec![
                "Check object store connectivity and credentials; the image will be retried next sync."
                    .to_string(),
            ],
            ReasonCode::Cancelled => vec!["The operation was cancelled; restart it manually if needed.".to_string()],
            ReasonCode::DeadlineExceeded => vec![
                "The operation exceeded its deadline; consider reducing batch size or increasing the timeout."
                    .to_string(),
            ],
        }
        .into_iter()
        .chain(matches!(action, AuditAction::ScheduledTriggerSkipped).then(|| {
            "A scheduled trigger was skipped because a run was already in progress.".to_string()
        }))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::entry::AuditResult;
    use crate::repository::AuditError;

    #[derive(Default)]
    struct FixedRepo {
        entries: Mutex<Vec<AuditEntry>>,
    }

    #[async_trait]
    impl AuditRepository for FixedRepo {
        async fn insert(&self, entry: &AuditEntry) -> Result<(), AuditError> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
        async fn query(&self, _filter: &AuditFilter, _limit: u32) -> Result<Vec<AuditEntry>, AuditError> {
            Ok(self.entries.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn explains_most_recent_failure() {
        let repo = Arc::new(FixedRepo::default());
        let product_id = ProductId::new("p1").unwrap();
        repo.entries.lock().unwrap().push(
            AuditEntry::new(
                AuditAction::TransformRejected,
                AuditResult::failed(ReasonCode::TransformFailure, "missing sku"),
            )
            .with_product_id(product_id.clone()),
        );

        let usecase = ExplainFailureUseCase::new(repo);
        let explanation = usecase.explain_product(&product_id).await.unwrap();

        assert!(explanation.message.contains("missing sku"));
        assert!(!explanation.suggestions.is_empty());
    }

    #[tokio::test]
    async fn no_failures_yields_clean_explanation() {
        let repo = Arc::new(FixedRepo::default());
        let usecase = ExplainFailureUseCase::new(repo);
        let explanation = usecase.explain_product(&ProductId::new("p1").unwrap()).await.unwrap();
        assert!(explanation.suggestions.is_empty());
    }
}
