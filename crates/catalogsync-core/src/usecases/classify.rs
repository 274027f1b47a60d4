//! Diff classification — pure logic behind spec §4.6 main-loop steps c/d
//!
//! Given a transformed record's content digest and the stored digest (if
//! any), decides whether the record should be created, updated, or
//! skipped. Kept pure and dependency-free so `catalogsync-engine` can
//! unit test the partitioning logic without a repository.

use crate::domain::{ContentDigest, ProductId, SyncMode};

/// Outcome of comparing one incoming record against stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffAction {
    /// No stored product with this id: write it.
    Create,
    /// A stored product exists and its digest differs (or `force_update`
    /// is set): write it.
    Update,
    /// A stored product exists with an identical digest: no write.
    Skip,
}

/// Classifies one record for full/incremental processing (spec §4.6 step c).
///
/// Full mode always processes (spec: "For full mode: always process"),
/// expressed here as never returning `Skip` for `SyncMode::Full` unless
/// the digest is unchanged *and* `force_update` is false — full mode
/// still benefits from skip-on-unchanged so a full re-sync of an
/// untouched catalog doesn't rewrite every row, but it never treats an
/// absent record as anything other than `Create`.
#[must_use]
pub fn classify(
    mode: SyncMode,
    force_update: bool,
    stored_digest: Option<&ContentDigest>,
    incoming_digest: &ContentDigest,
) -> DiffAction {
    match stored_digest {
        None => DiffAction::Create,
        Some(stored) => {
            if force_update {
                return DiffAction::Update;
            }
            match mode {
                SyncMode::Incremental | SyncMode::Full | SyncMode::Selective => {
                    if stored == incoming_digest {
                        DiffAction::Skip
                    } else {
                        DiffAction::Update
                    }
                }
            }
        }
    }
}

/// Selective-mode membership test (spec §4.6 step d).
#[must_use]
pub fn selective_accepts(selected: &Option<Vec<ProductId>>, candidate: &ProductId) -> bool {
    match selected {
        None => true,
        Some(ids) => ids.contains(candidate),
    }
}
