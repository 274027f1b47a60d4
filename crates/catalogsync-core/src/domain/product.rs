//! Product domain entity (spec §3.1)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::errors::DomainError;
use super::localized::LocalizedText;
use super::money::Price;
use super::newtypes::{Barcode, Link, ProductId};

/// Which attachment slot an image occupies on a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    Front,
    Back,
    Label,
    Package,
    Gift,
}

impl ImageRole {
    /// All roles, in the canonical order used for deterministic iteration.
    pub const ALL: [ImageRole; 5] = [
        ImageRole::Front,
        ImageRole::Back,
        ImageRole::Label,
        ImageRole::Package,
        ImageRole::Gift,
    ];

    /// Wire/storage representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageRole::Front => "front",
            ImageRole::Back => "back",
            ImageRole::Label => "label",
            ImageRole::Package => "package",
            ImageRole::Gift => "gift",
        }
    }

    /// Parses a role from its wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "front" => ImageRole::Front,
            "back" => ImageRole::Back,
            "label" => ImageRole::Label,
            "package" => ImageRole::Package,
            "gift" => ImageRole::Gift,
            _ => return None,
        })
    }
}

/// An image reference before or after it has been downloaded and stored
/// (spec §3.1 `images`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageRef {
    /// An upstream attachment token that has not yet been fetched.
    Token(String),
    /// A stable object-store key for an already-persisted image. A
    /// product never reverts from `Stored` back to `Token` for the same
    /// role once the fetch has succeeded (spec §3.1 invariant).
    Stored(String),
}

/// Geographic origin, each part a localized triple (spec §3.1 `origin`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub country: LocalizedText,
    pub province: LocalizedText,
    pub city: LocalizedText,
}

/// Category, split into primary/secondary localized triples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub primary: LocalizedText,
    pub secondary: LocalizedText,
}

/// Lifecycle status of a product (spec §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Inactive,
    Deleted,
}

/// The normalized product entity synchronized from the upstream table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub internal_id: Option<String>,
    pub sequence: Option<String>,
    pub name: LocalizedText,
    pub category: Category,
    pub price: Price,
    pub images: BTreeMap<ImageRole, ImageRef>,
    pub origin: Origin,
    pub platform: LocalizedText,
    pub specification: LocalizedText,
    pub flavor: LocalizedText,
    pub manufacturer: LocalizedText,
    pub barcode: Option<Barcode>,
    pub link: Option<Link>,
    pub collect_time: DateTime<Utc>,
    pub sync_time: DateTime<Utc>,
    pub version: i64,
    pub status: ProductStatus,
    pub is_visible: bool,
}

impl Product {
    /// Validates the cross-field invariants spec §3.1 names beyond what
    /// the individual newtypes already enforce: `sync_time >= collect_time`
    /// and `version >= 1`.
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if an invariant is violated.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.sync_time < self.collect_time {
            return Err(DomainError::ValidationFailed(format!(
                "sync_time ({}) precedes collect_time ({})",
                self.sync_time, self.collect_time
            )));
        }
        if self.version < 1 {
            return Err(DomainError::ValidationFailed(format!(
                "version must be >= 1, got {}",
                self.version
            )));
        }
        Ok(())
    }

    /// Returns true if `next_version` is a legal successor to this
    /// product's stored version (spec §3.1: version only increases).
    #[must_use]
    pub fn accepts_version(&self, next_version: i64) -> bool {
        next_version > self.version
    }

    /// Marks this product soft-deleted (spec §3.2 Lifecycle): status and
    /// visibility flip, nothing else is erased.
    pub fn soft_delete(&mut self, at: DateTime<Utc>) {
        self.status = ProductStatus::Deleted;
        self.is_visible = false;
        self.sync_time = at;
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(collect: DateTime<Utc>, sync: DateTime<Utc>, version: i64) -> Product {
        Product {
            product_id: ProductId::new("rec1").unwrap(),
            internal_id: None,
            sequence: None,
            name: LocalizedText::new("苹果", "Apple", "Apple"),
            category: Category::default(),
            price: Price::default(),
            images: BTreeMap::new(),
            origin: Origin::default(),
            platform: LocalizedText::default(),
            specification: LocalizedText::default(),
            flavor: LocalizedText::default(),
            manufacturer: LocalizedText::default(),
            barcode: None,
            link: None,
            collect_time: collect,
            sync_time: sync,
            version,
            status: ProductStatus::Active,
            is_visible: true,
        }
    }

    #[test]
    fn validate_rejects_sync_before_collect() {
        let collect = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let sync = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let p = sample(collect, sync, 1);
        assert!(p.validate().is_err());
    }

    #[test]
    fn validate_accepts_sync_after_collect() {
        let collect = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let sync = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let p = sample(collect, sync, 1);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn accepts_version_requires_increase() {
        let now = Utc::now();
        let p = sample(now, now, 3);
        assert!(!p.accepts_version(2));
        assert!(!p.accepts_version(3));
        assert!(p.accepts_version(4));
    }

    #[test]
    fn soft_delete_flips_status_and_bumps_version() {
        let now = Utc::now();
        let mut p = sample(now, now, 1);
        p.soft_delete(now);
        assert_eq!(p.status, ProductStatus::Deleted);
        assert!(!p.is_visible);
        assert_eq!(p.version, 2);
    }
}
