//! contentDigest computation (spec §4.3)
//!
//! A stable hash over the normalized entity excluding `syncTime`,
//! `version`, and image object keys, so image-only changes are treated
//! separately from content changes.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::{ContentDigest, Product};

/// The subset of `Product` that participates in the content digest.
/// Mirrors every field except `sync_time`, `version`, and `images`.
#[derive(Serialize)]
struct DigestView<'a> {
    product_id: &'a str,
    internal_id: &'a Option<String>,
    sequence: &'a Option<String>,
    name: &'a crate::domain::LocalizedText,
    category: &'a crate::domain::Category,
    price: &'a crate::domain::Price,
    origin: &'a crate::domain::Origin,
    platform: &'a crate::domain::LocalizedText,
    specification: &'a crate::domain::LocalizedText,
    flavor: &'a crate::domain::LocalizedText,
    manufacturer: &'a crate::domain::LocalizedText,
    barcode: &'a Option<crate::domain::Barcode>,
    link: &'a Option<crate::domain::Link>,
    collect_time: chrono::DateTime<chrono::Utc>,
    status: crate::domain::ProductStatus,
    is_visible: bool,
}

/// Computes the `contentDigest` for `product` (spec §4.3).
///
/// Deterministic: identical products produce byte-identical digests,
/// because the view is serialized via `serde_json`'s canonical field
/// ordering (struct field declaration order) rather than a HashMap.
#[must_use]
pub fn content_digest(product: &Product) -> ContentDigest {
    let view = DigestView {
        product_id: product.product_id.as_str(),
        internal_id: &product.internal_id,
        sequence: &product.sequence,
        name: &product.name,
        category: &product.category,
        price: &product.price,
        origin: &product.origin,
        platform: &product.platform,
        specification: &product.specification,
        flavor: &product.flavor,
        manufacturer: &product.manufacturer,
        barcode: &product.barcode,
        link: &product.link,
        collect_time: product.collect_time,
        status: product.status,
        is_visible: product.is_visible,
    };

    let bytes = serde_json::to_vec(&view).expect("DigestView serialization is infallible");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    ContentDigest::from_hex(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, ImageRole, Origin, Price, ProductId, ProductStatus};
    use crate::domain::product::ImageRef;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn sample() -> Product {
        Product {
            product_id: ProductId::new("rec1").unwrap(),
            internal_id: None,
            sequence: None,
            name: crate::domain::LocalizedText::new("苹果", "Apple", "Apple"),
            category: Category::default(),
            price: Price::default(),
            images: BTreeMap::new(),
            origin: Origin::default(),
            platform: Default::default(),
            specification: Default::default(),
            flavor: Default::default(),
            manufacturer: Default::default(),
            barcode: None,
            link: None,
            collect_time: Utc::now(),
            sync_time: Utc::now(),
            version: 1,
            status: ProductStatus::Active,
            is_visible: true,
        }
    }

    #[test]
    fn digest_is_deterministic() {
        let p = sample();
        assert_eq!(content_digest(&p), content_digest(&p));
    }

    #[test]
    fn digest_ignores_sync_time_and_version_and_images() {
        let mut p = sample();
        let d1 = content_digest(&p);

        p.sync_time = p.sync_time + chrono::Duration::days(1);
        p.version += 5;
        p.images.insert(ImageRole::Front, ImageRef::Stored("k".to_string()));
        let d2 = content_digest(&p);

        assert_eq!(d1, d2);
    }

    #[test]
    fn digest_changes_with_name() {
        let mut p = sample();
        let d1 = content_digest(&p);
        p.name.display = "Banana".to_string();
        let d2 = content_digest(&p);
        assert_ne!(d1, d2);
    }
}
