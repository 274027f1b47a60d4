//! Image domain entity (spec §3.3)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ImageId, ProductId};
use super::product::ImageRole;

/// Image format, determined by magic-byte sniffing rather than filename
/// (spec §4.2 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// File extension used when composing the object-store key (spec §4.2 step 5).
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }
}

/// A successfully persisted binary attachment.
///
/// Uniqueness: `(product_id, role)` maps to at most one current `Image`;
/// superseding versions are retained under their own object key but are
/// no longer referenced by any product (spec §3.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub image_id: ImageId,
    pub product_id: ProductId,
    pub role: ImageRole,
    /// Path in the object store, e.g. `products/<productId>_<role>_<epochMs>.<ext>`.
    pub object_key: String,
    /// Canonical URL matching the documented prefix (spec §6.4).
    pub public_url: String,
    pub content_hash: String,
    pub byte_size: u64,
    pub format: ImageFormat,
    pub uploaded_at: DateTime<Utc>,
}
