//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for identifiers and values that must hold an
//! invariant for their whole lifetime. Each newtype validates at
//! construction so downstream code never re-checks it.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// ProductId
// ============================================================================

/// Upstream-assigned stable identifier for a product record.
///
/// Identity is immutable once a product exists (spec §3.1): the id is
/// never regenerated or recomputed, only validated on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Validates and wraps a raw upstream record id.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidProductId` if `raw` is empty or
    /// contains whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(DomainError::InvalidProductId(
                "product id must not be empty".to_string(),
            ));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidProductId(raw));
        }
        Ok(Self(raw))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProductId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProductId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// ============================================================================
// ImageId / SyncRunId — random UUIDs
// ============================================================================

/// Unique identifier for a persisted [`crate::domain::image::Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(Uuid);

impl ImageId {
    /// Creates a new random image id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ImageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ImageId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidImageId(format!("{e}")))
    }
}

/// Identifier for a [`crate::domain::sync_run::SyncRun`].
///
/// Format is timestamp-prefixed so ids sort chronologically (spec §3.2):
/// `S<epoch_millis>-<short random>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SyncRunId(String);

impl SyncRunId {
    /// Builds a new id from an epoch-millisecond timestamp and a random suffix.
    #[must_use]
    pub fn generate(epoch_millis: i64) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("S{epoch_millis}-{}", &suffix[..8]))
    }

    /// Validates and wraps a raw id (e.g. parsed from a URL path segment).
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSyncRunId` if `raw` is empty.
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(DomainError::InvalidSyncRunId(raw));
        }
        Ok(Self(raw))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SyncRunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SyncRunId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// ContentDigest
// ============================================================================

/// Stable hash over a normalized product, excluding volatile fields
/// (`syncTime`, `version`, `images`). Drives incremental-sync skipping
/// (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Wraps a precomputed hex digest.
    #[must_use]
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Returns the hex-encoded digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Barcode
// ============================================================================

/// Validated barcode matching `^[0-9]{8,13}$` (spec §3.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Barcode(String);

impl Barcode {
    /// Validates and wraps a raw barcode string.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidBarcode` if `raw` is not 8-13 ASCII digits.
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        let len = raw.len();
        if !(8..=13).contains(&len) || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::InvalidBarcode(raw));
        }
        Ok(Self(raw))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Barcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Link
// ============================================================================

/// An absolute `http(s)://` URL (spec §3.1 `link` field).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Link(String);

impl Link {
    /// Validates and wraps a raw URL string.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidLink` if `raw` does not start with
    /// `http://` or `https://`.
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(DomainError::InvalidLink(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Link {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_id_rejects_blank() {
        assert!(ProductId::new("").is_err());
        assert!(ProductId::new("   ").is_err());
        assert!(ProductId::new("rec123").is_ok());
    }

    #[test]
    fn product_id_rejects_whitespace() {
        assert!(ProductId::new("rec 123").is_err());
    }

    #[test]
    fn sync_run_id_sorts_chronologically() {
        let a = SyncRunId::generate(1_000);
        let b = SyncRunId::generate(2_000);
        assert!(a.as_str() < b.as_str());
    }

    #[test]
    fn barcode_validates_length_and_digits() {
        assert!(Barcode::new("1234567").is_err()); // 7 digits, too short
        assert!(Barcode::new("12345678").is_ok()); // 8 digits
        assert!(Barcode::new("1234567890123").is_ok()); // 13 digits
        assert!(Barcode::new("12345678901234").is_err()); // 14 digits
        assert!(Barcode::new("1234567a").is_err());
    }

    #[test]
    fn link_requires_http_scheme() {
        assert!(Link::new("ftp://example.com").is_err());
        assert!(Link::new("https://example.com/p").is_ok());
        assert!(Link::new("http://example.com/p").is_ok());
    }
}
