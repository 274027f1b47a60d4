//! Localized text triples
//!
//! Every multilingual field in the product entity (spec §3.1) is stored
//! as a `{primary, secondary, display}` triple. `display` is the value
//! actually shown to the consumer UI and is computed by
//! [`LocalizedText::resolve`] during field mapping, not here — this type
//! only carries the already-resolved triple.

use serde::{Deserialize, Serialize};

/// A localized text value with a primary language, a secondary
/// (fallback) language, and a precomputed display value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    /// Value in the record's primary language.
    pub primary: String,
    /// Value in a secondary language, if the upstream record carries one.
    pub secondary: String,
    /// The value actually shown to the consumer UI; never empty once
    /// mapping succeeds for a required path.
    pub display: String,
}

impl LocalizedText {
    /// Builds a triple directly from already-resolved parts.
    #[must_use]
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
            display: display.into(),
        }
    }

    /// Resolves `display` from the mapping's precedence order (spec §4.1):
    /// prefer an explicit English value, then the primary-language value,
    /// then the mapping row's configured default.
    #[must_use]
    pub fn resolve(primary: &str, english: Option<&str>, default: &str) -> Self {
        let display = english
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
            .or_else(|| {
                if primary.trim().is_empty() {
                    None
                } else {
                    Some(primary.to_string())
                }
            })
            .unwrap_or_else(|| default.to_string());

        Self {
            primary: primary.to_string(),
            secondary: english.unwrap_or_default().to_string(),
            display,
        }
    }

    /// True when every field is empty (used to detect a missing optional
    /// localized path so mapping can fall back to a default instead).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty() && self.display.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_english_value() {
        let t = LocalizedText::resolve("苹果", Some("Apple"), "unknown");
        assert_eq!(t.display, "Apple");
        assert_eq!(t.primary, "苹果");
    }

    #[test]
    fn resolve_falls_back_to_primary() {
        let t = LocalizedText::resolve("苹果", None, "unknown");
        assert_eq!(t.display, "苹果");
    }

    #[test]
    fn resolve_falls_back_to_default() {
        let t = LocalizedText::resolve("", None, "unknown");
        assert_eq!(t.display, "unknown");
    }
}
