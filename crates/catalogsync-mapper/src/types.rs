//! Mapping-table types (spec §4.1).

use serde_json::Value;

use catalogsync_core::domain::Product;

/// Upstream field type tags (spec §4.1 mapping table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Number,
    SingleSelect,
    MultiSelect,
    Link,
    Attachment,
    Lookup,
    Formula,
    Timestamp,
    AutoNumber,
}

/// Coerces one raw field value into its normalized `serde_json::Value`
/// representation. Returns `Err` only for fields that cannot be coerced
/// at all (e.g. an attachment with no usable token); anything tolerable
/// (blank strings, NaN numbers) is coerced to a sensible fallback rather
/// than failing, per spec §4.1's "tolerant mode" coercion rules.
pub type CoerceFn = fn(&Value) -> Result<Value, String>;

/// Validates an already-coerced value, separate from coercion so the
/// same coercion function can be reused with or without a validator
/// (e.g. `link` fields are coerced the same way everywhere but only
/// validated where the target requires a real URL).
pub type ValidateFn = fn(&Value) -> Result<(), String>;

/// One row of the static mapping table.
#[derive(Clone)]
pub struct FieldMapping {
    /// Dotted target path, e.g. `"price.normal"`.
    pub target: &'static str,
    /// Upstream field identifier this row reads from the raw record.
    pub upstream_field: &'static str,
    pub field_type: FieldType,
    /// Whether a missing value is itself noteworthy. Only `productId`
    /// and `name.display` ever escalate a missing required value to a
    /// record-level rejection (spec §4.1 Failure semantics); for every
    /// other row this just changes whether a missing-value warning is
    /// emitted.
    pub required: bool,
    pub coerce: CoerceFn,
    pub validate: Option<ValidateFn>,
    pub default: Option<Value>,
}

/// A non-fatal per-field issue recorded during transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub path: String,
    pub message: String,
}

/// Result of [`crate::FieldMapper::transform`].
#[derive(Debug)]
pub enum TransformOutcome {
    Transformed {
        product: Box<Product>,
        warnings: Vec<Warning>,
    },
    Rejected {
        reasons: Vec<String>,
    },
}
