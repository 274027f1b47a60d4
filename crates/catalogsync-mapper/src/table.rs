//! The static mapping table (spec §4.1).
//!
//! Field ids below (`"fld_*"`) are the upstream multi-dimensional
//! table's column identifiers. They are an assumed concrete schema —
//! spec §6.2 only constrains the upstream client's contract, not its
//! field naming — chosen to read clearly in tests and logs.

use serde_json::Value;

use crate::coerce::{
    coerce_attachment, coerce_link, coerce_number, coerce_text, coerce_timestamp, validate_link,
};
use crate::types::{FieldMapping, FieldType};

/// A localized-triple field: two raw upstream fields (primary-language,
/// English) resolved into a `LocalizedText` via
/// `LocalizedText::resolve` (spec §4.1 "Localization").
pub struct LocalizedFieldSpec {
    pub target: &'static str,
    pub primary_field: &'static str,
    pub english_field: &'static str,
    pub default: &'static str,
}

/// Every localized-triple path named in spec §3.1.
pub const LOCALIZED_FIELDS: &[LocalizedFieldSpec] = &[
    LocalizedFieldSpec { target: "name", primary_field: "fld_name_primary", english_field: "fld_name_en", default: "" },
    LocalizedFieldSpec { target: "category.primary", primary_field: "fld_category_primary", english_field: "fld_category_primary_en", default: "" },
    LocalizedFieldSpec { target: "category.secondary", primary_field: "fld_category_secondary", english_field: "fld_category_secondary_en", default: "" },
    LocalizedFieldSpec { target: "origin.country", primary_field: "fld_origin_country", english_field: "fld_origin_country_en", default: "" },
    LocalizedFieldSpec { target: "origin.province", primary_field: "fld_origin_province", english_field: "fld_origin_province_en", default: "" },
    LocalizedFieldSpec { target: "origin.city", primary_field: "fld_origin_city", english_field: "fld_origin_city_en", default: "" },
    LocalizedFieldSpec { target: "platform", primary_field: "fld_platform", english_field: "fld_platform_en", default: "" },
    LocalizedFieldSpec { target: "specification", primary_field: "fld_specification", english_field: "fld_specification_en", default: "" },
    LocalizedFieldSpec { target: "flavor", primary_field: "fld_flavor", english_field: "fld_flavor_en", default: "" },
    LocalizedFieldSpec { target: "manufacturer", primary_field: "fld_manufacturer", english_field: "fld_manufacturer_en", default: "" },
];

/// The static mapping table for scalar (non-localized-triple) fields:
/// built once and reused for every record.
#[must_use]
pub fn scalar_mappings() -> Vec<FieldMapping> {
    vec![
        FieldMapping {
            target: "productId",
            upstream_field: "fld_product_id",
            field_type: FieldType::Text,
            required: true,
            coerce: coerce_text,
            validate: None,
            default: None,
        },
        FieldMapping {
            target: "internalId",
            upstream_field: "fld_internal_id",
            field_type: FieldType::Text,
            required: false,
            coerce: coerce_text,
            validate: None,
            default: Some(Value::String(String::new())),
        },
        FieldMapping {
            target: "sequence",
            upstream_field: "fld_sequence",
            field_type: FieldType::AutoNumber,
            required: false,
            coerce: coerce_text,
            validate: None,
            default: Some(Value::String(String::new())),
        },
        FieldMapping {
            target: "price.normal",
            upstream_field: "fld_price_normal",
            field_type: FieldType::Number,
            required: false,
            coerce: coerce_number,
            validate: None,
            default: None,
        },
        FieldMapping {
            target: "price.discount",
            upstream_field: "fld_price_discount",
            field_type: FieldType::Number,
            required: false,
            coerce: coerce_number,
            validate: None,
            default: None,
        },
        FieldMapping {
            target: "price.usd",
            upstream_field: "fld_price_usd",
            field_type: FieldType::Number,
            required: false,
            coerce: coerce_number,
            validate: None,
            default: None,
        },
        FieldMapping {
            target: "price.specialUsd",
            upstream_field: "fld_price_special_usd",
            field_type: FieldType::Number,
            required: false,
            coerce: coerce_number,
            validate: None,
            default: None,
        },
        FieldMapping {
            target: "barcode",
            upstream_field: "fld_barcode",
            field_type: FieldType::Text,
            required: false,
            coerce: coerce_text,
            validate: None,
            default: Some(Value::String(String::new())),
        },
        FieldMapping {
            target: "link",
            upstream_field: "fld_link",
            field_type: FieldType::Link,
            required: false,
            coerce: coerce_link,
            validate: Some(validate_link),
            default: Some(Value::String(String::new())),
        },
        FieldMapping {
            target: "collectTime",
            upstream_field: "fld_collect_time",
            field_type: FieldType::Timestamp,
            required: true,
            coerce: coerce_timestamp,
            validate: None,
            default: None,
        },
    ]
}

/// Mapping rows for the five image-attachment slots, sharing the same
/// coercion and failure semantics (spec §4.1 attachment rule, §3.1
/// `images`). Targets are spelled out rather than derived from
/// `IMAGE_ATTACHMENT_FIELDS` so each stays a `'static str`.
#[must_use]
pub fn image_mappings() -> Vec<FieldMapping> {
    vec![
        FieldMapping {
            target: "images.front",
            upstream_field: "fld_image_front",
            field_type: FieldType::Attachment,
            required: false,
            coerce: coerce_attachment,
            validate: None,
            default: None,
        },
        FieldMapping {
            target: "images.back",
            upstream_field: "fld_image_back",
            field_type: FieldType::Attachment,
            required: false,
            coerce: coerce_attachment,
            validate: None,
            default: None,
        },
        FieldMapping {
            target: "images.label",
            upstream_field: "fld_image_label",
            field_type: FieldType::Attachment,
            required: false,
            coerce: coerce_attachment,
            validate: None,
            default: None,
        },
        FieldMapping {
            target: "images.package",
            upstream_field: "fld_image_package",
            field_type: FieldType::Attachment,
            required: false,
            coerce: coerce_attachment,
            validate: None,
            default: None,
        },
        FieldMapping {
            target: "images.gift",
            upstream_field: "fld_image_gift",
            field_type: FieldType::Attachment,
            required: false,
            coerce: coerce_attachment,
            validate: None,
            default: None,
        },
    ]
}
