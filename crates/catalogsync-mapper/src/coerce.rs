//! Coercion and validation functions referenced by the mapping table
//! (spec §4.1 "Coercion rules").

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

fn text_of(v: &Value) -> Option<&str> {
    match v {
        Value::String(s) => Some(s.as_str()),
        Value::Object(m) => m.get("text").and_then(Value::as_str),
        _ => None,
    }
}

/// `text`: trim, unwrap `{text: ...}` wrappers, null becomes `""`.
pub fn coerce_text(v: &Value) -> Result<Value, String> {
    match v {
        Value::Null => Ok(Value::String(String::new())),
        other => Ok(Value::String(text_of(other).unwrap_or_default().trim().to_string())),
    }
}

/// `number`: round to 2 decimals; NaN and unparsable values fall back to
/// `0` (tolerant mode — spec §4.1, this mapping table is never used for
/// the strict-mode fields the spec carves out).
pub fn coerce_number(v: &Value) -> Result<Value, String> {
    let raw = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let f = raw.filter(|f| f.is_finite()).unwrap_or(0.0);
    Ok(Value::from(((f * 100.0).round()) / 100.0))
}

fn first_option_text(items: &[Value]) -> String {
    items
        .iter()
        .find_map(text_of)
        .unwrap_or_default()
        .to_string()
}

/// `singleSelect`: flattens an array of `{text}`/string options to the
/// first value.
pub fn coerce_single_select(v: &Value) -> Result<Value, String> {
    match v {
        Value::Array(items) => Ok(Value::String(first_option_text(items))),
        Value::Null => Ok(Value::String(String::new())),
        other => Ok(Value::String(text_of(other).unwrap_or_default().to_string())),
    }
}

/// `multiSelect`: flattens to a comma-joined list, preserving order.
pub fn coerce_multi_select(v: &Value) -> Result<Value, String> {
    match v {
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(text_of).map(str::to_string).collect();
            Ok(Value::String(parts.join(",")))
        }
        Value::Null => Ok(Value::String(String::new())),
        other => Ok(Value::String(text_of(other).unwrap_or_default().to_string())),
    }
}

/// `attachment`: extracts the first item's file token, preserving order
/// for fields with multiple attachments (only the first slot is used by
/// any single mapping row; multi-attachment fields map one row per
/// slot).
pub fn coerce_attachment(v: &Value) -> Result<Value, String> {
    match v {
        Value::Array(items) => items
            .first()
            .and_then(|item| match item {
                Value::Object(m) => m
                    .get("token")
                    .or_else(|| m.get("file_token"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                Value::String(s) => Some(s.clone()),
                _ => None,
            })
            .map(Value::String)
            .ok_or_else(|| "attachment field has no usable token".to_string()),
        Value::String(s) if !s.is_empty() => Ok(Value::String(s.clone())),
        _ => Err("attachment field is empty".to_string()),
    }
}

/// `timestamp`: accepts epoch-ms or an ISO-8601 string; normalizes to
/// RFC 3339 UTC. Falls back to `now()` only via the mapping row's
/// `default`, never here.
pub fn coerce_timestamp(v: &Value) -> Result<Value, String> {
    match v {
        Value::Number(n) => {
            let ms = n.as_i64().ok_or_else(|| "timestamp is not an integer".to_string())?;
            epoch_ms_to_rfc3339(ms)
        }
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                Ok(Value::String(dt.with_timezone(&Utc).to_rfc3339()))
            } else if let Ok(ms) = s.trim().parse::<i64>() {
                epoch_ms_to_rfc3339(ms)
            } else {
                Err(format!("unparseable timestamp: {s}"))
            }
        }
        _ => Err("unsupported timestamp shape".to_string()),
    }
}

fn epoch_ms_to_rfc3339(ms: i64) -> Result<Value, String> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| Value::String(dt.to_rfc3339()))
        .ok_or_else(|| format!("timestamp out of range: {ms}"))
}

/// `link`: trims; validation (non-`http(s)://` rejection) is a separate
/// `ValidateFn` so blank optional links can stay unvalidated.
pub fn coerce_link(v: &Value) -> Result<Value, String> {
    match v {
        Value::Null => Ok(Value::String(String::new())),
        other => Ok(Value::String(text_of(other).unwrap_or_default().trim().to_string())),
    }
}

/// Rejects non-blank values that aren't `http://` or `https://`.
pub fn validate_link(v: &Value) -> Result<(), String> {
    let s = v.as_str().unwrap_or_default();
    if s.is_empty() || s.starts_with("http://") || s.starts_with("https://") {
        Ok(())
    } else {
        Err(format!("link must be http(s)://, got: {s}"))
    }
}
