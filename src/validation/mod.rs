//! Entry Validation
//!
//! Checks a proposed payload against its category's required-field schema and
//! basic type rules. Validation is pure; a rejected entry is never recorded.

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

use crate::audit::entry::ACTOR_FIELDS;
use crate::error::{AuditError, AuditResult};
use crate::registry::AuditCategory;

/// Fields never required, even when listed by a category
pub const OPTIONAL_FIELDS: &[&str] = &["metadata", "details", "reason", "approval"];

pub fn is_optional_field(field: &str) -> bool {
    OPTIONAL_FIELDS.contains(&field)
}

fn is_present(payload: &Map<String, Value>, field: &str) -> bool {
    payload.get(field).is_some_and(|v| !v.is_null())
}

/// Required fields absent from the payload, in schema order
pub fn missing_fields(category: &AuditCategory, payload: &Map<String, Value>) -> Vec<String> {
    category
        .fields
        .iter()
        .filter(|field| !is_optional_field(field) && !is_present(payload, field))
        .cloned()
        .collect()
}

fn is_valid_timestamp(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_i64().is_some() || n.as_f64().is_some_and(f64::is_finite),
        Value::String(s) => {
            DateTime::parse_from_rfc3339(s).is_ok()
                || DateTime::parse_from_rfc2822(s).is_ok()
                || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        }
        _ => false,
    }
}

/// Validate a payload for a category
pub fn validate_payload(category: &AuditCategory, payload: &Map<String, Value>) -> AuditResult<()> {
    let missing = missing_fields(category, payload);
    if !missing.is_empty() {
        return Err(AuditError::MissingFields(missing));
    }

    for field in ACTOR_FIELDS {
        if let Some(value) = payload.get(*field).filter(|v| !v.is_null()) {
            if !value.is_string() {
                return Err(AuditError::invalid_field(field, format!("{} must be a string", field)));
            }
        }
    }

    if let Some(value) = payload.get("timestamp").filter(|v| !v.is_null()) {
        if !is_valid_timestamp(value) {
            return Err(AuditError::invalid_field("timestamp", "Invalid timestamp format"));
        }
    }

    Ok(())
}
