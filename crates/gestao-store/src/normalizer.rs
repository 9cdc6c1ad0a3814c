// gestao-store/src/normalizer.rs
// ============================================================================
// Module: Record Normalizer
// Description: Post-processing of raw rows into caller-facing records.
// Purpose: Backfill defaults and decode JSON fields without ever failing.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`normalize`] is total: for any raw row it returns a record containing
//! every known field of the descriptor with a non-null value. Problems are
//! reported as [`DecodeDegradedWarning`] values alongside the record instead
//! of being raised.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::Record;
use crate::descriptor::EntityDescriptor;
use crate::descriptor::FieldEncoding;
use crate::descriptor::FieldSpec;
use crate::descriptor::JsonShape;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Non-fatal notice that a JSON field was replaced by its empty shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeDegradedWarning {
    /// Logical entity name.
    pub entity: String,
    /// Field that failed to decode.
    pub field: String,
    /// Short reason, without the offending value.
    pub reason: String,
}

/// A normalized record plus the degradations encountered building it.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    /// Caller-facing record.
    pub record: Record,
    /// Decode degradations, in field declaration order.
    pub warnings: Vec<DecodeDegradedWarning>,
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Normalizes a raw row read from storage.
///
/// # Invariants
/// - Every known field of `descriptor` is present and non-null in the output.
/// - Columns the descriptor does not declare pass through untouched.
#[must_use]
pub fn normalize(descriptor: &EntityDescriptor, raw_row: Record) -> NormalizedRecord {
    let mut record = raw_row;
    let mut warnings = Vec::new();
    for field in descriptor.known_fields() {
        let raw = record.remove(field.name()).filter(|value| !value.is_null());
        let value = match (raw, field.encoding()) {
            (None, _) => field.default_value().clone(),
            (Some(value), FieldEncoding::Json(shape)) => {
                decode_json(field, shape, value).unwrap_or_else(|reason| {
                    warnings.push(DecodeDegradedWarning {
                        entity: descriptor.name().to_string(),
                        field: field.name().to_string(),
                        reason: reason.to_string(),
                    });
                    shape.empty()
                })
            }
            (Some(value), FieldEncoding::Plain) => coerce_plain(field, value),
        };
        record.insert(field.name().to_string(), value);
    }
    NormalizedRecord {
        record,
        warnings,
    }
}

/// Decodes a stored JSON field, returning a static reason on failure.
fn decode_json(field: &FieldSpec, shape: JsonShape, value: Value) -> Result<Value, &'static str> {
    match value {
        Value::String(text) if text.trim().is_empty() => Ok(field.default_value().clone()),
        Value::String(text) => {
            let decoded: Value = serde_json::from_str(&text).map_err(|_| "invalid json text")?;
            if decoded.is_null() {
                Ok(field.default_value().clone())
            } else if shape.matches(&decoded) {
                Ok(decoded)
            } else {
                Err("decoded json has the wrong shape")
            }
        }
        structured if shape.matches(&structured) => Ok(structured),
        _ => Err("stored value is not json text"),
    }
}

/// Coerces `SQLite` integer booleans back to JSON booleans.
fn coerce_plain(field: &FieldSpec, value: Value) -> Value {
    if !field.default_value().is_boolean() {
        return value;
    }
    match value.as_i64() {
        Some(0) => Value::Bool(false),
        Some(1) => Value::Bool(true),
        _ => value,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::panic,
        reason = "Test assertions use unwrap/panic for clarity."
    )]

    use serde_json::Value;
    use serde_json::json;

    use super::normalize;
    use crate::Record;
    use crate::descriptor::EntityDescriptor;
    use crate::descriptor::FieldSpec;
    use crate::descriptor::JsonShape;

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::builder("teams", "teams")
            .field(FieldSpec::plain("nome", json!("")))
            .field(FieldSpec::plain("ativo", json!(true)))
            .field(FieldSpec::json("endereco", JsonShape::Object))
            .field(FieldSpec::json("competencias", JsonShape::Array))
            .build()
            .unwrap()
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[test]
    fn undecodable_json_degrades_to_empty_shape() {
        let normalized = normalize(&descriptor(), record(json!({"id": 5, "nome": "Y", "endereco": "not-json"})));
        assert_eq!(normalized.record.get("endereco"), Some(&json!({})));
        assert_eq!(normalized.record.get("id"), Some(&json!(5)));
        assert_eq!(normalized.warnings.len(), 1);
        assert_eq!(normalized.warnings[0].field, "endereco");
        assert!(!normalized.warnings[0].reason.contains("not-json"));
    }

    #[test]
    fn empty_row_is_fully_backfilled() {
        let normalized = normalize(&descriptor(), Record::new());
        assert_eq!(
            normalized.record,
            record(json!({"nome": "", "ativo": true, "endereco": {}, "competencias": []}))
        );
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn json_text_and_integer_booleans_decode() {
        let normalized = normalize(
            &descriptor(),
            record(json!({"ativo": 0, "endereco": "{\"rua\":\"A\"}", "competencias": "[\"rust\"]"})),
        );
        assert_eq!(normalized.record.get("ativo"), Some(&json!(false)));
        assert_eq!(normalized.record.get("endereco"), Some(&json!({"rua": "A"})));
        assert_eq!(normalized.record.get("competencias"), Some(&json!(["rust"])));
    }

    #[test]
    fn wrong_shape_is_degraded() {
        let normalized = normalize(&descriptor(), record(json!({"competencias": "{\"a\":1}", "endereco": 3})));
        assert_eq!(normalized.record.get("competencias"), Some(&json!([])));
        assert_eq!(normalized.record.get("endereco"), Some(&json!({})));
        assert_eq!(normalized.warnings.len(), 2);
    }

    #[test]
    fn null_and_blank_values_take_defaults_silently() {
        let normalized = normalize(&descriptor(), record(json!({"nome": null, "endereco": ""})));
        assert_eq!(normalized.record.get("nome"), Some(&json!("")));
        assert_eq!(normalized.record.get("endereco"), Some(&json!({})));
        assert!(normalized.warnings.is_empty());
    }
}
