// gestao-store/src/defaults.rs
// ============================================================================
// Module: Write Defaults
// Description: Insert-time default backfill and timestamp stamping.
// Purpose: Prepare a write record before the statement builder filters it.
// Dependencies: serde_json, time
// ============================================================================

//! ## Overview
//! Both helpers only add fields that exist in the live schema, so the record
//! handed to the builder still satisfies "bound fields ⊆ live schema".
//! Caller-supplied values always win over defaults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::Record;
use crate::builder::is_assignable;
use crate::descriptor::EntityDescriptor;
use crate::error::StoreError;
use crate::schema::LiveSchema;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Kind of write being prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// New row.
    Insert,
    /// Existing row.
    Update,
}

// ============================================================================
// SECTION: Backfill
// ============================================================================

/// Fills absent or null known fields with their declared defaults.
///
/// Only fields present in `live` are added. Returns the names that were
/// filled, in declaration order.
pub fn backfill_insert_defaults(
    descriptor: &EntityDescriptor,
    live: &LiveSchema,
    record: &mut Record,
) -> Vec<String> {
    let mut filled = Vec::new();
    for field in descriptor.known_fields() {
        if field.name() == descriptor.primary_key() || !live.contains(field.name()) {
            continue;
        }
        if record.get(field.name()).is_none_or(Value::is_null) {
            record.insert(field.name().to_string(), field.default_value().clone());
            filled.push(field.name().to_string());
        }
    }
    filled
}

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Stamps the descriptor's timestamp columns that exist in `live`.
///
/// `created_at` is set on insert only and never overrides a caller value;
/// `updated_at` is set on every write. Updates are stamped only when at least
/// one caller field is assignable, so a no-op stays a no-op.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when `now` cannot be formatted as RFC 3339.
pub fn stamp_timestamps(
    descriptor: &EntityDescriptor,
    live: &LiveSchema,
    record: &mut Record,
    now: OffsetDateTime,
    kind: WriteKind,
) -> Result<(), StoreError> {
    let assignable = record.iter().any(|(name, value)| is_assignable(descriptor, live, name, value));
    if kind == WriteKind::Update && !assignable {
        return Ok(());
    }
    let policy = descriptor.timestamps();
    let created = policy.created_at.as_deref().filter(|column| live.contains(column));
    let updated = policy.updated_at.as_deref().filter(|column| live.contains(column));
    if created.is_none() && updated.is_none() {
        return Ok(());
    }
    let stamp = now.format(&Rfc3339).map_err(|err| StoreError::Invalid(err.to_string()))?;
    if kind == WriteKind::Insert
        && let Some(column) = created
        && record.get(column).is_none_or(Value::is_null)
    {
        record.insert(column.to_string(), Value::String(stamp.clone()));
    }
    if let Some(column) = updated {
        record.insert(column.to_string(), Value::String(stamp));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
