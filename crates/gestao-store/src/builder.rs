// gestao-store/src/builder.rs
// ============================================================================
// Module: Statement Builder
// Description: Pure construction of parameterized SQL for drifting tables.
// Purpose: Touch only the columns that exist in the live schema.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every builder takes an [`EntityDescriptor`], a [`LiveSchema`], and the
//! caller's key-value input, and returns the statement plus its bound
//! parameters. Nothing here performs I/O; the executor decides how and when
//! the statement runs.
//!
//! Write builders bind exactly `keys(record) ∩ live_schema` and report the
//! rest in a [`SkipReport`]. Updates narrow that further: the primary key is
//! never reassigned and a JSON `null` means "not provided", so both are
//! reported as skipped. Select filters outside the live schema are
//! ignored instead of rejected.
//!
//! Identifiers interpolated into SQL come only from the live schema or the
//! validated descriptor and are always double-quoted; values are always bound.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::Record;
use crate::descriptor::EntityDescriptor;
use crate::descriptor::FieldEncoding;
use crate::error::StoreError;
use crate::schema::LiveSchema;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    /// SQL `NULL`.
    Null,
    /// 64-bit integer (booleans bind as `0` / `1`).
    Integer(i64),
    /// Floating point number.
    Real(f64),
    /// Text, including JSON-encoded fields.
    Text(String),
}

/// A parameterized statement ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with numbered placeholders.
    pub sql: String,
    /// Values bound to the placeholders, in order.
    pub params: Vec<BindValue>,
    /// Record fields bound into the statement (excludes key parameters).
    pub bound_fields: Vec<String>,
}

/// Diagnostic report of fields dropped by a write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipReport {
    /// Number of fields in the write request.
    pub requested_field_count: usize,
    /// Number of fields persisted.
    pub persisted_field_count: usize,
    /// Requested fields absent from the live schema.
    pub skipped_field_names: BTreeSet<String>,
}

impl SkipReport {
    /// Returns true when at least one field was skipped.
    #[must_use]
    pub fn has_skips(&self) -> bool {
        !self.skipped_field_names.is_empty()
    }
}

/// Result of [`build_update`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePlan {
    /// Execute the statement.
    Execute {
        /// Update statement; the key is the last parameter.
        statement: Statement,
        /// Skip accounting for the request.
        skip_report: SkipReport,
    },
    /// Nothing to update: no requested field exists on the table.
    Noop {
        /// Skip accounting for the request.
        skip_report: SkipReport,
    },
}

impl UpdatePlan {
    /// Returns the skip report for either outcome.
    #[must_use]
    pub const fn skip_report(&self) -> &SkipReport {
        match self {
            Self::Execute {
                skip_report, ..
            }
            | Self::Noop {
                skip_report,
            } => skip_report,
        }
    }
}

/// Result of [`build_select`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// Select statement; parameters are the applied filter values.
    pub statement: Statement,
    /// Projected columns in result order.
    pub field_order: Vec<String>,
    /// Filter keys ignored because the table lacks them.
    pub ignored_filters: Vec<String>,
}

// ============================================================================
// SECTION: Write Builders
// ============================================================================

/// Builds an `INSERT` touching only fields present in `live`.
///
/// # Errors
///
/// Returns [`StoreError::NoPersistableFields`] when no requested field exists
/// in `live` (including an empty schema).
pub fn build_insert(
    descriptor: &EntityDescriptor,
    live: &LiveSchema,
    record: &Record,
) -> Result<(Statement, SkipReport), StoreError> {
    let (persisted, skip_report) = partition(record, |name, _| live.contains(name));
    if persisted.is_empty() {
        return Err(StoreError::NoPersistableFields {
            entity: descriptor.name().to_string(),
            requested: record.keys().cloned().collect(),
        });
    }
    let columns: Vec<String> = persisted.iter().map(|(name, _)| quote_identifier(name)).collect();
    let placeholders: Vec<String> = (1 ..= persisted.len()).map(|index| format!("?{index}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(descriptor.table()),
        columns.join(", "),
        placeholders.join(", ")
    );
    let params = persisted.iter().map(|(name, value)| bind_field(descriptor, name, value)).collect();
    let bound_fields = persisted.iter().map(|(name, _)| (*name).to_string()).collect();
    Ok((
        Statement {
            sql,
            params,
            bound_fields,
        },
        skip_report,
    ))
}

/// Builds an `UPDATE ... WHERE pk = key` touching only fields present in `live`.
///
/// Only assignable fields are bound (see [`is_assignable`]); the primary key
/// and null values land in the skip report.
///
/// The caller must verify that `key` resolves to exactly one row before
/// executing the plan (see [`build_count_by_key`]).
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for a key that is not an integer or a
/// non-empty string, and [`StoreError::MissingColumn`] when there is
/// something to update but the primary key column is absent.
pub fn build_update(
    descriptor: &EntityDescriptor,
    live: &LiveSchema,
    key: &Value,
    record: &Record,
) -> Result<UpdatePlan, StoreError> {
    let key = bind_key(key)?;
    let (persisted, skip_report) =
        partition(record, |name, value| is_assignable(descriptor, live, name, value));
    if persisted.is_empty() {
        return Ok(UpdatePlan::Noop {
            skip_report,
        });
    }
    ensure_primary_key(descriptor, live)?;
    let assignments: Vec<String> = persisted
        .iter()
        .enumerate()
        .map(|(index, (name, _))| format!("{} = ?{}", quote_identifier(name), index + 1))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        quote_identifier(descriptor.table()),
        assignments.join(", "),
        quote_identifier(descriptor.primary_key()),
        persisted.len() + 1
    );
    let mut params: Vec<BindValue> =
        persisted.iter().map(|(name, value)| bind_field(descriptor, name, value)).collect();
    params.push(key);
    let bound_fields = persisted.iter().map(|(name, _)| (*name).to_string()).collect();
    Ok(UpdatePlan::Execute {
        statement: Statement {
            sql,
            params,
            bound_fields,
        },
        skip_report,
    })
}

// ============================================================================
// SECTION: Read Builders
// ============================================================================

/// Builds a `SELECT` projecting the descriptor's expected columns that exist.
///
/// Filter keys absent from `live` are ignored and listed in
/// [`SelectStatement::ignored_filters`]. A `null` filter value matches
/// `IS NULL`.
///
/// # Errors
///
/// Returns [`StoreError::UnknownTable`] when `live` is empty.
pub fn build_select(
    descriptor: &EntityDescriptor,
    live: &LiveSchema,
    filters: &Record,
) -> Result<SelectStatement, StoreError> {
    if live.is_empty() {
        return Err(StoreError::UnknownTable(descriptor.table().to_string()));
    }
    let mut field_order: Vec<String> =
        live.intersect(descriptor.expected_columns()).into_iter().map(str::to_string).collect();
    if field_order.is_empty() {
        field_order = live.columns().iter().cloned().collect();
    }
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    let mut bound_fields = Vec::new();
    let mut ignored_filters = Vec::new();
    for (name, value) in filters {
        if !live.contains(name) {
            ignored_filters.push(name.clone());
            continue;
        }
        if value.is_null() {
            clauses.push(format!("{} IS NULL", quote_identifier(name)));
        } else {
            params.push(bind_field(descriptor, name, value));
            clauses.push(format!("{} = ?{}", quote_identifier(name), params.len()));
        }
        bound_fields.push(name.clone());
    }
    let projection: Vec<String> = field_order.iter().map(|column| quote_identifier(column)).collect();
    let mut sql = format!(
        "SELECT {} FROM {}",
        projection.join(", "),
        quote_identifier(descriptor.table())
    );
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    let order = descriptor
        .order_by()
        .filter(|column| live.contains(column))
        .or_else(|| Some(descriptor.primary_key()).filter(|column| live.contains(column)));
    if let Some(column) = order {
        sql.push_str(" ORDER BY ");
        sql.push_str(&quote_identifier(column));
    }
    Ok(SelectStatement {
        statement: Statement {
            sql,
            params,
            bound_fields,
        },
        field_order,
        ignored_filters,
    })
}

/// Builds a `SELECT` for the single row identified by `key`.
///
/// # Errors
///
/// Returns [`StoreError::UnknownTable`] for an empty schema,
/// [`StoreError::MissingColumn`] when the primary key column is absent, and
/// [`StoreError::Invalid`] for an unusable key.
pub fn build_select_by_key(
    descriptor: &EntityDescriptor,
    live: &LiveSchema,
    key: &Value,
) -> Result<SelectStatement, StoreError> {
    if live.is_empty() {
        return Err(StoreError::UnknownTable(descriptor.table().to_string()));
    }
    ensure_primary_key(descriptor, live)?;
    bind_key(key)?;
    let mut filters = Record::new();
    filters.insert(descriptor.primary_key().to_string(), key.clone());
    build_select(descriptor, live, &filters)
}

/// Builds `SELECT COUNT(*) ... WHERE pk = key`, used to verify that an
/// update or delete target resolves to exactly one row.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for an unusable key.
pub fn build_count_by_key(descriptor: &EntityDescriptor, key: &Value) -> Result<Statement, StoreError> {
    let key = bind_key(key)?;
    Ok(Statement {
        sql: format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            quote_identifier(descriptor.table()),
            quote_identifier(descriptor.primary_key())
        ),
        params: vec![key],
        bound_fields: Vec::new(),
    })
}

/// Builds `DELETE ... WHERE pk = key`.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for an unusable key.
pub fn build_delete(descriptor: &EntityDescriptor, key: &Value) -> Result<Statement, StoreError> {
    let key = bind_key(key)?;
    Ok(Statement {
        sql: format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_identifier(descriptor.table()),
            quote_identifier(descriptor.primary_key())
        ),
        params: vec![key],
        bound_fields: Vec::new(),
    })
}

/// Builds `SELECT COUNT(*)`, optionally restricted to `column = value`.
#[must_use]
pub fn build_count(descriptor: &EntityDescriptor, filter: Option<(&str, BindValue)>) -> Statement {
    let table = quote_identifier(descriptor.table());
    match filter {
        Some((column, value)) => Statement {
            sql: format!("SELECT COUNT(*) FROM {table} WHERE {} = ?1", quote_identifier(column)),
            params: vec![value],
            bound_fields: vec![column.to_string()],
        },
        None => Statement {
            sql: format!("SELECT COUNT(*) FROM {table}"),
            params: Vec::new(),
            bound_fields: Vec::new(),
        },
    }
}

/// Builds a grouped count over the non-null values of `column`, largest
/// groups first.
#[must_use]
pub fn build_group_count(descriptor: &EntityDescriptor, column: &str) -> Statement {
    let column = quote_identifier(column);
    Statement {
        sql: format!(
            "SELECT {column}, COUNT(*) FROM {} WHERE {column} IS NOT NULL GROUP BY {column} \
             ORDER BY COUNT(*) DESC, {column}",
            quote_identifier(descriptor.table())
        ),
        params: Vec::new(),
        bound_fields: Vec::new(),
    }
}

// ============================================================================
// SECTION: Binding
// ============================================================================

/// Converts a record value into a bind value using the field's encoding.
#[must_use]
pub fn bind_field(descriptor: &EntityDescriptor, name: &str, value: &Value) -> BindValue {
    match descriptor.encoding_of(name) {
        FieldEncoding::Json(_) if !value.is_null() => BindValue::Text(value.to_string()),
        FieldEncoding::Json(_) | FieldEncoding::Plain => bind_scalar(value),
    }
}

/// Converts a JSON value into its natural `SQLite` representation.
fn bind_scalar(value: &Value) -> BindValue {
    match value {
        Value::Null => BindValue::Null,
        Value::Bool(flag) => BindValue::Integer(i64::from(*flag)),
        Value::Number(number) => number.as_i64().map_or_else(
            || number.as_f64().map_or(BindValue::Null, BindValue::Real),
            BindValue::Integer,
        ),
        Value::String(text) => BindValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => BindValue::Text(value.to_string()),
    }
}

/// Converts a primary key value into a bind value.
fn bind_key(key: &Value) -> Result<BindValue, StoreError> {
    match key {
        Value::Number(number) => number
            .as_i64()
            .map(BindValue::Integer)
            .ok_or_else(|| StoreError::Invalid("key must be an integer".to_string())),
        Value::String(text) if !text.trim().is_empty() => Ok(BindValue::Text(text.clone())),
        _ => Err(StoreError::Invalid("key must be an integer or non-empty string".to_string())),
    }
}

// ============================================================================
// SECTION: Skip Accounting
// ============================================================================

/// Returns true when an update may assign `value` to column `name`.
///
/// The column must be live and must not be the primary key, and the value
/// must not be `null`.
#[must_use]
pub fn is_assignable(descriptor: &EntityDescriptor, live: &LiveSchema, name: &str, value: &Value) -> bool {
    name != descriptor.primary_key() && !value.is_null() && live.contains(name)
}

/// Computes the skip report [`build_insert`] would return for `record`.
#[must_use]
pub fn insert_skip_report(live: &LiveSchema, record: &Record) -> SkipReport {
    partition(record, |name, _| live.contains(name)).1
}

/// Computes the skip report [`build_update`] would return for `record`.
#[must_use]
pub fn update_skip_report(descriptor: &EntityDescriptor, live: &LiveSchema, record: &Record) -> SkipReport {
    partition(record, |name, value| is_assignable(descriptor, live, name, value)).1
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Splits `record` into the fields `keep` accepts and the skip report.
fn partition<'a, F>(record: &'a Record, keep: F) -> (Vec<(&'a str, &'a Value)>, SkipReport)
where
    F: Fn(&str, &Value) -> bool,
{
    let mut persisted = Vec::new();
    let mut skipped = BTreeSet::new();
    for (name, value) in record {
        if keep(name, value) {
            persisted.push((name.as_str(), value));
        } else {
            skipped.insert(name.clone());
        }
    }
    let report = SkipReport {
        requested_field_count: record.len(),
        persisted_field_count: persisted.len(),
        skipped_field_names: skipped,
    };
    (persisted, report)
}

/// Fails when the primary key column is absent from `live`.
fn ensure_primary_key(descriptor: &EntityDescriptor, live: &LiveSchema) -> Result<(), StoreError> {
    if live.contains(descriptor.primary_key()) {
        Ok(())
    } else {
        Err(StoreError::MissingColumn {
            table: descriptor.table().to_string(),
            column: descriptor.primary_key().to_string(),
        })
    }
}

/// Double-quotes an identifier, escaping embedded quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
