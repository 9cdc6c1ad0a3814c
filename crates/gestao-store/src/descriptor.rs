// gestao-store/src/descriptor.rs
// ============================================================================
// Module: Entity Descriptors
// Description: Static field declarations for each logical entity.
// Purpose: Declare fields, defaults, and encodings once per entity.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! An [`EntityDescriptor`] is the single place where an entity's expected
//! shape lives: the table it maps to, its primary key, the known fields with
//! their non-null defaults and encodings, and the passthrough columns that are
//! read when present but never backfilled. Internal code asks the descriptor
//! instead of guessing which fields exist.
//!
//! Descriptors are validated on [`EntityDescriptorBuilder::build`] and are
//! immutable afterwards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Map;
use serde_json::Value;

use crate::error::DescriptorError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum identifier length accepted for tables and columns.
const MAX_IDENTIFIER_LENGTH: usize = 128;
/// Default primary key column name.
const DEFAULT_PRIMARY_KEY: &str = "id";

// ============================================================================
// SECTION: Field Types
// ============================================================================

/// Declared shape of a JSON-encoded field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    /// JSON object (mapping).
    Object,
    /// JSON array (sequence).
    Array,
}

impl JsonShape {
    /// Returns the empty value of this shape.
    #[must_use]
    pub fn empty(self) -> Value {
        match self {
            Self::Object => Value::Object(Map::new()),
            Self::Array => Value::Array(Vec::new()),
        }
    }

    /// Returns true when `value` has this shape.
    #[must_use]
    pub const fn matches(self, value: &Value) -> bool {
        matches!((self, value), (Self::Object, Value::Object(_)) | (Self::Array, Value::Array(_)))
    }
}

/// Storage encoding of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    /// Stored as a native `SQLite` scalar.
    Plain,
    /// Stored as JSON text; decoded on read.
    Json(JsonShape),
}

/// A known field of an entity with its declared default.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Column name.
    name: String,
    /// Value used when the field is absent, null, or undecodable.
    default: Value,
    /// Storage encoding.
    encoding: FieldEncoding,
}

impl FieldSpec {
    /// Declares a plain scalar field.
    #[must_use]
    pub fn plain(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            default,
            encoding: FieldEncoding::Plain,
        }
    }

    /// Declares a JSON field whose default is the empty value of `shape`.
    #[must_use]
    pub fn json(name: impl Into<String>, shape: JsonShape) -> Self {
        Self {
            name: name.into(),
            default: shape.empty(),
            encoding: FieldEncoding::Json(shape),
        }
    }

    /// Declares a JSON field with an explicit default.
    #[must_use]
    pub fn json_with_default(name: impl Into<String>, shape: JsonShape, default: Value) -> Self {
        Self {
            name: name.into(),
            default,
            encoding: FieldEncoding::Json(shape),
        }
    }

    /// Returns the column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared default.
    #[must_use]
    pub const fn default_value(&self) -> &Value {
        &self.default
    }

    /// Returns the storage encoding.
    #[must_use]
    pub const fn encoding(&self) -> FieldEncoding {
        self.encoding
    }

    /// Returns true when the field is stored as JSON text.
    #[must_use]
    pub const fn is_json_encoded(&self) -> bool {
        matches!(self.encoding, FieldEncoding::Json(_))
    }
}

/// Columns stamped automatically on writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampPolicy {
    /// Column set once on insert.
    pub created_at: Option<String>,
    /// Column set on insert and on every effective update.
    pub updated_at: Option<String>,
}

impl TimestampPolicy {
    /// Returns the conventional `created_at` / `updated_at` policy.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            created_at: Some("created_at".to_string()),
            updated_at: Some("updated_at".to_string()),
        }
    }
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Static definition of a logical entity.
///
/// # Invariants
/// - Every identifier matches `[A-Za-z_][A-Za-z0-9_]*`.
/// - Known fields have unique names and non-null defaults.
/// - JSON field defaults match their declared shape.
/// - No column is both a known field and a passthrough column.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    /// Logical entity name (collection name).
    name: String,
    /// Backing table name.
    table: String,
    /// Primary key column.
    primary_key: String,
    /// Known fields in declaration order.
    known_fields: Vec<FieldSpec>,
    /// Columns read when present and never backfilled.
    passthrough: Vec<String>,
    /// Preferred ordering column for selects.
    order_by: Option<String>,
    /// Boolean column toggled and counted as active/inactive.
    active_flag: Option<String>,
    /// Columns aggregated by summaries.
    group_fields: Vec<String>,
    /// Automatic timestamp columns.
    timestamps: TimestampPolicy,
}

impl EntityDescriptor {
    /// Starts a descriptor for entity `name` stored in `table`.
    #[must_use]
    pub fn builder(name: impl Into<String>, table: impl Into<String>) -> EntityDescriptorBuilder {
        EntityDescriptorBuilder {
            name: name.into(),
            table: table.into(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            known_fields: Vec::new(),
            passthrough: Vec::new(),
            order_by: None,
            active_flag: None,
            group_fields: Vec::new(),
            timestamps: TimestampPolicy::default(),
        }
    }

    /// Returns the logical entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backing table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the primary key column.
    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Returns the known fields in declaration order.
    #[must_use]
    pub fn known_fields(&self) -> &[FieldSpec] {
        &self.known_fields
    }

    /// Returns the passthrough columns.
    #[must_use]
    pub fn passthrough_columns(&self) -> &[String] {
        &self.passthrough
    }

    /// Returns the preferred ordering column.
    #[must_use]
    pub fn order_by(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    /// Returns the active flag column.
    #[must_use]
    pub fn active_flag(&self) -> Option<&str> {
        self.active_flag.as_deref()
    }

    /// Returns the summary grouping columns.
    #[must_use]
    pub fn group_fields(&self) -> &[String] {
        &self.group_fields
    }

    /// Returns the timestamp policy.
    #[must_use]
    pub const fn timestamps(&self) -> &TimestampPolicy {
        &self.timestamps
    }

    /// Looks up a known field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.known_fields.iter().find(|field| field.name == name)
    }

    /// Returns the encoding for `name`; undeclared columns are plain.
    #[must_use]
    pub fn encoding_of(&self, name: &str) -> FieldEncoding {
        self.field(name).map_or(FieldEncoding::Plain, FieldSpec::encoding)
    }

    /// Returns every column the descriptor expects, in projection order:
    /// primary key, known fields, passthrough columns, timestamps.
    #[must_use]
    pub fn expected_columns(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        let mut columns = Vec::new();
        let timestamps = [self.timestamps.created_at.as_deref(), self.timestamps.updated_at.as_deref()];
        let candidates = std::iter::once(self.primary_key.as_str())
            .chain(self.known_fields.iter().map(FieldSpec::name))
            .chain(self.passthrough.iter().map(String::as_str))
            .chain(timestamps.into_iter().flatten());
        for column in candidates {
            if seen.insert(column) {
                columns.push(column);
            }
        }
        columns
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for [`EntityDescriptor`].
#[derive(Debug, Clone)]
pub struct EntityDescriptorBuilder {
    /// Logical entity name.
    name: String,
    /// Backing table name.
    table: String,
    /// Primary key column.
    primary_key: String,
    /// Known fields.
    known_fields: Vec<FieldSpec>,
    /// Passthrough columns.
    passthrough: Vec<String>,
    /// Preferred ordering column.
    order_by: Option<String>,
    /// Active flag column.
    active_flag: Option<String>,
    /// Summary grouping columns.
    group_fields: Vec<String>,
    /// Timestamp policy.
    timestamps: TimestampPolicy,
}

impl EntityDescriptorBuilder {
    /// Overrides the primary key column (defaults to `id`).
    #[must_use]
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Adds a known field.
    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.known_fields.push(field);
        self
    }

    /// Adds a passthrough column.
    #[must_use]
    pub fn passthrough(mut self, column: impl Into<String>) -> Self {
        self.passthrough.push(column.into());
        self
    }

    /// Sets the preferred ordering column.
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    /// Sets the boolean active flag column.
    #[must_use]
    pub fn active_flag(mut self, column: impl Into<String>) -> Self {
        self.active_flag = Some(column.into());
        self
    }

    /// Adds a summary grouping column.
    #[must_use]
    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_fields.push(column.into());
        self
    }

    /// Sets the timestamp policy.
    #[must_use]
    pub fn timestamps(mut self, policy: TimestampPolicy) -> Self {
        self.timestamps = policy;
        self
    }

    /// Validates and builds the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] when an identifier is invalid, a field is
    /// declared twice, a default is null, or a JSON default has the wrong shape.
    pub fn build(self) -> Result<EntityDescriptor, DescriptorError> {
        validate_identifier(&self.name)?;
        validate_identifier(&self.table)?;
        validate_identifier(&self.primary_key)?;
        let mut names = BTreeSet::new();
        for field in &self.known_fields {
            validate_identifier(&field.name)?;
            if !names.insert(field.name.as_str()) {
                return Err(DescriptorError::DuplicateField(field.name.clone()));
            }
            if field.default.is_null() {
                return Err(DescriptorError::NullDefault(field.name.clone()));
            }
            if let FieldEncoding::Json(shape) = field.encoding
                && !shape.matches(&field.default)
            {
                return Err(DescriptorError::ShapeMismatch(field.name.clone()));
            }
        }
        for column in &self.passthrough {
            validate_identifier(column)?;
            if !names.insert(column.as_str()) {
                return Err(DescriptorError::DuplicateField(column.clone()));
            }
        }
        let optional = [
            self.order_by.as_deref(),
            self.active_flag.as_deref(),
            self.timestamps.created_at.as_deref(),
            self.timestamps.updated_at.as_deref(),
        ];
        for column in optional.into_iter().flatten().chain(self.group_fields.iter().map(String::as_str))
        {
            validate_identifier(column)?;
        }
        Ok(EntityDescriptor {
            name: self.name,
            table: self.table,
            primary_key: self.primary_key,
            known_fields: self.known_fields,
            passthrough: self.passthrough,
            order_by: self.order_by,
            active_flag: self.active_flag,
            group_fields: self.group_fields,
            timestamps: self.timestamps,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when `value` is a safe `SQLite` identifier.
#[must_use]
pub fn is_valid_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    value.len() <= MAX_IDENTIFIER_LENGTH
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Validates a single identifier.
fn validate_identifier(value: &str) -> Result<(), DescriptorError> {
    if is_valid_identifier(value) {
        Ok(())
    } else {
        Err(DescriptorError::InvalidIdentifier(value.to_string()))
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

    use serde_json::json;

    use super::EntityDescriptor;
    use super::FieldSpec;
    use super::JsonShape;
    use super::TimestampPolicy;
    use super::is_valid_identifier;
    use crate::error::DescriptorError;

    #[test]
    fn identifiers_reject_sql_fragments() {
        assert!(is_valid_identifier("meta_membros"));
        assert!(is_valid_identifier("_hidden"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("nome; DROP TABLE teams"));
        assert!(!is_valid_identifier("nome\""));
    }

    #[test]
    fn build_rejects_null_default() {
        let result = EntityDescriptor::builder("teams", "teams")
            .field(FieldSpec::plain("descricao", serde_json::Value::Null))
            .build();
        assert_eq!(result, Err(DescriptorError::NullDefault("descricao".to_string())));
    }

    #[test]
    fn build_rejects_shape_mismatch() {
        let result = EntityDescriptor::builder("employees", "employees")
            .field(FieldSpec::json_with_default("competencias", JsonShape::Array, json!({})))
            .build();
        assert_eq!(result, Err(DescriptorError::ShapeMismatch("competencias".to_string())));
    }

    #[test]
    fn build_rejects_column_declared_twice() {
        let result = EntityDescriptor::builder("teams", "teams")
            .field(FieldSpec::plain("cor", json!("#3B82F6")))
            .passthrough("cor")
            .build();
        assert_eq!(result, Err(DescriptorError::DuplicateField("cor".to_string())));
    }

    #[test]
    fn expected_columns_deduplicates_in_projection_order() {
        let descriptor = EntityDescriptor::builder("teams", "teams")
            .field(FieldSpec::plain("id", json!(0)))
            .field(FieldSpec::plain("nome", json!("")))
            .passthrough("area_id")
            .timestamps(TimestampPolicy::standard())
            .build()
            .unwrap();
        assert_eq!(
            descriptor.expected_columns(),
            vec!["id", "nome", "area_id", "created_at", "updated_at"]
        );
    }
}
