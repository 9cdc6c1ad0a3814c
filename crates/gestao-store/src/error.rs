// gestao-store/src/error.rs
// ============================================================================
// Module: Record Store Errors
// Description: Typed failures for descriptor construction and store access.
// Purpose: Separate structural failures from degraded-but-successful reads.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Structural failures ([`StoreError::UnknownTable`],
//! [`StoreError::RecordNotFound`], [`StoreError::NoPersistableFields`])
//! propagate to callers for translation into wire-level responses. Degraded
//! decodes are not errors; they travel as
//! [`crate::DecodeDegradedWarning`] values through the diagnostic sink.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Record store errors.
///
/// # Invariants
/// - Messages name tables, entities, and fields but never embed record values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The table backing an entity does not exist in storage.
    #[error("unknown table: {0}")]
    UnknownTable(String),
    /// Every field of a write request was filtered out by the live schema.
    #[error("no persistable fields for {entity}: requested [{}]", requested.join(", "))]
    NoPersistableFields {
        /// Logical entity name.
        entity: String,
        /// Field names the caller requested.
        requested: Vec<String>,
    },
    /// The key does not resolve to exactly one row.
    #[error("record not found: {entity} {key}")]
    RecordNotFound {
        /// Logical entity name.
        entity: String,
        /// Rendered key value.
        key: String,
    },
    /// A column required by the operation is absent from the live table.
    #[error("column {column} missing on table {table}")]
    MissingColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// Invalid caller input (keys, table names, configuration).
    #[error("invalid store input: {0}")]
    Invalid(String),
    /// `SQLite` engine error.
    #[error("store db error: {0}")]
    Db(String),
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
}

impl StoreError {
    /// Returns a stable, machine-readable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTable(_) => "unknown_table",
            Self::NoPersistableFields {
                ..
            } => "no_persistable_fields",
            Self::RecordNotFound {
                ..
            } => "record_not_found",
            Self::MissingColumn {
                ..
            } => "missing_column",
            Self::Invalid(_) => "invalid",
            Self::Db(_) => "db",
            Self::Io(_) => "io",
        }
    }
}

// ============================================================================
// SECTION: Descriptor Errors
// ============================================================================

/// Errors raised while building an [`crate::EntityDescriptor`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// An identifier is empty or contains characters outside `[A-Za-z0-9_]`.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    /// The same field name was declared twice.
    #[error("duplicate field: {0}")]
    DuplicateField(String),
    /// A known field declared a null default.
    #[error("field {0} must declare a non-null default")]
    NullDefault(String),
    /// A JSON field default does not match its declared shape.
    #[error("field {0} default does not match its json shape")]
    ShapeMismatch(String),
    /// Two descriptors in a catalog share a collection name.
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),
}
