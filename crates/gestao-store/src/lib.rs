// gestao-store/src/lib.rs
// ============================================================================
// Module: Gestão 360 Record Store
// Description: Schema-tolerant record store over SQLite.
// Purpose: Persist and read HR entities while tolerating table drift.
// Dependencies: rusqlite, serde, serde_json, thiserror, time, tracing
// ============================================================================

//! ## Overview
//! This crate implements the schema-tolerant record layer used by the
//! Gestão 360 backend. Every logical entity is declared once as an
//! [`EntityDescriptor`]. At call time the store discovers which columns the
//! backing table actually has, builds statements that only touch that
//! intersection, backfills declared defaults on read, and reports what it
//! skipped through a [`DiagnosticSink`].
//!
//! The pure pieces ([`builder`], [`normalizer`], [`defaults`]) perform no I/O;
//! [`SqliteRecordStore`] wires them to a `SQLite` connection.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod builder;
pub mod catalog;
pub mod defaults;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod normalizer;
pub mod schema;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use builder::BindValue;
pub use builder::SelectStatement;
pub use builder::SkipReport;
pub use builder::Statement;
pub use builder::UpdatePlan;
pub use builder::build_insert;
pub use builder::build_select;
pub use builder::build_update;
pub use catalog::EntityCatalog;
pub use defaults::WriteKind;
pub use descriptor::EntityDescriptor;
pub use descriptor::EntityDescriptorBuilder;
pub use descriptor::FieldEncoding;
pub use descriptor::FieldSpec;
pub use descriptor::JsonShape;
pub use descriptor::TimestampPolicy;
pub use diagnostics::DiagnosticEvent;
pub use diagnostics::DiagnosticKind;
pub use diagnostics::DiagnosticSink;
pub use diagnostics::FileDiagnosticSink;
pub use diagnostics::MemoryDiagnosticSink;
pub use diagnostics::NoopDiagnosticSink;
pub use diagnostics::StderrDiagnosticSink;
pub use diagnostics::TracingDiagnosticSink;
pub use error::DescriptorError;
pub use error::StoreError;
pub use normalizer::DecodeDegradedWarning;
pub use normalizer::NormalizedRecord;
pub use normalizer::normalize;
pub use schema::LiveSchema;
pub use schema::SchemaCache;
pub use store::EntitySummary;
pub use store::GroupCount;
pub use store::InsertOutcome;
pub use store::SchemaCacheConfig;
pub use store::SchemaDrift;
pub use store::SqliteJournalMode;
pub use store::SqliteRecordStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteSyncMode;
pub use store::UpdateOutcome;

/// A single row as seen by callers: field name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;
