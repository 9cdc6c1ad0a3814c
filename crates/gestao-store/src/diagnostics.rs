// gestao-store/src/diagnostics.rs
// ============================================================================
// Module: Store Diagnostics
// Description: Structured events for skipped fields and degraded reads.
// Purpose: Report abnormal but non-fatal conditions to an external collector.
// Dependencies: serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! The store never decides where diagnostics end up. It builds a
//! [`DiagnosticEvent`] and hands it to a [`DiagnosticSink`]; deployments pick
//! stderr JSON lines, an append-only file, `tracing` events, an in-memory
//! buffer, or nothing.
//!
//! Events carry entity and field names only, never record values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Kind of diagnostic condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A write dropped fields absent from the live schema.
    FieldsSkipped,
    /// A known field is missing from the live table on read.
    ColumnMissing,
    /// A JSON field failed to decode and was defaulted.
    DecodeDegraded,
    /// The table backing an entity does not exist.
    TableMissing,
    /// Cached schemas were dropped by an administrative action.
    SchemaInvalidated,
    /// An update had nothing persistable and changed nothing.
    NoopUpdate,
}

impl DiagnosticKind {
    /// Returns the stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FieldsSkipped => "fields_skipped",
            Self::ColumnMissing => "column_missing",
            Self::DecodeDegraded => "decode_degraded",
            Self::TableMissing => "table_missing",
            Self::SchemaInvalidated => "schema_invalidated",
            Self::NoopUpdate => "noop_update",
        }
    }
}

/// Diagnostic event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Condition kind.
    pub kind: DiagnosticKind,
    /// Logical entity (or table) name.
    pub entity: String,
    /// Field names involved.
    pub field_list: Vec<String>,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Optional short detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DiagnosticEvent {
    /// Creates a new event with a consistent timestamp.
    #[must_use]
    pub fn new(kind: DiagnosticKind, entity: impl Into<String>, field_list: Vec<String>) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "store_diagnostic",
            kind,
            entity: entity.into(),
            field_list,
            timestamp_ms,
            detail: None,
        }
    }

    /// Attaches a short detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Receiver for store diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Records a diagnostic event.
    fn record(&self, event: &DiagnosticEvent);
}

/// Sink that logs JSON lines to stderr.
pub struct StderrDiagnosticSink;

impl DiagnosticSink for StderrDiagnosticSink {
    fn record(&self, event: &DiagnosticEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that appends JSON lines to a file.
pub struct FileDiagnosticSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileDiagnosticSink {
    /// Opens the diagnostic log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl DiagnosticSink for FileDiagnosticSink {
    fn record(&self, event: &DiagnosticEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Sink that forwards events to `tracing`.
pub struct TracingDiagnosticSink;

impl DiagnosticSink for TracingDiagnosticSink {
    fn record(&self, event: &DiagnosticEvent) {
        let kind = event.kind.as_str();
        let fields = event.field_list.join(",");
        let detail = event.detail.as_deref().unwrap_or("");
        match event.kind {
            DiagnosticKind::FieldsSkipped | DiagnosticKind::NoopUpdate => {
                tracing::debug!(kind, entity = %event.entity, fields, detail, "store diagnostic");
            }
            DiagnosticKind::SchemaInvalidated => {
                tracing::info!(kind, entity = %event.entity, fields, detail, "store diagnostic");
            }
            DiagnosticKind::ColumnMissing
            | DiagnosticKind::DecodeDegraded
            | DiagnosticKind::TableMissing => {
                tracing::warn!(kind, entity = %event.entity, fields, detail, "store diagnostic");
            }
        }
    }
}

/// Sink that buffers events in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryDiagnosticSink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemoryDiagnosticSink {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the recorded events of `kind`.
    #[must_use]
    pub fn events_of(&self, kind: DiagnosticKind) -> Vec<DiagnosticEvent> {
        self.events().into_iter().filter(|event| event.kind == kind).collect()
    }

    /// Removes and returns every recorded event.
    pub fn drain(&self) -> Vec<DiagnosticEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl DiagnosticSink for MemoryDiagnosticSink {
    fn record(&self, event: &DiagnosticEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
    }
}

/// Sink that drops every event.
pub struct NoopDiagnosticSink;

impl DiagnosticSink for NoopDiagnosticSink {
    fn record(&self, _event: &DiagnosticEvent) {}
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

    use std::fs;

    use super::DiagnosticEvent;
    use super::DiagnosticKind;
    use super::DiagnosticSink;
    use super::FileDiagnosticSink;
    use super::MemoryDiagnosticSink;

    #[test]
    fn event_serializes_with_stable_labels() {
        let event = DiagnosticEvent::new(
            DiagnosticKind::FieldsSkipped,
            "teams",
            vec!["ativo".to_string(), "endereco".to_string()],
        );
        let payload = serde_json::to_value(&event).unwrap();
        assert_eq!(payload["event"], "store_diagnostic");
        assert_eq!(payload["kind"], "fields_skipped");
        assert_eq!(payload["field_list"], serde_json::json!(["ativo", "endereco"]));
        assert!(payload.get("detail").is_none());
    }

    #[test]
    fn memory_sink_buffers_and_drains() {
        let sink = MemoryDiagnosticSink::new();
        sink.record(&DiagnosticEvent::new(DiagnosticKind::TableMissing, "teams", Vec::new()));
        sink.record(&DiagnosticEvent::new(DiagnosticKind::NoopUpdate, "teams", Vec::new()));
        assert_eq!(sink.events_of(DiagnosticKind::TableMissing).len(), 1);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diagnostics.jsonl");
        let sink = FileDiagnosticSink::new(&path).unwrap();
        sink.record(
            &DiagnosticEvent::new(DiagnosticKind::DecodeDegraded, "employees", vec!["pdi".to_string()])
                .with_detail("invalid json text"),
        );
        sink.record(&DiagnosticEvent::new(DiagnosticKind::ColumnMissing, "employees", Vec::new()));
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"decode_degraded\""));
        assert!(lines[0].contains("invalid json text"));
    }
}
