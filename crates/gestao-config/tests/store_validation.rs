// crates/gestao-config/tests/store_validation.rs
// =============================================================================
// Module: Store Config Validation Tests
// Description: Validate store, diagnostics, and logging sections.
// Purpose: Ensure persistence and diagnostics settings fail closed.
// =============================================================================

//! Store, diagnostics, and logging validation tests for gestao-config.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::path::PathBuf;

use common::TestResult;
use common::assert_invalid;
use common::config_from_toml;
use common::minimal_config;
use gestao_config::DiagnosticSinkKind;
use gestao_store::SqliteJournalMode;
use gestao_store::SqliteSyncMode;

#[test]
fn defaults_map_onto_store_config() -> TestResult {
    let config = minimal_config()?;
    let store = config.store_config();
    assert_eq!(store.path, PathBuf::from("gestao360.db"));
    assert_eq!(store.busy_timeout_ms, 5_000);
    assert_eq!(store.journal_mode, SqliteJournalMode::Wal);
    assert_eq!(store.sync_mode, SqliteSyncMode::Full);
    assert!(store.insert_defaults);
    assert!(store.schema_cache.enabled);
    assert!(store.schema_cache.fresh_on_write);
    assert_eq!(config.diagnostics.sink, DiagnosticSinkKind::Tracing);
    assert_eq!(config.logging.filter, "info");
    Ok(())
}

#[test]
fn rejects_empty_store_path() -> TestResult {
    let mut config = minimal_config()?;
    config.store.path = PathBuf::new();
    assert_invalid(config.validate(), "store.path must be non-empty")
}

#[test]
fn rejects_store_path_component_too_long() -> TestResult {
    let mut config = minimal_config()?;
    config.store.path = PathBuf::from(format!("data/{}.db", "x".repeat(300)));
    assert_invalid(config.validate(), "store.path path component too long")
}

#[test]
fn rejects_zero_busy_timeout() -> TestResult {
    let mut config = minimal_config()?;
    config.store.busy_timeout_ms = 0;
    assert_invalid(config.validate(), "store.busy_timeout_ms must be between")
}

#[test]
fn rejects_excessive_busy_timeout() -> TestResult {
    let mut config = minimal_config()?;
    config.store.busy_timeout_ms = 60_001;
    assert_invalid(config.validate(), "store.busy_timeout_ms must be between")
}

#[test]
fn accepts_busy_timeout_bounds() -> TestResult {
    let mut config = minimal_config()?;
    config.store.busy_timeout_ms = 1;
    config.validate().map_err(|err| err.to_string())?;
    config.store.busy_timeout_ms = 60_000;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn rejects_unknown_journal_mode() {
    let result = config_from_toml("[store]\njournal_mode = \"memory\"\n");
    assert!(result.is_err());
}

#[test]
fn file_sink_requires_path() -> TestResult {
    let config = config_from_toml("[diagnostics]\nsink = \"file\"\n")?;
    assert_invalid(config.validate(), "file diagnostics sink requires path")
}

#[test]
fn path_rejected_for_non_file_sink() -> TestResult {
    let config = config_from_toml("[diagnostics]\nsink = \"stderr\"\npath = \"d.jsonl\"\n")?;
    assert_invalid(config.validate(), "diagnostics.path is only valid for the file sink")
}

#[test]
fn accepts_each_non_file_sink() -> TestResult {
    for sink in ["stderr", "tracing", "memory", "noop"] {
        let config = config_from_toml(&format!("[diagnostics]\nsink = \"{sink}\"\n"))?;
        config.validate().map_err(|err| err.to_string())?;
    }
    Ok(())
}

#[test]
fn rejects_blank_log_filter() -> TestResult {
    let mut config = minimal_config()?;
    config.logging.filter = " ".to_string();
    assert_invalid(config.validate(), "logging.filter must be non-empty")
}

#[test]
fn rejects_overlong_log_filter() -> TestResult {
    let mut config = minimal_config()?;
    config.logging.filter = "a".repeat(2_000);
    assert_invalid(config.validate(), "logging.filter exceeds max length")
}
