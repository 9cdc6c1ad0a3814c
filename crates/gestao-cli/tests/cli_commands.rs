// crates/gestao-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests for the gestao360 binary.
// Purpose: Ensure config and schema commands fail closed with exit code 1.
// Dependencies: gestao360 binary, gestao-store
// ============================================================================
//! ## Overview
//! Runs the compiled binary against temporary config and database files.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use std::sync::Arc;

use gestao_store::EntityCatalog;
use gestao_store::NoopDiagnosticSink;
use gestao_store::SqliteRecordStore;
use gestao_store::SqliteStoreConfig;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn gestao_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_gestao360"))
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("gestao360.toml");
    fs::write(&path, body).expect("write config");
    path
}

fn store_config(dir: &TempDir) -> PathBuf {
    let db = dir.path().join("gestao360.db");
    let body = format!(
        "[store]\npath = {}\n\n[diagnostics]\nsink = \"noop\"\n\n[logging]\nfilter = \"warn\"\nansi = false\n",
        toml_string(&db)
    );
    write_config(dir, &body)
}

/// Creates a zero-length file, which `SQLite` reads as an empty database.
fn empty_database(dir: &TempDir) {
    fs::write(dir.path().join("gestao360.db"), b"").expect("write database");
}

/// Creates every catalog table with only a primary key column.
fn catalog_database(dir: &TempDir) {
    let db = dir.path().join("gestao360.db");
    let sink = Arc::new(NoopDiagnosticSink);
    let store = SqliteRecordStore::open(SqliteStoreConfig::new(&db), sink).expect("open store");
    let catalog = EntityCatalog::gestao360().expect("catalog");
    let migration: String = catalog
        .iter()
        .map(|entity| format!("CREATE TABLE \"{}\" (\"{}\" INTEGER PRIMARY KEY);", entity.table(), entity.primary_key()))
        .collect();
    store.apply_migration(&migration).expect("create tables");
}

fn toml_string(path: &Path) -> String {
    format!("'{}'", path.display())
}

fn run(args: &[&str], config: &Path) -> Output {
    Command::new(gestao_bin())
        .args(args)
        .arg("--config")
        .arg(config)
        .env_remove("RUST_LOG")
        .output()
        .expect("run gestao360")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn version_prints_package_version() {
    let output = Command::new(gestao_bin()).arg("--version").output().expect("run gestao360");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn config_validate_accepts_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, "");
    let output = run(&["config", "validate"], &config);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("config ok"));
}

#[test]
fn config_validate_rejects_exposed_bind() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, "[server]\nbind = \"0.0.0.0:8000\"\n");
    let output = run(&["config", "validate"], &config);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("non-loopback bind disallowed without auth policy"));
}

#[test]
fn serve_rejects_exposed_bind_before_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, "[server]\nbind = \"0.0.0.0:8000\"\n");
    let output = run(&["serve"], &config);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn schema_check_fails_on_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = store_config(&dir);
    empty_database(&dir);
    let output = run(&["schema", "check"], &config);
    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    let entries = report.as_array().expect("array report");
    assert_eq!(entries.len(), 6);
    assert!(entries.iter().all(|entry| entry["table_exists"] == serde_json::Value::Bool(false)));
}

#[test]
fn schema_check_passes_when_every_table_exists() {
    let dir = tempfile::tempdir().unwrap();
    let config = store_config(&dir);
    catalog_database(&dir);
    let output = run(&["schema", "check"], &config);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    let entries = report.as_array().expect("array report");
    assert!(entries.iter().all(|entry| entry["table_exists"] == serde_json::Value::Bool(true)));
}

#[test]
fn schema_commands_refuse_missing_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = store_config(&dir);
    let db = dir.path().join("gestao360.db");
    for args in [&["schema", "check"][..], &["schema", "show", "areas"][..]] {
        let output = run(args, &config);
        assert_eq!(output.status.code(), Some(1));
        assert!(String::from_utf8_lossy(&output.stderr).contains("store database not found"));
        assert!(output.stdout.is_empty());
    }
    assert!(!db.exists());
}

#[test]
fn schema_show_rejects_unknown_collection() {
    let dir = tempfile::tempdir().unwrap();
    let config = store_config(&dir);
    empty_database(&dir);
    let output = run(&["schema", "show", "payroll"], &config);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown collection: payroll"));
}

#[test]
fn schema_show_reports_missing_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = store_config(&dir);
    empty_database(&dir);
    let output = run(&["schema", "show", "areas"], &config);
    assert!(output.status.success());
    let drift: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json drift");
    assert_eq!(drift["entity"], serde_json::Value::String("areas".to_string()));
    assert_eq!(drift["table_exists"], serde_json::Value::Bool(false));
}
