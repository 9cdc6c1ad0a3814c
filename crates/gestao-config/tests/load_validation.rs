// crates/gestao-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

//! Config load validation tests for gestao-config.

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

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use common::TestResult;
use common::assert_invalid;
use gestao_config::Gestao360Config;
use gestao_config::ServerAuthMode;
use tempfile::NamedTempFile;

fn load(path: &Path) -> Result<(), gestao_config::ConfigError> {
    Gestao360Config::load(Some(path)).map(|_| ())
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(load(Path::new(&long_path)), "config path exceeds max length")
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(load(Path::new(&long_component)), "config path component too long")
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'a'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(load(file.path()), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(load(file.path()), "config file must be utf-8")
}

#[test]
fn load_rejects_malformed_toml() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[store\npath = ").map_err(|err| err.to_string())?;
    assert_invalid(load(file.path()), "config parse error")
}

#[test]
fn load_reports_missing_file_as_io_error() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let missing = dir.path().join("absent.toml");
    assert_invalid(load(&missing), "config io error")
}

#[test]
fn load_runs_validation_after_parse() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[server]\nbind = \"0.0.0.0:8000\"\n").map_err(|err| err.to_string())?;
    assert_invalid(load(file.path()), "non-loopback bind disallowed without auth policy")
}

#[test]
fn load_accepts_full_config() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let content = r#"
[store]
path = "data/gestao360.db"
busy_timeout_ms = 2500
journal_mode = "delete"
sync_mode = "normal"
insert_defaults = false

[schema_cache]
enabled = true
fresh_on_write = false

[server]
bind = "0.0.0.0:9000"
max_body_bytes = 65536

[server.auth]
mode = "bearer_token"
bearer_tokens = ["s3cret-token"]

[diagnostics]
sink = "file"
path = "logs/diagnostics.jsonl"

[logging]
filter = "info,gestao_store=debug"
ansi = false
"#;
    file.write_all(content.as_bytes()).map_err(|err| err.to_string())?;
    let config = Gestao360Config::load(Some(file.path())).map_err(|err| err.to_string())?;
    assert_eq!(config.server.auth.mode, ServerAuthMode::BearerToken);
    assert_eq!(config.server.max_body_bytes, 65_536);
    assert!(!config.logging.ansi);
    let store = config.store_config();
    assert_eq!(store.path, PathBuf::from("data/gestao360.db"));
    assert_eq!(store.busy_timeout_ms, 2_500);
    assert!(!store.insert_defaults);
    assert!(!store.schema_cache.fresh_on_write);
    Ok(())
}
