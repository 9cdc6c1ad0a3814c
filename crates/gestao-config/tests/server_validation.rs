// crates/gestao-config/tests/server_validation.rs
// =============================================================================
// Module: Server Config Validation Tests
// Description: Validate bind, body limit, and inbound auth rules.
// Purpose: Ensure exposed deployments always require credentials.
// =============================================================================

//! Server and auth validation tests for gestao-config.

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

use common::TestResult;
use common::assert_invalid;
use common::minimal_config;
use gestao_config::MAX_AUTH_TOKEN_LENGTH;
use gestao_config::MAX_AUTH_TOKENS;
use gestao_config::ServerAuthMode;

#[test]
fn default_server_is_loopback_local_only() -> TestResult {
    let config = minimal_config()?;
    config.validate().map_err(|err| err.to_string())?;
    let addr = config.server.bind_addr().map_err(|err| err.to_string())?;
    assert!(addr.ip().is_loopback());
    assert_eq!(addr.port(), 8000);
    assert_eq!(config.server.auth.mode, ServerAuthMode::LocalOnly);
    assert_eq!(config.server.max_body_bytes, 1024 * 1024);
    Ok(())
}

#[test]
fn rejects_zero_body_limit() -> TestResult {
    let mut config = minimal_config()?;
    config.server.max_body_bytes = 0;
    assert_invalid(config.validate(), "max_body_bytes must be greater than zero")
}

#[test]
fn rejects_malformed_bind() -> TestResult {
    let mut config = minimal_config()?;
    config.server.bind = "localhost".to_string();
    assert_invalid(config.validate(), "invalid bind address")
}

#[test]
fn rejects_empty_bind() -> TestResult {
    let mut config = minimal_config()?;
    config.server.bind = "  ".to_string();
    assert_invalid(config.validate(), "server.bind must be non-empty")
}

#[test]
fn rejects_non_loopback_without_auth() -> TestResult {
    let mut config = minimal_config()?;
    config.server.bind = "0.0.0.0:8000".to_string();
    assert_invalid(config.validate(), "non-loopback bind disallowed without auth policy")
}

#[test]
fn accepts_non_loopback_with_bearer_tokens() -> TestResult {
    let mut config = minimal_config()?;
    config.server.bind = "0.0.0.0:8000".to_string();
    config.server.auth.mode = ServerAuthMode::BearerToken;
    config.server.auth.bearer_tokens = vec!["token-a".to_string()];
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn bearer_mode_requires_tokens() -> TestResult {
    let mut config = minimal_config()?;
    config.server.auth.mode = ServerAuthMode::BearerToken;
    assert_invalid(config.validate(), "bearer_token auth requires bearer_tokens")
}

#[test]
fn rejects_too_many_tokens() -> TestResult {
    let mut config = minimal_config()?;
    config.server.auth.mode = ServerAuthMode::BearerToken;
    config.server.auth.bearer_tokens = (0 ..= MAX_AUTH_TOKENS).map(|idx| format!("token-{idx}")).collect();
    assert_invalid(config.validate(), "too many auth tokens")
}

#[test]
fn rejects_empty_token() -> TestResult {
    let mut config = minimal_config()?;
    config.server.auth.mode = ServerAuthMode::BearerToken;
    config.server.auth.bearer_tokens = vec![String::new()];
    assert_invalid(config.validate(), "auth token must be non-empty")
}

#[test]
fn rejects_overlong_token() -> TestResult {
    let mut config = minimal_config()?;
    config.server.auth.mode = ServerAuthMode::BearerToken;
    config.server.auth.bearer_tokens = vec!["t".repeat(MAX_AUTH_TOKEN_LENGTH + 1)];
    assert_invalid(config.validate(), "auth token too long")
}

#[test]
fn rejects_token_with_whitespace() -> TestResult {
    let mut config = minimal_config()?;
    config.server.auth.mode = ServerAuthMode::BearerToken;
    config.server.auth.bearer_tokens = vec!["abc def".to_string()];
    assert_invalid(config.validate(), "auth token must not contain whitespace")
}

#[test]
fn tokens_are_validated_in_local_only_mode() -> TestResult {
    let mut config = minimal_config()?;
    config.server.auth.bearer_tokens = vec![" padded".to_string()];
    assert_invalid(config.validate(), "auth token must not contain whitespace")
}
