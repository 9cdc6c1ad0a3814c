// crates/gestao-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for gestao-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use gestao_config::ConfigError;
use gestao_config::Gestao360Config;

/// Result type used by config tests.
pub type TestResult = Result<(), String>;

/// Parses a TOML string into a `Gestao360Config` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<Gestao360Config, String> {
    toml::from_str(toml_str).map_err(|err| err.to_string())
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<Gestao360Config, String> {
    config_from_toml("")
}

/// Asserts that validation fails with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
