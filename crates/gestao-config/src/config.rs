// gestao-config/src/config.rs
// ============================================================================
// Module: Gestão 360 Configuration
// Description: Configuration loading and validation for the record service.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: gestao-store, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid loopback-only
//! deployment. Missing or invalid configuration fails closed.
//!
//! Security posture: config inputs are untrusted. A non-loopback bind is
//! rejected unless bearer-token auth is configured, and no credential is ever
//! implied by default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use gestao_store::SchemaCacheConfig;
use gestao_store::SqliteJournalMode;
use gestao_store::SqliteStoreConfig;
use gestao_store::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "gestao360.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "GESTAO360_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of server auth tokens.
pub const MAX_AUTH_TOKENS: usize = 64;
/// Maximum length of a server auth token.
pub const MAX_AUTH_TOKEN_LENGTH: usize = 256;
/// Minimum `SQLite` busy timeout (ms).
const MIN_BUSY_TIMEOUT_MS: u64 = 1;
/// Maximum `SQLite` busy timeout (ms).
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Maximum length of the tracing filter directive.
const MAX_LOG_FILTER_LENGTH: usize = 1024;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Gestão 360 service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Gestao360Config {
    /// Record store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Live schema cache policy.
    #[serde(default)]
    pub schema_cache: SchemaCacheConfig,
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Diagnostic sink configuration.
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Gestao360Config {
    /// Loads configuration from disk using the default resolution rules:
    /// explicit path, then `GESTAO360_CONFIG`, then `./gestao360.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.server.validate()?;
        self.diagnostics.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Returns the record store configuration.
    #[must_use]
    pub fn store_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.store.path.clone(),
            busy_timeout_ms: self.store.busy_timeout_ms,
            journal_mode: self.store.journal_mode,
            sync_mode: self.store.sync_mode,
            schema_cache: self.schema_cache,
            insert_defaults: self.store.insert_defaults,
        }
    }
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the `SQLite` database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Backfill declared defaults on insert.
    #[serde(default = "default_true")]
    pub insert_defaults: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            insert_defaults: true,
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("store.path", &self.path.to_string_lossy())?;
        if !(MIN_BUSY_TIMEOUT_MS ..= MAX_BUSY_TIMEOUT_MS).contains(&self.busy_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "store.busy_timeout_ms must be between {MIN_BUSY_TIMEOUT_MS} and \
                 {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Inbound authentication.
    #[serde(default)]
    pub auth: ServerAuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            auth: ServerAuthConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be greater than zero".to_string()));
        }
        self.auth.validate()?;
        let addr = self.bind_addr()?;
        if !addr.ip().is_loopback() && self.auth.mode == ServerAuthMode::LocalOnly {
            return Err(ConfigError::Invalid("non-loopback bind disallowed without auth policy".to_string()));
        }
        Ok(())
    }

    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address is empty or malformed.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self.bind.trim();
        if bind.is_empty() {
            return Err(ConfigError::Invalid("server.bind must be non-empty".to_string()));
        }
        bind.parse().map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }
}

/// Inbound auth modes for the HTTP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerAuthMode {
    /// Loopback access only.
    #[default]
    LocalOnly,
    /// Bearer token authentication.
    BearerToken,
}

/// Server authentication configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerAuthConfig {
    /// Auth mode.
    #[serde(default)]
    pub mode: ServerAuthMode,
    /// Accepted bearer tokens (required for `bearer_token` mode).
    #[serde(default)]
    pub bearer_tokens: Vec<String>,
}

impl ServerAuthConfig {
    /// Validates auth configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bearer_tokens.len() > MAX_AUTH_TOKENS {
            return Err(ConfigError::Invalid("too many auth tokens".to_string()));
        }
        for token in &self.bearer_tokens {
            if token.trim().is_empty() {
                return Err(ConfigError::Invalid("auth token must be non-empty".to_string()));
            }
            if token.len() > MAX_AUTH_TOKEN_LENGTH {
                return Err(ConfigError::Invalid("auth token too long".to_string()));
            }
            if token.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid("auth token must not contain whitespace".to_string()));
            }
        }
        match self.mode {
            ServerAuthMode::LocalOnly => Ok(()),
            ServerAuthMode::BearerToken => {
                if self.bearer_tokens.is_empty() {
                    return Err(ConfigError::Invalid("bearer_token auth requires bearer_tokens".to_string()));
                }
                Ok(())
            }
        }
    }
}

/// Diagnostic sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticSinkKind {
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to `diagnostics.path`.
    File,
    /// `tracing` events.
    #[default]
    Tracing,
    /// In-memory buffer.
    Memory,
    /// Discard diagnostics.
    Noop,
}

/// Diagnostic sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiagnosticsConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: DiagnosticSinkKind,
    /// Output path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl DiagnosticsConfig {
    /// Validates diagnostics configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (DiagnosticSinkKind::File, None) => {
                Err(ConfigError::Invalid("file diagnostics sink requires path".to_string()))
            }
            (DiagnosticSinkKind::File, Some(path)) => validate_path_string("diagnostics.path", &path.to_string_lossy()),
            (_, Some(_)) => Err(ConfigError::Invalid("diagnostics.path is only valid for the file sink".to_string())),
            (_, None) => Ok(()),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive (for example `info,gestao_store=debug`).
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit ANSI colors.
    #[serde(default = "default_true")]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Validates logging configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter must be non-empty".to_string()));
        }
        if self.filter.len() > MAX_LOG_FILTER_LENGTH {
            return Err(ConfigError::Invalid("logging.filter exceeds max length".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default database path.
fn default_store_path() -> PathBuf {
    PathBuf::from("gestao360.db")
}

/// Returns the default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Returns the default bind address.
fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Returns the default maximum request body size.
const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Returns the default tracing filter.
fn default_log_filter() -> String {
    "info".to_string()
}

/// Returns `true` for serde boolean defaults.
const fn default_true() -> bool {
    true
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
