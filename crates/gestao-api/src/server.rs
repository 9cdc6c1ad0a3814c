// gestao-api/src/server.rs
// ============================================================================
// Module: API Server
// Description: HTTP server bootstrap for the record API.
// Purpose: Wire config, diagnostics, store, and router into a running service.
// Dependencies: axum, gestao-config, gestao-store, tokio
// ============================================================================

//! ## Overview
//! [`ApiServer`] validates configuration, opens the `SQLite` store with the
//! configured diagnostic sink, and serves the router from [`crate::routes`].
//! Peer addresses are captured so `local_only` auth can check loopback access.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use gestao_config::DiagnosticSinkKind;
use gestao_config::DiagnosticsConfig;
use gestao_config::Gestao360Config;
use gestao_config::ServerAuthMode;
use gestao_store::DiagnosticSink;
use gestao_store::EntityCatalog;
use gestao_store::FileDiagnosticSink;
use gestao_store::MemoryDiagnosticSink;
use gestao_store::NoopDiagnosticSink;
use gestao_store::SqliteRecordStore;
use gestao_store::StderrDiagnosticSink;
use gestao_store::TracingDiagnosticSink;
use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::auth::RequestAuthz;
use crate::routes::ApiState;
use crate::routes::router;

// ============================================================================
// SECTION: Server
// ============================================================================

/// Record API server instance.
pub struct ApiServer {
    /// Validated configuration.
    config: Gestao360Config,
    /// Handler state.
    state: Arc<ApiState>,
    /// Request auth policy.
    authz: Arc<RequestAuthz>,
}

impl ApiServer {
    /// Builds a server from configuration and a diagnostic sink.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError`] when validation or store initialization fails.
    pub fn from_config(config: Gestao360Config, sink: Arc<dyn DiagnosticSink>) -> Result<Self, ApiServerError> {
        config.validate().map_err(|err| ApiServerError::Config(err.to_string()))?;
        let catalog = EntityCatalog::gestao360().map_err(|err| ApiServerError::Init(err.to_string()))?;
        let store = SqliteRecordStore::open(config.store_config(), sink)
            .map_err(|err| ApiServerError::Init(err.to_string()))?;
        let authz = Arc::new(RequestAuthz::from_config(&config.server.auth));
        emit_local_only_warning(&authz);
        Ok(Self {
            state: Arc::new(ApiState::new(store, catalog)),
            authz,
            config,
        })
    }

    /// Returns the configured router.
    #[must_use]
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state), Arc::clone(&self.authz), self.config.server.max_body_bytes)
    }

    /// Serves HTTP requests until the process is interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ApiServerError> {
        let addr = self.config.server.bind_addr().map_err(|err| ApiServerError::Config(err.to_string()))?;
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| ApiServerError::Transport(format!("http bind failed: {err}")))?;
        info!(bind = %addr, "gestao360 api listening");
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|err| ApiServerError::Transport(format!("http server failed: {err}")))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// API server errors.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization error.
    #[error("init error: {0}")]
    Init(String),
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Diagnostics
// ============================================================================

/// Builds the diagnostic sink selected by `[diagnostics]`.
///
/// # Errors
///
/// Returns [`ApiServerError::Init`] when the file sink cannot be opened.
pub fn build_diagnostic_sink(config: &DiagnosticsConfig) -> Result<Arc<dyn DiagnosticSink>, ApiServerError> {
    let sink: Arc<dyn DiagnosticSink> = match config.sink {
        DiagnosticSinkKind::Stderr => Arc::new(StderrDiagnosticSink),
        DiagnosticSinkKind::Tracing => Arc::new(TracingDiagnosticSink),
        DiagnosticSinkKind::Memory => Arc::new(MemoryDiagnosticSink::new()),
        DiagnosticSinkKind::Noop => Arc::new(NoopDiagnosticSink),
        DiagnosticSinkKind::File => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| ApiServerError::Config("file diagnostics sink requires path".to_string()))?;
            let sink = FileDiagnosticSink::new(path)
                .map_err(|err| ApiServerError::Init(format!("diagnostics file: {err}")))?;
            Arc::new(sink)
        }
    };
    Ok(sink)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Warns when the server runs without explicit credentials.
fn emit_local_only_warning(authz: &RequestAuthz) {
    if authz.mode() == ServerAuthMode::LocalOnly {
        warn!("server running in local-only mode; configure server.auth to enable bearer_token");
    }
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

// ============================================================================
// SECTION: Tests
// ============================================================================
