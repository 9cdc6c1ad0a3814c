// gestao-api/src/auth.rs
// ============================================================================
// Module: Request Authentication
// Description: Inbound auth enforcement for the record API.
// Purpose: Provide strict, fail-closed access policies for HTTP requests.
// Dependencies: axum, gestao-config, subtle, tracing
// ============================================================================

//! ## Overview
//! Two policies guard the record API: `local_only` admits loopback peers
//! only, and `bearer_token` admits requests presenting one of the configured
//! tokens. Token comparison is constant-time across every configured token.
//! A request whose peer address is unknown is rejected in `local_only` mode.
//! There is no credential bypass.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::RequestExt;
use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use gestao_config::ServerAuthConfig;
use gestao_config::ServerAuthMode;
use subtle::Choice;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

use crate::error::ApiError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted `Authorization` header size.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The caller could not be authenticated.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

// ============================================================================
// SECTION: Auth Context
// ============================================================================

/// Authentication method that admitted a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Loopback peer under `local_only`.
    Local,
    /// Matching bearer token.
    BearerToken,
}

impl AuthMethod {
    /// Returns a stable label for logging.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::BearerToken => "bearer_token",
        }
    }
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Request authorization policy derived from server config.
pub struct RequestAuthz {
    /// Configured auth mode.
    mode: ServerAuthMode,
    /// Accepted bearer tokens as raw bytes.
    bearer_tokens: Vec<Vec<u8>>,
}

impl RequestAuthz {
    /// Builds a policy from server auth configuration.
    #[must_use]
    pub fn from_config(config: &ServerAuthConfig) -> Self {
        Self {
            mode: config.mode,
            bearer_tokens: config.bearer_tokens.iter().map(|token| token.as_bytes().to_vec()).collect(),
        }
    }

    /// Returns the configured auth mode.
    #[must_use]
    pub const fn mode(&self) -> ServerAuthMode {
        self.mode
    }

    /// Authorizes a request from its peer address and `Authorization` header.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] when the request is not admitted.
    pub fn authorize(&self, peer_ip: Option<IpAddr>, auth_header: Option<&str>) -> Result<AuthMethod, AuthError> {
        match self.mode {
            ServerAuthMode::LocalOnly => {
                if peer_ip.is_some_and(|ip| ip.is_loopback()) {
                    Ok(AuthMethod::Local)
                } else {
                    Err(AuthError::Unauthenticated("local-only mode requires loopback access".to_string()))
                }
            }
            ServerAuthMode::BearerToken => {
                let token = parse_bearer_token(auth_header)?;
                if self.token_matches(token.as_bytes()) {
                    Ok(AuthMethod::BearerToken)
                } else {
                    Err(AuthError::Unauthenticated("invalid bearer token".to_string()))
                }
            }
        }
    }

    /// Compares `candidate` against every configured token without early exit.
    fn token_matches(&self, candidate: &[u8]) -> bool {
        let matched = self
            .bearer_tokens
            .iter()
            .fold(Choice::from(0), |acc, token| acc | token.as_slice().ct_eq(candidate));
        bool::from(matched)
    }
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Axum middleware enforcing [`RequestAuthz`] on every guarded route.
///
/// The peer address is read through the [`ConnectInfo`] extractor, so a
/// `MockConnectInfo` layer stands in for a real socket in tests.
pub async fn require_auth(State(authz): State<Arc<RequestAuthz>>, mut request: Request, next: Next) -> Response {
    let peer_ip = request
        .extract_parts::<ConnectInfo<SocketAddr>>()
        .await
        .ok()
        .map(|ConnectInfo(addr)| addr.ip());
    let peer = peer_ip.map(|ip| ip.to_string()).unwrap_or_default();
    let auth_header = request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    match authz.authorize(peer_ip, auth_header) {
        Ok(method) => {
            debug!(
                peer = %peer,
                auth = method.label(),
                method = %request.method(),
                path = %request.uri().path(),
                "request admitted"
            );
            next.run(request).await
        }
        Err(error) => {
            warn!(
                peer = %peer,
                method = %request.method(),
                path = %request.uri().path(),
                reason = %error,
                "request denied"
            );
            ApiError::Unauthenticated(error.to_string()).into_response()
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the token from a `Bearer <token>` header.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<&str, AuthError> {
    let header = auth_header.ok_or_else(|| AuthError::Unauthenticated("missing authorization".to_string()))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::Unauthenticated("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Unauthenticated("invalid authorization header".to_string()));
    }
    Ok(token)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
