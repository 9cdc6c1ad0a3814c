// gestao-api/src/lib.rs
// ============================================================================
// Module: Gestão 360 API Library
// Description: HTTP surface for the schema-tolerant record store.
// Purpose: Expose catalog entities as JSON collections with fail-closed auth.
// Dependencies: axum, gestao-config, gestao-store, tokio
// ============================================================================

//! ## Overview
//! `gestao-api` maps the entity catalog onto REST-style JSON routes. Every
//! store call runs on the blocking pool, and store failures translate into
//! stable `{error, message}` bodies.
//! Security posture: requests are untrusted; see [`auth`] for the trust
//! boundary.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod error;
pub mod routes;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::AuthError;
pub use auth::RequestAuthz;
pub use error::ApiError;
pub use routes::ApiState;
pub use routes::router;
pub use server::ApiServer;
pub use server::ApiServerError;
pub use server::build_diagnostic_sink;
