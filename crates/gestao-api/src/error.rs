// gestao-api/src/error.rs
// ============================================================================
// Module: API Errors
// Description: Wire-level error mapping for the record API.
// Purpose: Translate store failures into stable status codes and bodies.
// Dependencies: axum, gestao-store, serde
// ============================================================================

//! ## Overview
//! Every failure leaves the API as `{"error": <kind>, "message": <text>}`.
//! The `error` label is stable and machine-readable; the status code follows
//! the store error kind.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use gestao_store::StoreError;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// API request failures.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Store-level failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The collection is not in the entity catalog.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    /// The request body or parameters are malformed.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The request body exceeds the configured limit.
    #[error("request body too large")]
    PayloadTooLarge,
    /// The caller was not admitted by the auth policy.
    #[error("{0}")]
    Unauthenticated(String),
    /// Internal failure outside the store (for example a panicked task).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the HTTP status and stable label for the error.
    #[must_use]
    pub const fn status(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Store(error) => match error {
                StoreError::RecordNotFound {
                    ..
                } => (StatusCode::NOT_FOUND, error.kind()),
                StoreError::NoPersistableFields {
                    ..
                } => (StatusCode::UNPROCESSABLE_ENTITY, error.kind()),
                StoreError::MissingColumn {
                    ..
                }
                | StoreError::Invalid(_) => (StatusCode::BAD_REQUEST, error.kind()),
                StoreError::UnknownTable(_) => (StatusCode::SERVICE_UNAVAILABLE, error.kind()),
                StoreError::Db(_) | StoreError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, error.kind()),
            },
            Self::UnknownCollection(_) => (StatusCode::NOT_FOUND, "unknown_collection"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            Self::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::BadRequest(rejection.body_text())
        }
    }
}

/// Serialized error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Stable error label.
    error: &'static str,
    /// Human-readable message.
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, label) = self.status();
        let body = ErrorBody {
            error: label,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
