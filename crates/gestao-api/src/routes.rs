// gestao-api/src/routes.rs
// ============================================================================
// Module: Record Routes
// Description: Axum router and handlers for catalog collections.
// Purpose: Expose list/get/create/update/delete/toggle/summary per entity.
// Dependencies: axum, gestao-store, tokio, tower-http
// ============================================================================

//! ## Overview
//! Collections are addressed by catalog name. Handlers resolve the entity
//! descriptor, move the store call onto the blocking pool, and return JSON.
//!
//! Query strings on list requests become equality filters. Values `true` and
//! `false` become booleans, `null` becomes SQL `NULL`, canonical integer
//! literals become integers, and anything else is compared as text. A literal
//! that does not print back unchanged (`0123`, `+5`) stays text, so
//! zero-prefixed document numbers keep their leading zeros.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use axum::routing::patch;
use axum::routing::post;
use gestao_store::EntityCatalog;
use gestao_store::EntityDescriptor;
use gestao_store::EntitySummary;
use gestao_store::InsertOutcome;
use gestao_store::Record;
use gestao_store::SchemaDrift;
use gestao_store::SqliteRecordStore;
use gestao_store::StoreError;
use gestao_store::UpdateOutcome;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::RequestAuthz;
use crate::auth::require_auth;
use crate::error::ApiError;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state for API handlers.
#[derive(Debug, Clone)]
pub struct ApiState {
    /// Record store.
    store: SqliteRecordStore,
    /// Entity catalog.
    catalog: EntityCatalog,
}

impl ApiState {
    /// Builds handler state.
    #[must_use]
    pub const fn new(store: SqliteRecordStore, catalog: EntityCatalog) -> Self {
        Self {
            store,
            catalog,
        }
    }

    /// Returns the record store.
    #[must_use]
    pub const fn store(&self) -> &SqliteRecordStore {
        &self.store
    }

    /// Resolves a collection name to its descriptor.
    fn descriptor(&self, collection: &str) -> Result<Arc<EntityDescriptor>, ApiError> {
        self.catalog.get(collection).ok_or_else(|| ApiError::UnknownCollection(collection.to_string()))
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the API router.
///
/// `/health` is open; every other route passes through `authz`.
pub fn router(state: Arc<ApiState>, authz: Arc<RequestAuthz>, max_body_bytes: usize) -> Router {
    let guarded = Router::new()
        .route("/api/records/{collection}", get(list_records).post(create_record))
        .route("/api/records/{collection}/{id}", get(get_record).put(update_record).delete(delete_record))
        .route("/api/records/{collection}/{id}/toggle-active", patch(toggle_record))
        .route("/api/summary/{collection}", get(summarize))
        .route("/admin/schema/{collection}", get(schema_drift))
        .route("/admin/schema-cache/invalidate", post(invalidate_cache))
        .route_layer(middleware::from_fn_with_state(authz, require_auth));
    Router::new()
        .route("/health", get(health))
        .merge(guarded)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// SECTION: Response Bodies
// ============================================================================

/// Health response.
#[derive(Debug, Serialize)]
struct HealthBody {
    /// Readiness label.
    status: &'static str,
}

/// Delete response.
#[derive(Debug, Serialize)]
struct DeletedBody {
    /// Deleted key.
    deleted: Value,
}

/// Toggle response.
#[derive(Debug, Serialize)]
struct ToggledBody {
    /// New flag value.
    active: bool,
}

/// Optional invalidation request body.
#[derive(Debug, Default, Deserialize)]
struct InvalidateRequest {
    /// Table to invalidate; all tables when absent.
    #[serde(default)]
    table: Option<String>,
}

/// Invalidation response.
#[derive(Debug, Serialize)]
struct InvalidatedBody {
    /// Invalidated scope (`*` for all tables).
    scope: String,
    /// Number of cache entries dropped.
    invalidated: usize,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /health`.
async fn health(State(state): State<Arc<ApiState>>) -> Result<Json<HealthBody>, ApiError> {
    let store = state.store.clone();
    run_blocking(move || store.readiness()).await?;
    Ok(Json(HealthBody {
        status: "ok",
    }))
}

/// `GET /api/records/{collection}`.
async fn list_records(
    State(state): State<Arc<ApiState>>,
    Path(collection): Path<String>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let descriptor = state.descriptor(&collection)?;
    let filters = query_filters(query);
    let store = state.store.clone();
    let records = run_blocking(move || store.list(&descriptor, &filters)).await?;
    Ok(Json(records))
}

/// `GET /api/records/{collection}/{id}`.
async fn get_record(
    State(state): State<Arc<ApiState>>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Record>, ApiError> {
    let descriptor = state.descriptor(&collection)?;
    let key = parse_scalar(&id);
    let store = state.store.clone();
    let record = run_blocking(move || store.get(&descriptor, &key)).await?;
    Ok(Json(record))
}

/// `POST /api/records/{collection}`.
async fn create_record(
    State(state): State<Arc<ApiState>>,
    Path(collection): Path<String>,
    body: Result<Json<Record>, JsonRejection>,
) -> Result<(StatusCode, Json<InsertOutcome>), ApiError> {
    let descriptor = state.descriptor(&collection)?;
    let Json(record) = body?;
    let store = state.store.clone();
    let outcome = run_blocking(move || store.insert(&descriptor, record)).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `PUT /api/records/{collection}/{id}`.
async fn update_record(
    State(state): State<Arc<ApiState>>,
    Path((collection, id)): Path<(String, String)>,
    body: Result<Json<Record>, JsonRejection>,
) -> Result<Json<UpdateOutcome>, ApiError> {
    let descriptor = state.descriptor(&collection)?;
    let Json(record) = body?;
    let key = parse_scalar(&id);
    let store = state.store.clone();
    let outcome = run_blocking(move || store.update(&descriptor, &key, record)).await?;
    Ok(Json(outcome))
}

/// `DELETE /api/records/{collection}/{id}`.
async fn delete_record(
    State(state): State<Arc<ApiState>>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<DeletedBody>, ApiError> {
    let descriptor = state.descriptor(&collection)?;
    let key = parse_scalar(&id);
    let store = state.store.clone();
    let deleted = key.clone();
    run_blocking(move || store.delete(&descriptor, &key)).await?;
    Ok(Json(DeletedBody {
        deleted,
    }))
}

/// `PATCH /api/records/{collection}/{id}/toggle-active`.
async fn toggle_record(
    State(state): State<Arc<ApiState>>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<ToggledBody>, ApiError> {
    let descriptor = state.descriptor(&collection)?;
    let key = parse_scalar(&id);
    let store = state.store.clone();
    let active = run_blocking(move || store.toggle_flag(&descriptor, &key)).await?;
    Ok(Json(ToggledBody {
        active,
    }))
}

/// `GET /api/summary/{collection}`.
async fn summarize(
    State(state): State<Arc<ApiState>>,
    Path(collection): Path<String>,
) -> Result<Json<EntitySummary>, ApiError> {
    let descriptor = state.descriptor(&collection)?;
    let store = state.store.clone();
    let summary = run_blocking(move || store.summarize(&descriptor)).await?;
    Ok(Json(summary))
}

/// `GET /admin/schema/{collection}`.
async fn schema_drift(
    State(state): State<Arc<ApiState>>,
    Path(collection): Path<String>,
) -> Result<Json<SchemaDrift>, ApiError> {
    let descriptor = state.descriptor(&collection)?;
    let store = state.store.clone();
    let drift = run_blocking(move || store.drift(&descriptor)).await?;
    Ok(Json(drift))
}

/// `POST /admin/schema-cache/invalidate`.
async fn invalidate_cache(State(state): State<Arc<ApiState>>, body: Bytes) -> Result<Json<InvalidatedBody>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        InvalidateRequest::default()
    } else {
        serde_json::from_slice::<InvalidateRequest>(&body).map_err(|err| ApiError::BadRequest(err.to_string()))?
    };
    let invalidated = state.store.invalidate_schema(request.table.as_deref());
    let scope = request.table.unwrap_or_else(|| "*".to_string());
    info!(scope = %scope, invalidated, "schema cache invalidated via admin route");
    Ok(Json(InvalidatedBody {
        scope,
        invalidated,
    }))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Runs a store call on the blocking pool.
async fn run_blocking<T, F>(call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|err| ApiError::Internal(format!("store task failed: {err}")))?
        .map_err(ApiError::from)
}

/// Converts query parameters into store filters.
fn query_filters(query: BTreeMap<String, String>) -> Record {
    query.into_iter().map(|(key, value)| (key, parse_filter_value(&value))).collect()
}

/// Interprets a query-string value.
fn parse_filter_value(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => parse_scalar(raw),
    }
}

/// Interprets a path or query scalar: canonical integers stay numeric, the rest is text.
fn parse_scalar(raw: &str) -> Value {
    raw.parse::<i64>()
        .ok()
        .filter(|number| number.to_string() == raw)
        .map_or_else(|| Value::String(raw.to_string()), Value::from)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::Value;
    use serde_json::json;

    use super::parse_filter_value;
    use super::parse_scalar;
    use super::query_filters;

    #[test]
    fn scalars_keep_integers_numeric() {
        assert_eq!(parse_scalar("42"), json!(42));
        assert_eq!(parse_scalar("-7"), json!(-7));
        assert_eq!(parse_scalar("abc-1"), json!("abc-1"));
        assert_eq!(parse_scalar("1.5"), json!("1.5"));
    }

    #[test]
    fn non_canonical_integers_stay_text() {
        assert_eq!(parse_scalar("01234567890"), json!("01234567890"));
        assert_eq!(parse_scalar("0"), json!(0));
        assert_eq!(parse_scalar("+5"), json!("+5"));
        assert_eq!(parse_scalar("-0"), json!("-0"));
        assert_eq!(parse_filter_value("007"), json!("007"));
    }

    #[test]
    fn filter_values_recognize_literals() {
        assert_eq!(parse_filter_value("true"), Value::Bool(true));
        assert_eq!(parse_filter_value("false"), Value::Bool(false));
        assert_eq!(parse_filter_value("null"), Value::Null);
        assert_eq!(parse_filter_value("ATIVO"), json!("ATIVO"));
    }

    #[test]
    fn query_filters_preserve_every_key() {
        let mut query = BTreeMap::new();
        query.insert("status".to_string(), "ATIVO".to_string());
        query.insert("equipe_id".to_string(), "3".to_string());
        let filters = query_filters(query);
        assert_eq!(filters.len(), 2);
        assert_eq!(filters["equipe_id"], json!(3));
    }
}
