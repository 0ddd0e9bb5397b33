//! Drain and health handlers.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use punchbridge_core::time::now_rfc3339;

use crate::storage::PunchFilter;

use super::auth::ApiKey;
use super::error::ApiError;
use super::AppState;

/// Default page size for the drain endpoint.
const DEFAULT_SYNC_LIMIT: u32 = 1000;

/// `GET /api/health` -- liveness probe, no key required.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": now_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    /// Inclusive lower bound on the punch timestamp (RFC 3339).
    pub since: Option<String>,
    pub limit: Option<u32>,
}

/// `GET /api/attendance/sync?since=<ISO>&limit=<n>`
///
/// Unsynced punches with timestamp >= `since`, newest-first, up to `limit`.
pub async fn sync_attendance(
    _key: ApiKey,
    State(state): State<AppState>,
    Query(query): Query<SyncQuery>,
) -> Result<Json<Value>, ApiError> {
    let filter = PunchFilter {
        synced_to_cloud: Some(false),
        start_date: query.since,
        ..PunchFilter::default()
    };
    let limit = query.limit.unwrap_or(DEFAULT_SYNC_LIMIT);

    let punches = state.db.list_punches(&filter, limit, 0).await?;

    Ok(Json(json!({
        "success": true,
        "count": punches.len(),
        "data": punches,
    })))
}

/// `POST /api/attendance/mark-synced` with body `{"ids": [1, 2, ...]}`.
///
/// Flips the sync cursor for the given ids. Unknown ids are silently
/// ignored, so the drainer can re-acknowledge after a crash.
pub async fn mark_synced(
    _key: ApiKey,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let parsed: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let ids: Vec<i64> = parsed
        .get("ids")
        .and_then(Value::as_array)
        .map(|array| array.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();

    if ids.is_empty() {
        return Err(ApiError::bad_request("ids array is required"));
    }

    let marked = state.db.mark_synced(&ids).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Marked {marked} records as synced"),
    })))
}
