#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! Integration tests for the drain HTTP surface: the API-key gate, the
//! two-phase sync/mark-synced round trip, and the health endpoint.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use punchbridge_daemon::server::{build_router, AppState};
use punchbridge_daemon::storage::{Database, NewPunch, SettingKey};

const KEY: &str = "s3cret-drain-key";

async fn state_with_key() -> AppState {
    let db = Database::open_in_memory().await.unwrap();
    db.set_setting(SettingKey::CloudApiKey, KEY).await.unwrap();
    AppState { db }
}

fn punch(user_id: &str, timestamp: &str) -> NewPunch {
    NewPunch {
        device_id: 1,
        order_id: 0,
        order_id2: 0,
        order_id3: 0,
        user_id: user_id.to_string(),
        timestamp: timestamp.to_string(),
        status: 0,
        punch: 0,
    }
}

/// Seed three unsynced punches on distinct days, oldest first.
async fn seed_three(state: &AppState) {
    state
        .db
        .add_punches_bulk(&[
            punch("a", "2022-06-01T08:00:00Z"),
            punch("b", "2022-06-02T08:00:00Z"),
            punch("c", "2022-06-03T08:00:00Z"),
        ])
        .await
        .unwrap();
}

/// Send a request and return (status, parsed JSON body).
async fn send(
    state: &AppState,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for &(name, value) in headers {
        builder = builder.header(name, value);
    }
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = build_router(state.clone())
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, parsed)
}

async fn get_sync(state: &AppState, uri: &str) -> (StatusCode, Value) {
    send(state, "GET", uri, &[("x-api-key", KEY)], None).await
}

// =========================================================================
// Health
// =========================================================================

#[tokio::test]
async fn health_is_open_and_versioned() {
    let state = state_with_key().await;
    let (status, body) = send(&state, "GET", "/api/health", &[], None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], "1.0.0");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

// =========================================================================
// API-key middleware
// =========================================================================

#[tokio::test]
async fn missing_key_is_401() {
    let state = state_with_key().await;
    let (status, body) = send(&state, "GET", "/api/attendance/sync", &[], None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("API key required"));
}

#[tokio::test]
async fn unconfigured_key_is_503() {
    let db = Database::open_in_memory().await.unwrap();
    let state = AppState { db };
    let (status, body) = send(
        &state,
        "GET",
        "/api/attendance/sync",
        &[("x-api-key", "anything")],
        None,
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("API key not configured"));
}

#[tokio::test]
async fn wrong_key_is_403() {
    let state = state_with_key().await;
    let (status, body) = send(
        &state,
        "GET",
        "/api/attendance/sync",
        &[("x-api-key", "wrong")],
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Invalid API key");
}

#[tokio::test]
async fn correct_key_is_200() {
    let state = state_with_key().await;
    let (status, body) = get_sync(&state, "/api/attendance/sync").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 0);
}

// =========================================================================
// Drain round trip
// =========================================================================

#[tokio::test]
async fn drain_round_trip_marks_and_excludes() {
    let state = state_with_key().await;
    seed_three(&state).await;

    // Phase one: drain everything unsynced, newest-first.
    let (status, body) = get_sync(&state, "/api/attendance/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data[0]["userId"], "c");
    assert_eq!(data[2]["userId"], "a");

    let newest_id = data[0]["id"].as_i64().unwrap();
    let older_ids: Vec<i64> = data[1..]
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();

    // Phase two: acknowledge the two older punches.
    let (status, body) = send(
        &state,
        "POST",
        "/api/attendance/mark-synced",
        &[("x-api-key", KEY)],
        Some(json!({ "ids": older_ids })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Marked 2 records as synced");

    // Acknowledged ids never come back.
    let (_, body) = get_sync(&state, "/api/attendance/sync").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["id"], newest_id);

    // Re-acknowledging, with an unknown id thrown in, is a no-op.
    let mut all_ids = older_ids;
    all_ids.push(newest_id);
    all_ids.push(999);
    let (status, _) = send(
        &state,
        "POST",
        "/api/attendance/mark-synced",
        &[("x-api-key", KEY)],
        Some(json!({ "ids": all_ids })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get_sync(&state, "/api/attendance/sync").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn since_bounds_the_drain_inclusively() {
    let state = state_with_key().await;
    seed_three(&state).await;

    let (_, body) = get_sync(
        &state,
        "/api/attendance/sync?since=2022-06-02T08:00:00Z",
    )
    .await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["userId"], "c");
    assert_eq!(body["data"][1]["userId"], "b");
}

#[tokio::test]
async fn limit_caps_the_page() {
    let state = state_with_key().await;
    seed_three(&state).await;

    let (_, body) = get_sync(&state, "/api/attendance/sync?limit=1").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["userId"], "c");
}

#[tokio::test]
async fn punches_carry_the_contract_field_names() {
    let state = state_with_key().await;
    seed_three(&state).await;

    let (_, body) = get_sync(&state, "/api/attendance/sync?limit=1").await;
    let punch = &body["data"][0];
    assert!(punch.get("deviceId").is_some());
    assert!(punch.get("oderId").is_some());
    assert!(punch.get("oderId2").is_some());
    assert!(punch.get("oderId3").is_some());
    assert!(punch.get("syncedToCloud").is_some());
    assert!(punch.get("createdAt").is_some());
}

// =========================================================================
// mark-synced input validation
// =========================================================================

#[tokio::test]
async fn empty_ids_is_400() {
    let state = state_with_key().await;
    let (status, body) = send(
        &state,
        "POST",
        "/api/attendance/mark-synced",
        &[("x-api-key", KEY)],
        Some(json!({ "ids": [] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ids array is required");
}

#[tokio::test]
async fn missing_or_malformed_body_is_400() {
    let state = state_with_key().await;

    let (status, body) = send(
        &state,
        "POST",
        "/api/attendance/mark-synced",
        &[("x-api-key", KEY)],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ids array is required");

    let (status, _) = send(
        &state,
        "POST",
        "/api/attendance/mark-synced",
        &[("x-api-key", KEY)],
        Some(json!({ "ids": "not-an-array" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =========================================================================
// CORS
// =========================================================================

#[tokio::test]
async fn preflight_is_allowed_from_any_origin() {
    let state = state_with_key().await;

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/attendance/sync")
        .header("origin", "https://cloud.example.com")
        .header("access-control-request-method", "GET")
        .header("access-control-request-headers", "x-api-key")
        .body(Body::empty())
        .unwrap();

    let response = build_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}
