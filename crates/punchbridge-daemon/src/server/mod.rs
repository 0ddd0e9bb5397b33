//! The drain HTTP surface.
//!
//! A narrow, API-key-gated API for the upstream cloud drainer:
//! `GET /api/attendance/sync` hands out unsynced punches and
//! `POST /api/attendance/mark-synced` acknowledges them, forming a
//! two-phase, at-least-once cursor. `GET /api/health` is open.

mod auth;
mod error;
mod routes;

pub use auth::{constant_time_str_eq, ApiKey};
pub use error::ApiError;

use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::storage::Database;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

/// Build the application router. The production binary and the integration
/// tests use this same function so the middleware stack never diverges.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-api-key")]);

    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/attendance/sync", get(routes::sync_attendance))
        .route("/api/attendance/mark-synced", post(routes::mark_synced))
        .layer(cors)
        .with_state(state)
}
