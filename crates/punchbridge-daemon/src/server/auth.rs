//! API-key gate for the drain endpoints.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::storage::SettingKey;

use super::error::ApiError;
use super::AppState;

/// Proof that the request carried the configured cloud API key.
///
/// Use as an extractor parameter on any handler that requires the key:
///
/// ```ignore
/// async fn drain(_key: ApiKey, State(state): State<AppState>) -> ... { ... }
/// ```
///
/// Rejections: 401 when the header is missing, 503 when no key has been
/// configured yet, 403 on mismatch. The comparison is constant-time.
#[derive(Debug, Clone, Copy)]
pub struct ApiKey;

impl FromRequestParts<AppState> for ApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::unauthorized("API key required. Provide it in the X-API-Key header.")
            })?;

        let configured = state
            .db
            .get_setting(SettingKey::CloudApiKey)
            .await
            .map_err(ApiError::from)?
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ApiError::unavailable(
                    "API key not configured. Set cloudApiKey in the agent settings.",
                )
            })?;

        if !constant_time_str_eq(provided, &configured) {
            return Err(ApiError::forbidden("Invalid API key"));
        }

        Ok(Self)
    }
}

/// Constant-time string equality comparison.
///
/// Compares byte-by-byte using `subtle::ConstantTimeEq` so the comparison
/// never leaks which character differs. The length check returns early,
/// leaking only whether the lengths match.
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
