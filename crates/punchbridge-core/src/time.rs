//! RFC 3339 time helpers.
//!
//! Every timestamp the store persists and the HTTP surface serves is an
//! RFC 3339 string with second resolution and a `Z` suffix. Using one fixed
//! format keeps lexicographic ordering equal to chronological ordering,
//! which the store's date filters rely on.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Current UTC time as an RFC 3339 string (`2026-08-02T10:15:00Z`).
pub fn now_rfc3339() -> String {
    to_rfc3339(Utc::now())
}

/// Format a UTC timestamp as an RFC 3339 string with second resolution.
pub fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Treat a naive wall-clock value as UTC and format it as RFC 3339.
///
/// Device timestamps are naive local wall-clock on the terminal; the store
/// formats them as if they were UTC.
pub fn naive_as_utc_rfc3339(naive: NaiveDateTime) -> String {
    to_rfc3339(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

/// Today's UTC date as `YYYY-MM-DD`.
pub fn today_utc() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
