//! Database models for the punchbridge store.
//!
//! JSON field names follow the upstream drain contract (`deviceId`,
//! `oderId`, `syncedToCloud`, ...), hence the serde renames.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use punchbridge_core::time::naive_as_utc_rfc3339;
use punchbridge_proto::AttendanceRecord;

/// A registered terminal.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub location: String,
    pub active: bool,
    pub last_sync: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One biometric attendance event pulled from a device.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Punch {
    pub id: i64,
    pub device_id: i64,
    #[serde(rename = "oderId")]
    pub order_id: u16,
    #[serde(rename = "oderId2")]
    pub order_id2: u16,
    #[serde(rename = "oderId3")]
    pub order_id3: u16,
    pub user_id: String,
    /// RFC 3339 UTC, second resolution.
    pub timestamp: String,
    pub status: u8,
    pub punch: u8,
    pub synced_to_cloud: bool,
    pub created_at: String,
}

/// A punch about to be inserted; the surrogate id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewPunch {
    pub device_id: i64,
    pub order_id: u16,
    pub order_id2: u16,
    pub order_id3: u16,
    pub user_id: String,
    pub timestamp: String,
    pub status: u8,
    pub punch: u8,
}

impl NewPunch {
    /// Build an insertable punch from a decoded wire record.
    ///
    /// The naive device wall-clock is formatted as if it were UTC.
    pub fn from_record(device_id: i64, record: &AttendanceRecord) -> Self {
        Self {
            device_id,
            order_id: record.order_id,
            order_id2: record.order_id2,
            order_id3: record.order_id3,
            user_id: record.user_id.clone(),
            timestamp: naive_as_utc_rfc3339(record.timestamp),
            status: record.status,
            punch: record.punch,
        }
    }
}

/// Filters for punch listing and counting. All fields combine with AND.
#[derive(Debug, Clone, Default)]
pub struct PunchFilter {
    pub device_id: Option<i64>,
    pub user_id: Option<String>,
    /// Inclusive lower bound, compared as RFC 3339 text.
    pub start_date: Option<String>,
    /// Inclusive upper bound, compared as RFC 3339 text.
    pub end_date: Option<String>,
    pub synced_to_cloud: Option<bool>,
}

/// Per-sweep, per-device audit row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub id: i64,
    pub device_id: i64,
    pub sync_type: String,
    pub records_count: i64,
    pub status: String,
    pub message: String,
    pub created_at: String,
}

/// Outcome of a sync-log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncLogStatus {
    Success,
    Error,
}

impl SyncLogStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncLogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Store-wide counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_devices: u64,
    pub active_devices: u64,
    pub total_punches: u64,
    pub today_punches: u64,
    pub unsynced_count: u64,
}

/// The enumerated runtime settings. Unknown keys are rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    ApiPort,
    PollInterval,
    CloudApiKey,
}

impl SettingKey {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ApiPort => "apiPort",
            Self::PollInterval => "pollInterval",
            Self::CloudApiKey => "cloudApiKey",
        }
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejection for setting keys outside the enumerated set.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown setting key: {0}")]
pub struct UnknownSettingKey(pub String);

impl FromStr for SettingKey {
    type Err = UnknownSettingKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apiPort" => Ok(Self::ApiPort),
            "pollInterval" => Ok(Self::PollInterval),
            "cloudApiKey" => Ok(Self::CloudApiKey),
            other => Err(UnknownSettingKey(other.to_string())),
        }
    }
}

/// Snapshot of the runtime settings with defaults applied.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP listen port. Default 3000.
    pub api_port: u16,
    /// Poll period in minutes. Default 5.
    pub poll_interval: u32,
    /// Opaque drain secret; `None` until the operator configures one.
    pub cloud_api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_port: 3000,
            poll_interval: 5,
            cloud_api_key: None,
        }
    }
}
