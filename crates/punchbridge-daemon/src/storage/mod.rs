//! SQLite record store: devices, punches, sync logs, settings.

mod db;
mod models;
mod queries;

pub use db::Database;
pub use models::{
    Device, NewPunch, Punch, PunchFilter, SettingKey, Settings, StoreStats, SyncLogEntry,
    SyncLogStatus, UnknownSettingKey,
};
pub use punchbridge_core::db::StoreError;
