//! Sweep progress events for UI subscribers.
//!
//! The three events are a stable contract: `sync-started` opens a sweep,
//! one `device-synced` follows per device, and `sync-completed` closes it.

use serde::Serialize;

/// Outcome of polling one device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub device_id: i64,
    pub device_name: String,
    pub success: bool,
    /// Rows actually inserted (after de-duplication).
    pub records_added: u64,
    /// Records the device returned, duplicates included.
    pub total_records: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Sweep lifecycle events, broadcast to any subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum SyncEvent {
    SyncStarted { device_count: u32 },
    DeviceSynced { result: SyncResult },
    SyncCompleted { results: Vec<SyncResult> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_kebab_case_tags() {
        let event = SyncEvent::SyncStarted { device_count: 3 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "sync-started");
        assert_eq!(json["data"]["deviceCount"], 3);
    }

    #[test]
    fn device_synced_carries_the_result() {
        let event = SyncEvent::DeviceSynced {
            result: SyncResult {
                device_id: 1,
                device_name: "Gate A".into(),
                success: false,
                records_added: 0,
                total_records: 0,
                error: Some("connect timed out".into()),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "device-synced");
        assert_eq!(json["data"]["result"]["deviceName"], "Gate A");
        assert_eq!(json["data"]["result"]["error"], "connect timed out");
    }
}
