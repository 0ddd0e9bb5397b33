//! Store queries: devices, punches, sync logs, settings.

use punchbridge_core::db::StoreError;
use punchbridge_core::time::{now_rfc3339, today_utc};

use super::db::Database;
use super::models::{
    Device, NewPunch, Punch, PunchFilter, SettingKey, Settings, StoreStats, SyncLogEntry,
    SyncLogStatus,
};

/// Sync-log ring buffer size.
const SYNC_LOG_CAP: i64 = 1000;

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

impl Database {
    // =========================================================================
    // Device queries
    // =========================================================================

    /// Register a new device. `(ip, port)` must be unique.
    pub async fn add_device(
        &self,
        name: &str,
        ip: &str,
        port: u16,
        location: &str,
        active: bool,
    ) -> Result<Device, StoreError> {
        let now = now_rfc3339();

        let result = sqlx::query(
            "INSERT INTO devices (name, ip, port, location, active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(ip)
        .bind(port)
        .bind(location)
        .bind(active)
        .bind(&now)
        .bind(&now)
        .execute(self.pool())
        .await;

        match result {
            Ok(r) => self.get_device(r.last_insert_rowid()).await,
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                "Device at {ip}:{port} already exists"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a device by id.
    pub async fn get_device(&self, id: i64) -> Result<Device, StoreError> {
        sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Device {id}")))
    }

    /// List devices, name order. With `active_only`, inactive devices are
    /// skipped (this is what the scheduler sweeps over).
    pub async fn list_devices(&self, active_only: bool) -> Result<Vec<Device>, StoreError> {
        let devices = if active_only {
            sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE active = 1 ORDER BY name")
                .fetch_all(self.pool())
                .await?
        } else {
            sqlx::query_as::<_, Device>("SELECT * FROM devices ORDER BY name")
                .fetch_all(self.pool())
                .await?
        };

        Ok(devices)
    }

    /// Atomically fetch-then-update a device inside a single transaction.
    ///
    /// Only the fields that are `Some(…)` are changed; `None` means "keep
    /// the existing value".
    pub async fn update_device_partial(
        &self,
        id: i64,
        name: Option<&str>,
        ip: Option<&str>,
        port: Option<u16>,
        location: Option<&str>,
        active: Option<bool>,
    ) -> Result<Device, StoreError> {
        let mut tx = self.pool().begin().await?;

        let existing = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Device {id}")))?;

        let final_name = name.unwrap_or(&existing.name);
        let final_ip = ip.unwrap_or(&existing.ip);
        let final_port = port.unwrap_or(existing.port);
        let final_location = location.unwrap_or(&existing.location);
        let final_active = active.unwrap_or(existing.active);
        let now = now_rfc3339();

        let result = sqlx::query(
            "UPDATE devices SET name = ?, ip = ?, port = ?, location = ?, active = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(final_name)
        .bind(final_ip)
        .bind(final_port)
        .bind(final_location)
        .bind(final_active)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::Conflict(format!(
                    "Device at {final_ip}:{final_port} already exists"
                )));
            }
            Err(e) => return Err(e.into()),
        }

        let updated = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Remove a device. Its punches stay drainable.
    pub async fn delete_device(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stamp a device's last successful sync time.
    pub async fn touch_device_last_sync(&self, id: i64, when: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE devices SET last_sync = ?, updated_at = ? WHERE id = ?")
            .bind(when)
            .bind(now_rfc3339())
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    // =========================================================================
    // Punch queries
    // =========================================================================

    /// Insert one punch. Returns 1 when inserted, 0 when the natural key
    /// `(deviceId, oderId, oderId2, oderId3, userId, timestamp)` already
    /// exists.
    pub async fn add_punch(&self, punch: &NewPunch) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO punches \
             (device_id, order_id, order_id2, order_id3, user_id, timestamp, status, punch, \
              synced_to_cloud, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(punch.device_id)
        .bind(punch.order_id)
        .bind(punch.order_id2)
        .bind(punch.order_id3)
        .bind(&punch.user_id)
        .bind(&punch.timestamp)
        .bind(punch.status)
        .bind(punch.punch)
        .bind(now_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Insert a batch of punches atomically. Returns the number actually
    /// inserted; duplicates of the natural key are ignored. Readers never
    /// observe a partial batch.
    pub async fn add_punches_bulk(&self, punches: &[NewPunch]) -> Result<u64, StoreError> {
        let mut tx = self.pool().begin().await?;
        let now = now_rfc3339();
        let mut inserted = 0u64;

        for punch in punches {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO punches \
                 (device_id, order_id, order_id2, order_id3, user_id, timestamp, status, punch, \
                  synced_to_cloud, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?)",
            )
            .bind(punch.device_id)
            .bind(punch.order_id)
            .bind(punch.order_id2)
            .bind(punch.order_id3)
            .bind(&punch.user_id)
            .bind(&punch.timestamp)
            .bind(punch.status)
            .bind(punch.punch)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;

        Ok(inserted)
    }

    /// List punches matching the filter, newest-first by timestamp.
    ///
    /// When `limit` is 0 it is treated as "no limit" (`SQLite` `LIMIT -1`).
    pub async fn list_punches(
        &self,
        filter: &PunchFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Punch>, StoreError> {
        let mut sql = String::from("SELECT * FROM punches");
        push_filter_sql(&mut sql, filter);
        sql.push_str(" ORDER BY timestamp DESC LIMIT ? OFFSET ?");

        let effective_limit: i64 = if limit == 0 { -1 } else { i64::from(limit) };
        let query = bind_filter(sqlx::query_as::<_, Punch>(&sql), filter)
            .bind(effective_limit)
            .bind(offset);

        Ok(query.fetch_all(self.pool()).await?)
    }

    /// Count punches matching the filter.
    pub async fn count_punches(&self, filter: &PunchFilter) -> Result<u64, StoreError> {
        let mut sql = String::from("SELECT COUNT(*) FROM punches");
        push_filter_sql(&mut sql, filter);

        let row: (i64,) = bind_filter(sqlx::query_as(&sql), filter)
            .fetch_one(self.pool())
            .await?;

        #[allow(clippy::cast_sign_loss)]
        Ok(row.0 as u64)
    }

    /// Punches not yet acknowledged by the upstream drainer, newest-first.
    pub async fn list_unsynced(&self, limit: u32) -> Result<Vec<Punch>, StoreError> {
        let filter = PunchFilter {
            synced_to_cloud: Some(false),
            ..PunchFilter::default()
        };
        self.list_punches(&filter, limit, 0).await
    }

    /// Flip the sync cursor for the given ids in one atomic statement.
    /// Unknown ids are ignored; re-marking already-synced ids is a no-op.
    /// Returns the number of matched rows.
    pub async fn mark_synced(&self, ids: &[i64]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("UPDATE punches SET synced_to_cloud = 1 WHERE id IN ({placeholders})");

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let result = query.execute(self.pool()).await?;
        Ok(result.rows_affected())
    }

    /// Purge all punches. Returns the number removed.
    pub async fn clear_punches(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM punches")
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Sync-log queries
    // =========================================================================

    /// Append a sync-log row and trim the ring buffer to the newest 1,000.
    pub async fn add_sync_log(
        &self,
        device_id: i64,
        records_count: u64,
        status: SyncLogStatus,
        message: &str,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await?;

        #[allow(clippy::cast_possible_wrap)]
        sqlx::query(
            "INSERT INTO sync_logs (device_id, sync_type, records_count, status, message, created_at) \
             VALUES (?, 'pull', ?, ?, ?, ?)",
        )
        .bind(device_id)
        .bind(records_count as i64)
        .bind(status.as_str())
        .bind(message)
        .bind(now_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM sync_logs WHERE id NOT IN \
             (SELECT id FROM sync_logs ORDER BY id DESC LIMIT ?)",
        )
        .bind(SYNC_LOG_CAP)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// List sync-log rows, newest-first.
    pub async fn list_sync_logs(&self, limit: u32) -> Result<Vec<SyncLogEntry>, StoreError> {
        let effective_limit: i64 = if limit == 0 { -1 } else { i64::from(limit) };
        let logs = sqlx::query_as::<_, SyncLogEntry>(
            "SELECT * FROM sync_logs ORDER BY id DESC LIMIT ?",
        )
        .bind(effective_limit)
        .fetch_all(self.pool())
        .await?;

        Ok(logs)
    }

    // =========================================================================
    // Stats
    // =========================================================================

    /// Store-wide counters.
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let total_devices = self.scalar("SELECT COUNT(*) FROM devices").await?;
        let active_devices = self
            .scalar("SELECT COUNT(*) FROM devices WHERE active = 1")
            .await?;
        let total_punches = self.scalar("SELECT COUNT(*) FROM punches").await?;
        let unsynced_count = self
            .scalar("SELECT COUNT(*) FROM punches WHERE synced_to_cloud = 0")
            .await?;

        let today = today_utc();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM punches WHERE timestamp LIKE ?")
            .bind(format!("{today}%"))
            .fetch_one(self.pool())
            .await?;
        #[allow(clippy::cast_sign_loss)]
        let today_punches = row.0 as u64;

        Ok(StoreStats {
            total_devices,
            active_devices,
            total_punches,
            today_punches,
            unsynced_count,
        })
    }

    async fn scalar(&self, sql: &str) -> Result<u64, StoreError> {
        let row: (i64,) = sqlx::query_as(sql).fetch_one(self.pool()).await?;
        #[allow(clippy::cast_sign_loss)]
        Ok(row.0 as u64)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Read one setting value, `None` when unset.
    pub async fn get_setting(&self, key: SettingKey) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key.as_str())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|(v,)| v))
    }

    /// Write one setting value (upsert).
    pub async fn set_setting(&self, key: SettingKey, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key.as_str())
        .bind(value)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Snapshot of all runtime settings with defaults applied. Unparsable
    /// numeric values fall back to the defaults.
    pub async fn settings(&self) -> Result<Settings, StoreError> {
        let defaults = Settings::default();

        let api_port = self
            .get_setting(SettingKey::ApiPort)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.api_port);

        let poll_interval = self
            .get_setting(SettingKey::PollInterval)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.poll_interval);

        let cloud_api_key = self
            .get_setting(SettingKey::CloudApiKey)
            .await?
            .filter(|v| !v.is_empty());

        Ok(Settings {
            api_port,
            poll_interval,
            cloud_api_key,
        })
    }
}

/// Append the WHERE clause for a punch filter. Bind order must match
/// [`bind_filter`].
fn push_filter_sql(sql: &mut String, filter: &PunchFilter) {
    sql.push_str(" WHERE 1=1");
    if filter.device_id.is_some() {
        sql.push_str(" AND device_id = ?");
    }
    if filter.user_id.is_some() {
        sql.push_str(" AND user_id = ?");
    }
    if filter.start_date.is_some() {
        sql.push_str(" AND timestamp >= ?");
    }
    if filter.end_date.is_some() {
        sql.push_str(" AND timestamp <= ?");
    }
    if filter.synced_to_cloud.is_some() {
        sql.push_str(" AND synced_to_cloud = ?");
    }
}

/// Bind the filter values in the order [`push_filter_sql`] emitted them.
fn bind_filter<'q, O>(
    mut query: sqlx::query::QueryAs<'q, sqlx::Sqlite, O, sqlx::sqlite::SqliteArguments<'q>>,
    filter: &'q PunchFilter,
) -> sqlx::query::QueryAs<'q, sqlx::Sqlite, O, sqlx::sqlite::SqliteArguments<'q>> {
    if let Some(device_id) = filter.device_id {
        query = query.bind(device_id);
    }
    if let Some(user_id) = &filter.user_id {
        query = query.bind(user_id);
    }
    if let Some(start) = &filter.start_date {
        query = query.bind(start);
    }
    if let Some(end) = &filter.end_date {
        query = query.bind(end);
    }
    if let Some(synced) = filter.synced_to_cloud {
        query = query.bind(synced);
    }
    query
}
