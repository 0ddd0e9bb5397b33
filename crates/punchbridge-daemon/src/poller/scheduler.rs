//! The poll scheduler: a single-flight, interval-driven sweep across all
//! active devices.
//!
//! One timer task drives `sync_all` at the configured period (plus one
//! immediate sweep on start). Sweeps are single-flight: a second caller
//! while one is in progress gets an empty result vector instead of a second
//! sweep. Devices are polled sequentially, in name order; a failing device
//! is logged and skipped, never aborting the sweep.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};

use punchbridge_core::time::now_rfc3339;

use crate::device::{DeviceError, DeviceSession};
use crate::storage::{Database, Device, NewPunch, StoreError, SyncLogStatus};

use super::events::{SyncEvent, SyncResult};

/// Errors from one device's pull, unified for sync-log messages.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct TimerHandle {
    shutdown: watch::Sender<bool>,
}

struct Inner {
    db: Database,
    interval_minutes: AtomicU32,
    syncing: AtomicBool,
    timer: Mutex<Option<TimerHandle>>,
    events: broadcast::Sender<SyncEvent>,
}

/// Handle to the scheduler. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct PollScheduler {
    inner: Arc<Inner>,
}

impl PollScheduler {
    pub fn new(db: Database, interval_minutes: u32) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                db,
                interval_minutes: AtomicU32::new(interval_minutes.max(1)),
                syncing: AtomicBool::new(false),
                timer: Mutex::new(None),
                events,
            }),
        }
    }

    /// Subscribe to sweep lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::SeqCst)
    }

    pub async fn is_running(&self) -> bool {
        self.inner.timer.lock().await.is_some()
    }

    pub fn interval_minutes(&self) -> u32 {
        self.inner.interval_minutes.load(Ordering::SeqCst)
    }

    /// Arm the periodic timer and kick an immediate sweep. No-op when
    /// already running.
    pub async fn start(&self) {
        let mut timer = self.inner.timer.lock().await;
        if timer.is_some() {
            debug!("Scheduler already running");
            return;
        }
        info!(
            interval_minutes = self.interval_minutes(),
            "Scheduler started"
        );
        *timer = Some(self.spawn_timer(true));
    }

    /// Cancel the timer. An in-flight sweep is allowed to finish.
    pub async fn stop(&self) {
        let mut timer = self.inner.timer.lock().await;
        if let Some(handle) = timer.take() {
            let _ = handle.shutdown.send(true);
            info!("Scheduler stopped");
        }
    }

    /// Change the poll period. When running, the timer restarts at the new
    /// period (without an extra immediate sweep).
    pub async fn set_interval(&self, minutes: u32) {
        self.inner
            .interval_minutes
            .store(minutes.max(1), Ordering::SeqCst);
        let mut timer = self.inner.timer.lock().await;
        if let Some(handle) = timer.take() {
            let _ = handle.shutdown.send(true);
            *timer = Some(self.spawn_timer(false));
            info!(interval_minutes = minutes, "Poll interval updated");
        }
    }

    fn spawn_timer(&self, immediate: bool) -> TimerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scheduler = self.clone();

        tokio::spawn(async move {
            let period = Duration::from_secs(u64::from(scheduler.interval_minutes()) * 60);
            let mut timer = tokio::time::interval(period);
            if !immediate {
                timer.tick().await; // Skip first immediate tick
            }

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        scheduler.sync_all().await;
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("Poll timer exiting");
                        return;
                    }
                }
            }
        });

        TimerHandle {
            shutdown: shutdown_tx,
        }
    }

    /// Sweep every active device once. Single-flight: when a sweep is
    /// already in progress, returns an empty vector immediately.
    pub async fn sync_all(&self) -> Vec<SyncResult> {
        if self
            .inner
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Sweep already in flight; skipping");
            return Vec::new();
        }

        let results = self.run_sweep().await;
        self.inner.syncing.store(false, Ordering::SeqCst);
        results
    }

    /// Poll a single device ad-hoc, outside the single-flight guard.
    pub async fn sync_one(&self, device_id: i64) -> Result<SyncResult, StoreError> {
        let device = self.inner.db.get_device(device_id).await?;
        Ok(self.sync_device(&device).await)
    }

    async fn run_sweep(&self) -> Vec<SyncResult> {
        let devices = match self.inner.db.list_devices(true).await {
            Ok(devices) => devices,
            Err(e) => {
                error!(error = %e, "Sweep aborted: cannot list devices");
                return Vec::new();
            }
        };

        let _ = self.inner.events.send(SyncEvent::SyncStarted {
            device_count: devices.len() as u32,
        });
        info!(device_count = devices.len(), "Sweep started");

        let mut results = Vec::with_capacity(devices.len());
        for device in &devices {
            let result = self.sync_device(device).await;
            let _ = self.inner.events.send(SyncEvent::DeviceSynced {
                result: result.clone(),
            });
            results.push(result);
        }

        let _ = self.inner.events.send(SyncEvent::SyncCompleted {
            results: results.clone(),
        });
        info!(
            device_count = results.len(),
            failures = results.iter().filter(|r| !r.success).count(),
            "Sweep completed"
        );

        results
    }

    async fn sync_device(&self, device: &Device) -> SyncResult {
        let started = Instant::now();

        match self.pull_device(device).await {
            Ok((added, total)) => {
                let elapsed_ms = started.elapsed().as_millis();
                let message = format!("Pulled {total} records ({added} new) in {elapsed_ms} ms");
                info!(
                    device = %device.name,
                    total,
                    added,
                    elapsed_ms = elapsed_ms as u64,
                    "Device sweep complete"
                );
                if let Err(e) = self
                    .inner
                    .db
                    .add_sync_log(device.id, added, SyncLogStatus::Success, &message)
                    .await
                {
                    warn!(error = %e, "Failed to record sync log");
                }
                SyncResult {
                    device_id: device.id,
                    device_name: device.name.clone(),
                    success: true,
                    records_added: added,
                    total_records: total,
                    error: None,
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!(
                    device = %device.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %message,
                    "Device sweep failed"
                );
                if let Err(log_err) = self
                    .inner
                    .db
                    .add_sync_log(device.id, 0, SyncLogStatus::Error, &message)
                    .await
                {
                    warn!(error = %log_err, "Failed to record sync log");
                }
                SyncResult {
                    device_id: device.id,
                    device_name: device.name.clone(),
                    success: false,
                    records_added: 0,
                    total_records: 0,
                    error: Some(message),
                }
            }
        }
    }

    /// Connect, fetch, disconnect, then persist. Returns
    /// `(rows inserted, records returned)`.
    async fn pull_device(&self, device: &Device) -> Result<(u64, u64), SweepError> {
        let mut session = DeviceSession::new(device.ip.clone(), device.port);
        session.connect().await?;
        let records = session.get_attendance().await?;
        session.disconnect().await;

        let total = records.len() as u64;
        let punches: Vec<NewPunch> = records
            .iter()
            .map(|record| NewPunch::from_record(device.id, record))
            .collect();
        let added = self.inner.db.add_punches_bulk(&punches).await?;

        self.inner
            .db
            .touch_device_last_sync(device.id, &now_rfc3339())
            .await?;

        Ok((added, total))
    }
}
