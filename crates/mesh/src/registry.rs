//! Shared device registry with passive liveness expiry.

use crate::placement::availability_score;
use crate::telemetry::{DeviceId, DeviceStatus, TelemetrySnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use time::{Duration, OffsetDateTime};

struct DeviceRecord {
    snapshot: TelemetrySnapshot,
    refreshed_at: OffsetDateTime,
}

/// Registry of the latest telemetry snapshot per device.
///
/// Updates are last-writer-wins per device id. Devices whose telemetry is
/// older than the liveness window are treated as absent, never zero-scored;
/// their existing replicas are not revoked. The registry is an injectable
/// value, not a global, so tests can drive it with synthetic snapshots.
pub struct DeviceRegistry {
    devices: RwLock<HashMap<DeviceId, DeviceRecord>>,
    liveness_window: Duration,
}

impl DeviceRegistry {
    pub fn new(liveness_window: Duration) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            liveness_window,
        }
    }

    /// Upsert a device's snapshot, refreshing its liveness timestamp.
    pub fn ingest(&self, snapshot: TelemetrySnapshot) {
        self.ingest_at(snapshot, OffsetDateTime::now_utc());
    }

    /// Upsert with an explicit timestamp. Used by tests to control expiry.
    pub fn ingest_at(&self, snapshot: TelemetrySnapshot, now: OffsetDateTime) {
        let mut devices = self.devices.write();
        devices.insert(
            snapshot.device_id.clone(),
            DeviceRecord {
                snapshot,
                refreshed_at: now,
            },
        );
    }

    /// Remove a device outright.
    pub fn remove(&self, device_id: &DeviceId) -> bool {
        self.devices.write().remove(device_id).is_some()
    }

    /// Point-in-time copy of all live devices.
    ///
    /// Placement scores against this copy so a registry mutating mid-decision
    /// cannot skew one computation.
    pub fn live_devices(&self) -> Vec<TelemetrySnapshot> {
        self.live_devices_at(OffsetDateTime::now_utc())
    }

    /// Live-device copy relative to an explicit `now`.
    pub fn live_devices_at(&self, now: OffsetDateTime) -> Vec<TelemetrySnapshot> {
        let cutoff = now - self.liveness_window;
        let devices = self.devices.read();
        let mut live: Vec<TelemetrySnapshot> = devices
            .values()
            .filter(|record| record.refreshed_at >= cutoff)
            .map(|record| record.snapshot.clone())
            .collect();
        live.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        live
    }

    /// Listing rows for observability UIs, live devices only, best score
    /// first.
    pub fn device_listing(&self) -> Vec<DeviceStatus> {
        self.device_listing_at(OffsetDateTime::now_utc())
    }

    pub fn device_listing_at(&self, now: OffsetDateTime) -> Vec<DeviceStatus> {
        let mut listing: Vec<DeviceStatus> = self
            .live_devices_at(now)
            .into_iter()
            .map(|snapshot| DeviceStatus {
                score: availability_score(&snapshot),
                device_id: snapshot.device_id,
                battery_percent: snapshot.battery_percent,
                cpu_load_percent: snapshot.cpu_load_percent,
                ram_usage_percent: snapshot.ram_usage_percent,
                is_plugged_in: snapshot.is_plugged_in,
            })
            .collect();
        listing.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.device_id.cmp(&b.device_id))
        });
        listing
    }

    /// Number of registered devices, including stale ones.
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}
