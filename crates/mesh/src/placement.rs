//! Availability scoring and capacity/diversity-aware replica placement.

use crate::telemetry::{DeviceId, TelemetrySnapshot};
use std::collections::HashSet;
use weft_core::ChunkAddress;

// Score weights. Power dominates: an unplugged device can disappear and
// take its replica with it, so it is discounted by remaining battery.
const WEIGHT_POWER: f64 = 0.40;
const WEIGHT_CPU: f64 = 0.15;
const WEIGHT_RAM: f64 = 0.15;
const WEIGHT_LINK: f64 = 0.20;
const WEIGHT_STORAGE: f64 = 0.10;

/// Storage headroom saturates once a device has this much free space.
const STORAGE_SATURATION_MB: f64 = 10_240.0;

fn clamp_unit(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Normalized availability score in `[0, 1]` for a candidate replica host.
///
/// Capacity is a filter, not a score component: a device without room for
/// the chunk is excluded outright by the scheduler before scoring.
pub fn availability_score(snapshot: &TelemetrySnapshot) -> f64 {
    let power = if snapshot.is_plugged_in {
        1.0
    } else {
        clamp_unit(snapshot.battery_percent / 100.0)
    };
    let cpu = 1.0 - clamp_unit(snapshot.cpu_load_percent / 100.0);
    let ram = 1.0 - clamp_unit(snapshot.ram_usage_percent / 100.0);
    let link = clamp_unit(snapshot.link_quality);
    let storage = clamp_unit(snapshot.available_storage_mb as f64 / STORAGE_SATURATION_MB);

    WEIGHT_POWER * power
        + WEIGHT_CPU * cpu
        + WEIGHT_RAM * ram
        + WEIGHT_LINK * link
        + WEIGHT_STORAGE * storage
}

/// How well a chunk's placement met the replication target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementStatus {
    /// Target replication factor reached.
    Full,
    /// Fewer eligible devices than the target; placed on all of them.
    UnderReplicated,
    /// No eligible device at all; zero placements, needs backfill.
    NoCapacity,
}

/// Advisory placement decision for one chunk.
#[derive(Clone, Debug)]
pub struct ChunkPlacement {
    pub address: ChunkAddress,
    pub devices: Vec<DeviceId>,
    pub status: PlacementStatus,
}

/// Picks replica holders for chunks from a live-device snapshot.
pub struct PlacementScheduler {
    replication_factor: u32,
}

impl PlacementScheduler {
    pub fn new(replication_factor: u32) -> Self {
        Self { replication_factor }
    }

    pub fn replication_factor(&self) -> u32 {
        self.replication_factor
    }

    /// Place one chunk on up to `replication_factor` devices.
    ///
    /// Eligibility requires enough free storage for the chunk; ranking is by
    /// score descending with device id as tie-break, so a fixed snapshot
    /// always yields the same answer. At most one device per declared
    /// failure domain; devices without a domain only need distinct ids.
    pub fn place(
        &self,
        devices: &[TelemetrySnapshot],
        address: ChunkAddress,
        chunk_size: u64,
    ) -> ChunkPlacement {
        let chunk_mb = (chunk_size as f64 / (1024.0 * 1024.0)).ceil() as u64;

        let mut ranked: Vec<(f64, &TelemetrySnapshot)> = devices
            .iter()
            .filter(|d| d.available_storage_mb >= chunk_mb)
            .map(|d| (availability_score(d), d))
            .collect();
        ranked.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.1.device_id.cmp(&b.1.device_id))
        });

        let mut selected = Vec::new();
        let mut used_domains: HashSet<&str> = HashSet::new();
        for (_, device) in &ranked {
            if selected.len() as u32 >= self.replication_factor {
                break;
            }
            if let Some(domain) = device.failure_domain.as_deref() {
                if !used_domains.insert(domain) {
                    continue;
                }
            }
            selected.push(device.device_id.clone());
        }

        let status = if selected.is_empty() {
            tracing::warn!(%address, chunk_mb, "no eligible device for chunk placement");
            PlacementStatus::NoCapacity
        } else if (selected.len() as u32) < self.replication_factor {
            tracing::warn!(
                %address,
                placed = selected.len(),
                target = self.replication_factor,
                "chunk placed under replication target"
            );
            PlacementStatus::UnderReplicated
        } else {
            PlacementStatus::Full
        };

        ChunkPlacement {
            address,
            devices: selected,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, storage_mb: u64) -> TelemetrySnapshot {
        TelemetrySnapshot {
            device_id: DeviceId::from(id),
            battery_percent: 80.0,
            cpu_load_percent: 20.0,
            ram_usage_percent: 30.0,
            idle_percent: 70.0,
            link_quality: 0.9,
            available_storage_mb: storage_mb,
            is_plugged_in: true,
            failure_domain: None,
        }
    }

    fn address() -> ChunkAddress {
        ChunkAddress::compute(b"placement test chunk")
    }

    #[test]
    fn test_plugged_in_dominates_score() {
        let plugged = device("a", 4096);
        let mut unplugged = device("b", 4096);
        unplugged.is_plugged_in = false;
        unplugged.battery_percent = 20.0;

        assert!(availability_score(&plugged) > availability_score(&unplugged));
    }

    #[test]
    fn test_capacity_filter_excludes_small_devices() {
        let scheduler = PlacementScheduler::new(3);
        let devices = vec![device("roomy", 4096), device("tiny", 0)];

        // 256 KiB chunk needs at least 1 MB free.
        let placement = scheduler.place(&devices, address(), 256 * 1024);
        assert_eq!(placement.devices, vec![DeviceId::from("roomy")]);
        assert_eq!(placement.status, PlacementStatus::UnderReplicated);
    }

    #[test]
    fn test_selects_top_r_deterministically() {
        let scheduler = PlacementScheduler::new(3);
        // Identical stats, so ranking falls back to device id order.
        let devices: Vec<_> = ["e", "c", "a", "d", "b"]
            .iter()
            .map(|id| device(id, 4096))
            .collect();

        let first = scheduler.place(&devices, address(), 256 * 1024);
        let second = scheduler.place(&devices, address(), 256 * 1024);

        assert_eq!(first.status, PlacementStatus::Full);
        assert_eq!(
            first.devices,
            vec![DeviceId::from("a"), DeviceId::from("b"), DeviceId::from("c")]
        );
        assert_eq!(first.devices, second.devices);
    }

    #[test]
    fn test_failure_domain_diversity() {
        let scheduler = PlacementScheduler::new(3);
        let mut devices: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| device(id, 4096))
            .collect();
        devices[0].failure_domain = Some("rack-1".to_string());
        devices[1].failure_domain = Some("rack-1".to_string());
        devices[2].failure_domain = Some("rack-2".to_string());
        // devices[3] has no domain.

        let placement = scheduler.place(&devices, address(), 256 * 1024);
        assert_eq!(placement.status, PlacementStatus::Full);
        assert_eq!(
            placement.devices,
            vec![DeviceId::from("a"), DeviceId::from("c"), DeviceId::from("d")]
        );
    }

    #[test]
    fn test_no_eligible_devices_reports_no_capacity() {
        let scheduler = PlacementScheduler::new(3);
        let placement = scheduler.place(&[], address(), 256 * 1024);
        assert!(placement.devices.is_empty());
        assert_eq!(placement.status, PlacementStatus::NoCapacity);
    }

    #[test]
    fn test_higher_score_wins_over_id_order() {
        let scheduler = PlacementScheduler::new(1);
        let mut busy = device("a", 4096);
        busy.cpu_load_percent = 95.0;
        busy.ram_usage_percent = 90.0;
        let idle = device("z", 4096);

        let placement = scheduler.place(&[busy, idle], address(), 256 * 1024);
        assert_eq!(placement.devices, vec![DeviceId::from("z")]);
    }
}
