//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use weft_core::AppConfig;
use weft_engine::Engine;
use weft_mesh::{DeviceId, DeviceRegistry, TelemetrySnapshot};
use weft_store::TieredStore;

/// An engine plus handles to its store and registry for inspection.
pub struct TestStack {
    pub engine: Engine,
    pub store: Arc<TieredStore>,
    pub registry: Arc<DeviceRegistry>,
    pub config: AppConfig,
    _dir: tempfile::TempDir,
}

pub async fn stack() -> TestStack {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::for_testing();
    config.store.db_path = dir.path().join("weft.db");

    let store = Arc::new(TieredStore::open(&config.store).await.unwrap());
    let registry = Arc::new(DeviceRegistry::new(config.placement.liveness_window()));
    let engine = Engine::new(store.clone(), registry.clone(), &config).unwrap();

    TestStack {
        engine,
        store,
        registry,
        config,
        _dir: dir,
    }
}

/// Deterministic pseudo-random bytes from a small LCG.
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        out.push((state >> 33) as u8);
    }
    out
}

/// A healthy plugged-in device with plenty of storage.
pub fn healthy_device(id: &str) -> TelemetrySnapshot {
    TelemetrySnapshot {
        device_id: DeviceId::from(id),
        battery_percent: 90.0,
        cpu_load_percent: 15.0,
        ram_usage_percent: 40.0,
        idle_percent: 80.0,
        link_quality: 0.95,
        available_storage_mb: 8192,
        is_plugged_in: true,
        failure_domain: None,
    }
}
