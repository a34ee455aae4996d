//! Telemetry types reported by mesh devices.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a mesh device.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A device's most recent self-reported state.
///
/// Percent fields are in `[0, 100]`, `link_quality` in `[0, 1]`. Values are
/// taken as reported; a device lying about its battery only hurts its own
/// placement ranking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub device_id: DeviceId,
    pub battery_percent: f64,
    pub cpu_load_percent: f64,
    pub ram_usage_percent: f64,
    pub idle_percent: f64,
    pub link_quality: f64,
    pub available_storage_mb: u64,
    pub is_plugged_in: bool,
    /// Optional failure-domain label (rack, household, subnet). Placement
    /// avoids stacking replicas in one domain when labels are present.
    #[serde(default)]
    pub failure_domain: Option<String>,
}

/// One row of the device listing exposed to observability UIs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub device_id: DeviceId,
    pub battery_percent: f64,
    pub cpu_load_percent: f64,
    pub ram_usage_percent: f64,
    pub score: f64,
    pub is_plugged_in: bool,
}
