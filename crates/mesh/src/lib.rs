//! Device telemetry registry and replica placement for weft.
//!
//! Mesh devices report telemetry snapshots; the registry keeps the latest
//! snapshot per device and expires devices whose telemetry goes stale. The
//! placement scheduler ranks live devices by an availability score and picks
//! replica holders per chunk.
//!
//! Placement is advisory metadata. Nothing here transfers bytes to devices;
//! that belongs to a transport layer built on top.

pub mod placement;
pub mod registry;
pub mod telemetry;

pub use placement::{availability_score, ChunkPlacement, PlacementScheduler, PlacementStatus};
pub use registry::DeviceRegistry;
pub use telemetry::{DeviceId, DeviceStatus, TelemetrySnapshot};
