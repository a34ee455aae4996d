//! Two-tier chunk and manifest persistence for weft.
//!
//! This crate provides:
//! - Content-addressed chunk storage with idempotent, never-overwrite puts
//! - Manifest storage keyed by content id, versioned per publish
//! - A durable SQLite tier and an in-memory hot tier with explicit flush
//!
//! Lookup order is memory then durable, promoting on hit. Writes land in the
//! hot tier and reach SQLite on `flush()`; durability is only acknowledged
//! once a flush succeeds.

pub mod durable;
pub mod error;
pub mod models;
mod retry;
pub mod tiered;
pub mod traits;

pub use durable::SqliteStore;
pub use error::{StoreError, StoreResult};
pub use tiered::TieredStore;
pub use traits::{ChunkStore, ManifestStore};
