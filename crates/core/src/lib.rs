//! Core domain types and shared logic for the weft mesh content store.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Content hashes and chunk addresses
//! - Chunk metadata and splitting
//! - Manifest structure and hashing
//! - Configuration types

pub mod chunk;
pub mod config;
pub mod error;
pub mod hash;
pub mod manifest;

pub use chunk::{split_into_chunks, ChunkAddress, ChunkInfo, EncryptedChunk};
pub use config::{
    AppConfig, ChunkingConfig, CipherConfig, CompressionConfig, PlacementConfig, StoreConfig,
};
pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher};
pub use manifest::{ContentManifest, ManifestHash};

/// Default chunk size: 256 KiB
pub const DEFAULT_CHUNK_SIZE: u64 = 256 * 1024;

/// Maximum chunk size: 16 MiB
pub const MAX_CHUNK_SIZE: u64 = 16 * 1024 * 1024;

/// Minimum chunk size: 4 KiB
pub const MIN_CHUNK_SIZE: u64 = 4 * 1024;

/// Default replication factor for chunk placement.
pub const DEFAULT_REPLICATION_FACTOR: u32 = 3;
