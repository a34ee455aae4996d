//! Store trait definitions.

use crate::error::StoreResult;
use async_trait::async_trait;
use weft_core::{ChunkAddress, ContentManifest, EncryptedChunk};

/// Content-addressed chunk storage.
///
/// Puts are idempotent: storing an address that already exists is a no-op,
/// never an overwrite. Under convergent encryption the payload for a given
/// address is identical by construction, so whichever concurrent writer
/// lands first wins with no correctness impact.
#[async_trait]
pub trait ChunkStore: Send + Sync + 'static {
    /// Store a chunk. No-op if the address already exists.
    async fn put(&self, chunk: EncryptedChunk) -> StoreResult<()>;

    /// Load a chunk by address.
    async fn get(&self, address: &ChunkAddress) -> StoreResult<Option<EncryptedChunk>>;

    /// Check whether an address is present.
    async fn contains(&self, address: &ChunkAddress) -> StoreResult<bool>;

    /// Force pending writes to durable storage.
    ///
    /// A `put` is not durable until a subsequent `flush` succeeds; callers
    /// that need crash safety must flush and check the result.
    async fn flush(&self) -> StoreResult<()>;
}

/// Versioned manifest storage keyed by content id.
#[async_trait]
pub trait ManifestStore: Send + Sync + 'static {
    /// Persist a manifest. Fails with `MissingChunks` if any referenced
    /// address is not durably stored.
    async fn put_manifest(&self, manifest: &ContentManifest) -> StoreResult<()>;

    /// Get the latest manifest version for a content id.
    async fn get_manifest(&self, content_id: &str) -> StoreResult<Option<ContentManifest>>;

    /// Get the latest version number for a content id.
    async fn latest_version(&self, content_id: &str) -> StoreResult<Option<u32>>;
}
