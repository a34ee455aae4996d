//! Manifest types and hashing.

use crate::chunk::ChunkAddress;
use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use time::OffsetDateTime;

/// A manifest hash (SHA-256 of ordered chunk addresses).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestHash(ContentHash);

impl ManifestHash {
    /// Compute the manifest hash from ordered chunk addresses.
    pub fn compute(addresses: &[ChunkAddress]) -> Self {
        let mut hasher = Sha256::new();
        for address in addresses {
            hasher.update(address.as_bytes());
        }
        Self(ContentHash::from_bytes(hasher.finalize().into()))
    }

    /// Get the underlying content hash.
    pub fn content_hash(&self) -> &ContentHash {
        &self.0
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        Ok(Self(ContentHash::from_hex(s)?))
    }

    /// Encode as hex string.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Debug for ManifestHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ManifestHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ManifestHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A manifest describing the ordered chunks that reconstruct one logical
/// content item.
///
/// Manifests are immutable once persisted. A re-publish under the same
/// `content_id` creates a new version; old chunks are not implicitly deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentManifest {
    /// Logical content identifier.
    pub content_id: String,
    /// Version number, starting at 1 and incremented on re-publish.
    pub version: u32,
    /// The manifest hash (derived from chunk addresses).
    pub hash: ManifestHash,
    /// Ordered list of chunk addresses.
    pub chunks: Vec<ChunkAddress>,
    /// Size of each chunk (except possibly the last).
    pub chunk_size: u64,
    /// Total content size in bytes.
    pub content_size: u64,
    /// Creation time.
    pub created_at: OffsetDateTime,
}

impl ContentManifest {
    /// Create a new manifest from chunk addresses.
    pub fn new(
        content_id: String,
        version: u32,
        chunks: Vec<ChunkAddress>,
        chunk_size: u64,
        content_size: u64,
    ) -> Self {
        let hash = ManifestHash::compute(&chunks);
        Self {
            content_id,
            version,
            hash,
            chunks,
            chunk_size,
            content_size,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Verify the manifest hash matches the expected value.
    pub fn verify_hash(&self, expected: &ManifestHash) -> crate::Result<()> {
        let computed = ManifestHash::compute(&self.chunks);
        if &computed != expected {
            return Err(crate::Error::HashMismatch {
                expected: expected.to_hex(),
                actual: computed.to_hex(),
            });
        }
        Ok(())
    }

    /// Get the number of chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Calculate expected plaintext size of the chunk at a given position.
    ///
    /// Returns `None` if the position is out of bounds.
    pub fn expected_chunk_size(&self, position: usize) -> Option<u64> {
        if position >= self.chunks.len() {
            return None;
        }

        if position + 1 < self.chunks.len() {
            // Not the last chunk
            Some(self.chunk_size)
        } else {
            // Last chunk may be smaller
            let full_chunks = self.chunks.len().saturating_sub(1) as u64;
            Some(self.content_size.saturating_sub(full_chunks * self.chunk_size))
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}
