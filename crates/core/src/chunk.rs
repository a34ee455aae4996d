//! Chunk types, addressing, and splitting.

use crate::hash::ContentHash;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A chunk address: SHA-256 of the plaintext, pre-compression chunk bytes.
///
/// The address is a pure function of the plaintext, so identical plaintext
/// chunks always share one address regardless of which content referenced
/// them. Storage is content-addressed, never path-addressed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkAddress(ContentHash);

impl ChunkAddress {
    /// Create from a ContentHash.
    pub fn from_content_hash(hash: ContentHash) -> Self {
        Self(hash)
    }

    /// Compute the address of plaintext chunk data.
    pub fn compute(plaintext: &[u8]) -> Self {
        Self(ContentHash::compute(plaintext))
    }

    /// Get the underlying content hash.
    pub fn content_hash(&self) -> &ContentHash {
        &self.0
    }

    /// Get the raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
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

impl fmt::Debug for ChunkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkAddress({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ChunkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Metadata about a plaintext chunk prior to encoding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkInfo {
    /// The chunk address.
    pub address: ChunkAddress,
    /// Plaintext size in bytes.
    pub size: u64,
    /// Position of this chunk within its owning content (0-indexed).
    pub index: u32,
}

impl ChunkInfo {
    /// Create new chunk info.
    pub fn new(address: ChunkAddress, size: u64, index: u32) -> Self {
        Self {
            address,
            size,
            index,
        }
    }
}

/// The stored unit: a compressed-then-encrypted chunk with its convergent
/// AEAD parameters.
///
/// The IV is deterministically derived from the address, so re-publishing
/// identical plaintext reproduces identical ciphertext. `original_size` and
/// `compressed_size` bound decompression; a length mismatch on retrieve is
/// treated as corruption.
#[derive(Clone, Serialize, Deserialize)]
pub struct EncryptedChunk {
    /// Content address (hash of the plaintext bytes).
    pub address: ChunkAddress,
    /// Compressed-then-encrypted payload, tag split off.
    pub ciphertext: Bytes,
    /// Deterministic 12-byte GCM nonce.
    pub iv: [u8; 12],
    /// 16-byte GCM authentication tag.
    pub tag: [u8; 16],
    /// Plaintext size before compression.
    pub original_size: u64,
    /// Compressed plaintext size (equals the ciphertext length).
    pub compressed_size: u64,
    /// Position within the owning content. A chunk may be referenced by more
    /// than one manifest; the index reflects the publish that stored it.
    pub index: u32,
}

impl EncryptedChunk {
    /// Total stored payload size (ciphertext + tag + iv).
    pub fn stored_size(&self) -> u64 {
        self.ciphertext.len() as u64 + 16 + 12
    }
}

impl fmt::Debug for EncryptedChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedChunk")
            .field("address", &self.address)
            .field("original_size", &self.original_size)
            .field("compressed_size", &self.compressed_size)
            .field("index", &self.index)
            .finish()
    }
}

/// Split plaintext into fixed-size chunks and compute each chunk's address.
///
/// The final chunk may be shorter. Empty input yields no chunks.
pub fn split_into_chunks(data: &[u8], chunk_size: u64) -> Vec<ChunkInfo> {
    let chunk_size = chunk_size as usize;
    data.chunks(chunk_size)
        .enumerate()
        .map(|(i, chunk_data)| {
            let address = ChunkAddress::compute(chunk_data);
            ChunkInfo::new(address, chunk_data.len() as u64, i as u32)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_pure_function_of_plaintext() {
        let a = ChunkAddress::compute(b"same bytes");
        let b = ChunkAddress::compute(b"same bytes");
        assert_eq!(a, b);
        assert_ne!(a, ChunkAddress::compute(b"other bytes"));
    }

    #[test]
    fn test_chunk_splitting() {
        let data = vec![0u8; 100];
        let chunks = split_into_chunks(&data, 30);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].size, 30);
        assert_eq!(chunks[3].size, 10); // Last chunk is smaller
        assert_eq!(chunks[3].index, 3);
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(split_into_chunks(&[], 1024).is_empty());
    }

    #[test]
    fn test_identical_chunks_share_address() {
        // Two full chunks of identical bytes dedup to a single address.
        let data = vec![7u8; 64];
        let chunks = split_into_chunks(&data, 32);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].address, chunks[1].address);
    }
}
