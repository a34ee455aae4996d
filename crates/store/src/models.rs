//! Database records mapping to the store schema.

use crate::error::{StoreError, StoreResult};
use bytes::Bytes;
use sqlx::FromRow;
use time::OffsetDateTime;
use weft_core::{ChunkAddress, ContentManifest, EncryptedChunk};

/// Durable chunk record.
#[derive(Debug, Clone, FromRow)]
pub struct ChunkRow {
    pub address: String,
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub tag: Vec<u8>,
    pub original_size: i64,
    pub compressed_size: i64,
    pub chunk_index: i64,
    pub refcount: i64,
    pub created_at: OffsetDateTime,
}

impl ChunkRow {
    /// Build a row from an encrypted chunk.
    pub fn from_chunk(chunk: &EncryptedChunk) -> Self {
        Self {
            address: chunk.address.to_hex(),
            ciphertext: chunk.ciphertext.to_vec(),
            iv: chunk.iv.to_vec(),
            tag: chunk.tag.to_vec(),
            original_size: chunk.original_size as i64,
            compressed_size: chunk.compressed_size as i64,
            chunk_index: chunk.index as i64,
            refcount: 0,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Convert back to an encrypted chunk, validating field shapes.
    ///
    /// A row with malformed iv/tag lengths or negative sizes is a corrupted
    /// durable record; it surfaces as `CorruptChunk`, never a panic.
    pub fn into_chunk(self) -> StoreResult<EncryptedChunk> {
        let address = ChunkAddress::from_hex(&self.address).map_err(|e| {
            StoreError::CorruptChunk {
                address: self.address.clone(),
                detail: format!("bad address: {e}"),
            }
        })?;

        let iv: [u8; 12] = self.iv.as_slice().try_into().map_err(|_| {
            StoreError::CorruptChunk {
                address: self.address.clone(),
                detail: format!("iv has {} bytes, expected 12", self.iv.len()),
            }
        })?;

        let tag: [u8; 16] = self.tag.as_slice().try_into().map_err(|_| {
            StoreError::CorruptChunk {
                address: self.address.clone(),
                detail: format!("tag has {} bytes, expected 16", self.tag.len()),
            }
        })?;

        if self.original_size < 0 || self.compressed_size < 0 || self.chunk_index < 0 {
            return Err(StoreError::CorruptChunk {
                address: self.address,
                detail: "negative size or index".to_string(),
            });
        }

        Ok(EncryptedChunk {
            address,
            ciphertext: Bytes::from(self.ciphertext),
            iv,
            tag,
            original_size: self.original_size as u64,
            compressed_size: self.compressed_size as u64,
            index: self.chunk_index as u32,
        })
    }
}

/// Manifest record.
#[derive(Debug, Clone, FromRow)]
pub struct ManifestRow {
    pub content_id: String,
    pub version: i64,
    pub manifest_hash: String,
    pub chunk_size: i64,
    pub content_size: i64,
    pub created_at: OffsetDateTime,
}

/// Manifest chunk mapping.
#[derive(Debug, Clone, FromRow)]
pub struct ManifestChunkRow {
    pub content_id: String,
    pub version: i64,
    pub position: i64,
    pub address: String,
}

/// Reassemble a manifest from its row and ordered chunk rows.
pub fn manifest_from_rows(
    manifest: ManifestRow,
    chunk_rows: Vec<ManifestChunkRow>,
) -> StoreResult<ContentManifest> {
    let mut chunks = Vec::with_capacity(chunk_rows.len());
    for row in chunk_rows {
        let address = ChunkAddress::from_hex(&row.address).map_err(|e| {
            StoreError::InvalidRecord(format!(
                "manifest {} v{} position {}: {e}",
                row.content_id, row.version, row.position
            ))
        })?;
        chunks.push(address);
    }

    // A stored hash that no longer matches the chunk list means the rows
    // were corrupted or partially written.
    let hash = weft_core::ManifestHash::compute(&chunks);
    if hash.to_hex() != manifest.manifest_hash {
        return Err(StoreError::InvalidRecord(format!(
            "manifest {} v{}: stored hash {} does not match chunk list",
            manifest.content_id, manifest.version, manifest.manifest_hash
        )));
    }

    Ok(ContentManifest {
        content_id: manifest.content_id,
        version: manifest.version as u32,
        hash,
        chunks,
        chunk_size: manifest.chunk_size as u64,
        content_size: manifest.content_size as u64,
        created_at: manifest.created_at,
    })
}
