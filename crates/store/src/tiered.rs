//! Two-tier store: in-memory hot map over the durable SQLite tier.
//!
//! Writes land in the hot tier and are tracked in a dirty set; `flush()`
//! drains the dirty set to SQLite in one transaction. Reads check memory
//! first and promote durable hits. A manifest put flushes first so its
//! chunks are durable before the manifest becomes visible.

use crate::durable::SqliteStore;
use crate::error::StoreResult;
use crate::traits::{ChunkStore, ManifestStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use weft_core::{ChunkAddress, ContentManifest, EncryptedChunk, StoreConfig};

struct HotTier {
    entries: HashMap<ChunkAddress, EncryptedChunk>,
    /// Addresses present in memory but not yet durable.
    dirty: HashSet<ChunkAddress>,
    /// Total ciphertext bytes awaiting flush.
    dirty_bytes: u64,
}

impl HotTier {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            dirty: HashSet::new(),
            dirty_bytes: 0,
        }
    }

    /// Evict clean entries until the map is back under capacity.
    ///
    /// Dirty entries are never evicted; they only leave through a flush.
    fn evict_clean(&mut self, capacity: usize) {
        if self.entries.len() <= capacity {
            return;
        }
        let excess = self.entries.len() - capacity;
        let victims: Vec<ChunkAddress> = self
            .entries
            .keys()
            .filter(|addr| !self.dirty.contains(addr))
            .take(excess)
            .copied()
            .collect();
        for addr in victims {
            self.entries.remove(&addr);
        }
    }
}

/// Hot in-memory map backed by a durable [`SqliteStore`].
pub struct TieredStore {
    hot: Mutex<HotTier>,
    durable: Arc<SqliteStore>,
    /// Serializes flushes so two callers cannot race the same dirty set.
    flush_lock: tokio::sync::Mutex<()>,
    flush_watermark_bytes: u64,
    hot_capacity: usize,
}

impl TieredStore {
    /// Open the durable tier at the configured path and wrap it.
    pub async fn open(config: &StoreConfig) -> StoreResult<Self> {
        let durable = SqliteStore::open(&config.db_path).await?;
        Ok(Self::new(Arc::new(durable), config))
    }

    pub fn new(durable: Arc<SqliteStore>, config: &StoreConfig) -> Self {
        Self {
            hot: Mutex::new(HotTier::new()),
            durable,
            flush_lock: tokio::sync::Mutex::new(()),
            flush_watermark_bytes: config.flush_watermark_bytes,
            hot_capacity: config.hot_capacity,
        }
    }

    /// Access the underlying durable tier.
    pub fn durable(&self) -> &SqliteStore {
        &self.durable
    }

    /// Number of entries currently in the hot map.
    pub fn hot_len(&self) -> usize {
        self.hot.lock().entries.len()
    }

    /// Bytes of ciphertext waiting to be flushed.
    pub fn dirty_bytes(&self) -> u64 {
        self.hot.lock().dirty_bytes
    }

    /// Drain the dirty set into SQLite in one transaction.
    async fn flush_dirty(&self) -> StoreResult<()> {
        let _guard = self.flush_lock.lock().await;

        let batch: Vec<EncryptedChunk> = {
            let hot = self.hot.lock();
            hot.dirty
                .iter()
                .filter_map(|addr| hot.entries.get(addr))
                .cloned()
                .collect()
        };

        if batch.is_empty() {
            return Ok(());
        }

        self.durable.put_chunks(&batch).await?;

        // Only mark clean what we actually wrote; puts that arrived during
        // the flush stay dirty for the next one.
        {
            let mut hot = self.hot.lock();
            for chunk in &batch {
                if hot.dirty.remove(&chunk.address) {
                    hot.dirty_bytes = hot.dirty_bytes.saturating_sub(chunk.ciphertext.len() as u64);
                }
            }
            let capacity = self.hot_capacity;
            hot.evict_clean(capacity);
        }

        tracing::debug!(chunks = batch.len(), "flushed dirty chunks to durable tier");
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for TieredStore {
    async fn put(&self, chunk: EncryptedChunk) -> StoreResult<()> {
        let over_watermark = {
            let mut hot = self.hot.lock();
            if hot.entries.contains_key(&chunk.address) {
                // Idempotent: same address means same bytes under convergent
                // encryption, so the existing entry stands.
                return Ok(());
            }
            let size = chunk.ciphertext.len() as u64;
            hot.dirty.insert(chunk.address);
            hot.dirty_bytes += size;
            hot.entries.insert(chunk.address, chunk);
            hot.dirty_bytes >= self.flush_watermark_bytes
        };

        if over_watermark {
            self.flush_dirty().await?;
        }
        Ok(())
    }

    async fn get(&self, address: &ChunkAddress) -> StoreResult<Option<EncryptedChunk>> {
        if let Some(chunk) = self.hot.lock().entries.get(address).cloned() {
            return Ok(Some(chunk));
        }

        // Miss in memory; fall through to durable and promote on hit.
        let Some(chunk) = self.durable.get_chunk(address).await? else {
            return Ok(None);
        };

        {
            let mut hot = self.hot.lock();
            hot.entries.entry(*address).or_insert_with(|| chunk.clone());
            let capacity = self.hot_capacity;
            hot.evict_clean(capacity);
        }
        Ok(Some(chunk))
    }

    async fn contains(&self, address: &ChunkAddress) -> StoreResult<bool> {
        if self.hot.lock().entries.contains_key(address) {
            return Ok(true);
        }
        self.durable.chunk_exists(address).await
    }

    async fn flush(&self) -> StoreResult<()> {
        self.flush_dirty().await
    }
}

#[async_trait]
impl ManifestStore for TieredStore {
    async fn put_manifest(&self, manifest: &ContentManifest) -> StoreResult<()> {
        // Chunks must be durable before the manifest references them.
        self.flush_dirty().await?;
        self.durable.insert_manifest(manifest).await
    }

    async fn get_manifest(&self, content_id: &str) -> StoreResult<Option<ContentManifest>> {
        self.durable.latest_manifest(content_id).await
    }

    async fn latest_version(&self, content_id: &str) -> StoreResult<Option<u32>> {
        self.durable.latest_manifest_version(content_id).await
    }
}
