//! Publish/retrieve engine.
//!
//! `publish` splits content into fixed-size chunks, encodes them through the
//! convergent codec, persists them in the two-tier store, records a versioned
//! manifest once every chunk is durable, and computes advisory replica
//! placements. `retrieve` is the strict inverse: any missing or corrupt chunk
//! fails the whole call.

use crate::error::{EngineError, EngineResult};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use weft_codec::{decode_chunk, encode_chunk, ConvergentCipher, StoreSecret};
use weft_core::{
    split_into_chunks, AppConfig, ChunkAddress, ChunkInfo, ChunkingConfig, CompressionConfig,
    ContentManifest, ManifestHash,
};
use weft_mesh::{ChunkPlacement, DeviceRegistry, DeviceStatus, PlacementScheduler, PlacementStatus, TelemetrySnapshot};
use weft_store::{ChunkStore, ManifestStore, TieredStore};

/// Result of a publish call.
///
/// Publish succeeds even when placement falls short of the replication
/// target; degraded placements show up in `warnings`, never as errors.
#[derive(Debug)]
pub struct PublishOutcome {
    pub content_id: String,
    pub version: u32,
    pub manifest_hash: ManifestHash,
    pub num_chunks: usize,
    pub placements: Vec<ChunkPlacement>,
    pub warnings: Vec<String>,
}

/// The data-plane façade: content in, content out, placements on the side.
pub struct Engine {
    store: Arc<TieredStore>,
    registry: Arc<DeviceRegistry>,
    cipher: ConvergentCipher,
    compression: CompressionConfig,
    chunking: ChunkingConfig,
    scheduler: PlacementScheduler,
}

impl Engine {
    /// Build an engine over an existing store and registry.
    pub fn new(
        store: Arc<TieredStore>,
        registry: Arc<DeviceRegistry>,
        config: &AppConfig,
    ) -> EngineResult<Self> {
        config
            .validate()
            .map_err(weft_core::Error::Config)
            .map_err(EngineError::Core)?;
        let secret = StoreSecret::from_hex(&config.cipher.store_secret)?;

        Ok(Self {
            store,
            registry,
            cipher: ConvergentCipher::new(secret),
            compression: config.compression,
            chunking: config.chunking.clone(),
            scheduler: PlacementScheduler::new(config.placement.replication_factor),
        })
    }

    /// Build the full SQLite-backed stack from configuration.
    pub async fn from_config(config: &AppConfig) -> EngineResult<Self> {
        let store = Arc::new(TieredStore::open(&config.store).await?);
        let registry = Arc::new(DeviceRegistry::new(config.placement.liveness_window()));
        Self::new(store, registry, config)
    }

    /// The device registry this engine places against.
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Upsert a device telemetry snapshot.
    pub fn ingest_telemetry(&self, snapshot: TelemetrySnapshot) {
        self.registry.ingest(snapshot);
    }

    /// Live-device listing for observability UIs.
    pub fn device_listing(&self) -> Vec<DeviceStatus> {
        self.registry.device_listing()
    }

    /// Publish raw bytes under an optional content id.
    ///
    /// A missing id gets a fresh UUID. Re-publishing an existing id creates
    /// the next manifest version; earlier versions and their chunks stay.
    /// Cancellation is honored between chunk boundaries: already-stored
    /// chunks remain (harmless under content addressing) but no manifest is
    /// recorded.
    pub async fn publish(
        &self,
        data: &[u8],
        content_id: Option<String>,
        cancel: &CancellationToken,
    ) -> EngineResult<PublishOutcome> {
        let content_id = content_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let chunk_size = self.chunking.chunk_size;

        let version = match self.store.latest_version(&content_id).await? {
            Some(v) => v + 1,
            None => 1,
        };

        tracing::info!(
            content_id,
            version,
            size = data.len(),
            chunk_size,
            "publishing content"
        );

        // Chunks are independent; encode and store them with bounded
        // parallelism. The precomputed infos keep manifest order regardless
        // of completion order.
        let infos = split_into_chunks(data, chunk_size);
        stream::iter(
            data.chunks(chunk_size as usize)
                .zip(&infos)
                .map(|(plaintext, info)| self.store_one_chunk(info, plaintext, cancel)),
        )
        .buffer_unordered(self.chunking.max_parallel_chunks as usize)
        .try_collect::<Vec<()>>()
        .await?;

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // Chunks must be durable before the manifest can reference them.
        self.store.flush().await?;

        let addresses: Vec<ChunkAddress> = infos.iter().map(|info| info.address).collect();
        let manifest = ContentManifest::new(
            content_id.clone(),
            version,
            addresses,
            chunk_size,
            data.len() as u64,
        );
        self.store.put_manifest(&manifest).await?;

        // One registry snapshot for the whole publish; per-chunk decisions
        // from a registry mutating mid-publish would be incoherent.
        let live = self.registry.live_devices();
        let mut placements = Vec::with_capacity(infos.len());
        let mut warnings = Vec::new();
        for info in &infos {
            let placement = self.scheduler.place(&live, info.address, info.size);
            match placement.status {
                PlacementStatus::Full => {}
                PlacementStatus::UnderReplicated => warnings.push(format!(
                    "chunk {} placed on {} of {} devices",
                    short_hex(&info.address),
                    placement.devices.len(),
                    self.scheduler.replication_factor()
                )),
                PlacementStatus::NoCapacity => warnings.push(format!(
                    "chunk {} has no placement; no eligible device",
                    short_hex(&info.address)
                )),
            }
            placements.push(placement);
        }

        tracing::info!(
            content_id,
            version,
            chunks = manifest.chunk_count(),
            warnings = warnings.len(),
            "content published"
        );

        Ok(PublishOutcome {
            content_id,
            version,
            manifest_hash: manifest.hash,
            num_chunks: manifest.chunk_count(),
            placements,
            warnings,
        })
    }

    async fn store_one_chunk(
        &self,
        info: &ChunkInfo,
        plaintext: &[u8],
        cancel: &CancellationToken,
    ) -> EngineResult<()> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // Dedup short-circuit: a known address already holds these exact
        // bytes, so skip the encode entirely.
        if self.store.contains(&info.address).await? {
            tracing::debug!(address = %info.address, index = info.index, "chunk already stored, skipping encode");
            return Ok(());
        }

        let chunk = encode_chunk(plaintext, info.index, &self.cipher, self.compression).await?;
        self.store.put(chunk).await?;
        Ok(())
    }

    /// Reassemble the latest version of a content id.
    ///
    /// Strict: a missing or corrupt chunk fails the whole retrieve, since
    /// partial binary content is not useful.
    pub async fn retrieve(
        &self,
        content_id: &str,
        cancel: &CancellationToken,
    ) -> EngineResult<Bytes> {
        let manifest = self
            .store
            .get_manifest(content_id)
            .await?
            .ok_or_else(|| EngineError::ContentNotFound(content_id.to_string()))?;

        let mut output = BytesMut::with_capacity(manifest.content_size as usize);
        for address in &manifest.chunks {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let Some(chunk) = self.store.get(address).await? else {
                tracing::error!(
                    content_id,
                    version = manifest.version,
                    address = %address,
                    "manifest references a chunk the store does not hold"
                );
                return Err(EngineError::ChunkMissing {
                    content_id: content_id.to_string(),
                    address: address.to_hex(),
                });
            };

            let plaintext = decode_chunk(&chunk, &self.cipher, self.compression).await?;
            output.extend_from_slice(&plaintext);
        }

        tracing::debug!(
            content_id,
            version = manifest.version,
            size = output.len(),
            "content retrieved"
        );
        Ok(output.freeze())
    }

    /// Latest manifest for a content id, if any.
    pub async fn manifest(&self, content_id: &str) -> EngineResult<Option<ContentManifest>> {
        Ok(self.store.get_manifest(content_id).await?)
    }

    /// Delete unreferenced chunks older than the cutoff. Returns the number
    /// of chunks removed.
    pub async fn sweep_unreferenced(
        &self,
        older_than: time::OffsetDateTime,
        limit: u32,
    ) -> EngineResult<usize> {
        let swept = self.store.durable().sweep_unreferenced(older_than, limit).await?;
        Ok(swept.len())
    }
}

fn short_hex(address: &ChunkAddress) -> String {
    address.to_hex()[..16].to_string()
}
