//! Durable SQLite tier.
//!
//! Single-file embedded store holding chunk payloads and manifests. WAL
//! journaling gives crash durability; `INSERT OR IGNORE` on the
//! content-addressed primary key gives idempotent, never-overwrite puts.

use crate::error::{StoreError, StoreResult};
use crate::models::{manifest_from_rows, ChunkRow, ManifestChunkRow, ManifestRow};
use crate::retry::with_retries;
use crate::traits::{ChunkStore, ManifestStore};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use weft_core::{ChunkAddress, ContentManifest, EncryptedChunk};

/// SQLite-backed durable chunk and manifest store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path and run migrations.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))
            .map_err(StoreError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection avoids
            // persistent "database is locked" failures under concurrent publishes.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the schema if it does not exist.
    async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                address         TEXT PRIMARY KEY NOT NULL,
                ciphertext      BLOB NOT NULL,
                iv              BLOB NOT NULL,
                tag             BLOB NOT NULL,
                original_size   INTEGER NOT NULL,
                compressed_size INTEGER NOT NULL,
                chunk_index     INTEGER NOT NULL,
                refcount        INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS manifests (
                content_id   TEXT NOT NULL,
                version      INTEGER NOT NULL,
                manifest_hash TEXT NOT NULL,
                chunk_size   INTEGER NOT NULL,
                content_size INTEGER NOT NULL,
                created_at   TEXT NOT NULL,
                PRIMARY KEY (content_id, version)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS manifest_chunks (
                content_id TEXT NOT NULL,
                version    INTEGER NOT NULL,
                position   INTEGER NOT NULL,
                address    TEXT NOT NULL,
                PRIMARY KEY (content_id, version, position),
                FOREIGN KEY (content_id, version) REFERENCES manifests (content_id, version)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_manifest_chunks_address ON manifest_chunks (address)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Store a single chunk, ignoring an existing address.
    pub async fn put_chunk(&self, chunk: &EncryptedChunk) -> StoreResult<()> {
        let row = ChunkRow::from_chunk(chunk);
        let pool = self.pool.clone();

        with_retries("put_chunk", move || {
            let pool = pool.clone();
            let row = row.clone();
            async move {
                sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO chunks
                        (address, ciphertext, iv, tag, original_size, compressed_size, chunk_index, refcount, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&row.address)
                .bind(&row.ciphertext)
                .bind(&row.iv)
                .bind(&row.tag)
                .bind(row.original_size)
                .bind(row.compressed_size)
                .bind(row.chunk_index)
                .bind(row.refcount)
                .bind(row.created_at)
                .execute(&pool)
                .await
                .map(|_| ())
            }
        })
        .await
    }

    /// Store a batch of chunks in one transaction.
    ///
    /// Used by the hot tier's flush path so a crash mid-flush leaves either
    /// all or none of the batch durable.
    pub async fn put_chunks(&self, chunks: &[EncryptedChunk]) -> StoreResult<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let rows: Vec<ChunkRow> = chunks.iter().map(ChunkRow::from_chunk).collect();
        let pool = self.pool.clone();

        with_retries("put_chunks", move || {
            let pool = pool.clone();
            let rows = rows.clone();
            async move {
                let mut tx = pool.begin().await?;
                for row in &rows {
                    sqlx::query(
                        r#"
                        INSERT OR IGNORE INTO chunks
                            (address, ciphertext, iv, tag, original_size, compressed_size, chunk_index, refcount, created_at)
                        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(&row.address)
                    .bind(&row.ciphertext)
                    .bind(&row.iv)
                    .bind(&row.tag)
                    .bind(row.original_size)
                    .bind(row.compressed_size)
                    .bind(row.chunk_index)
                    .bind(row.refcount)
                    .bind(row.created_at)
                    .execute(&mut *tx)
                    .await?;
                }
                tx.commit().await
            }
        })
        .await
    }

    /// Load a chunk by address.
    pub async fn get_chunk(&self, address: &ChunkAddress) -> StoreResult<Option<EncryptedChunk>> {
        let hex = address.to_hex();
        let pool = self.pool.clone();

        let row = with_retries("get_chunk", move || {
            let pool = pool.clone();
            let hex = hex.clone();
            async move {
                sqlx::query_as::<_, ChunkRow>("SELECT * FROM chunks WHERE address = ?")
                    .bind(hex)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        row.map(ChunkRow::into_chunk).transpose()
    }

    /// Check if a chunk exists.
    pub async fn chunk_exists(&self, address: &ChunkAddress) -> StoreResult<bool> {
        let hex = address.to_hex();
        let pool = self.pool.clone();

        let row = with_retries("chunk_exists", move || {
            let pool = pool.clone();
            let hex = hex.clone();
            async move {
                sqlx::query_as::<_, (i32,)>("SELECT 1 FROM chunks WHERE address = ?")
                    .bind(hex)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        Ok(row.is_some())
    }

    /// Which of the given addresses are absent from the durable tier.
    pub async fn missing_chunks(&self, addresses: &[ChunkAddress]) -> StoreResult<Vec<String>> {
        let mut missing = Vec::new();
        for address in addresses {
            if !self.chunk_exists(address).await? {
                missing.push(address.to_hex());
            }
        }
        Ok(missing)
    }

    /// Persist a manifest and bump the refcount of every referenced chunk.
    ///
    /// The write is transactional: manifest row, ordered chunk mapping, and
    /// refcount bumps land together or not at all. All referenced chunks
    /// must already be durable; the manifest must never be visible while its
    /// chunks are missing.
    pub async fn insert_manifest(&self, manifest: &ContentManifest) -> StoreResult<()> {
        let missing = self.missing_chunks(&manifest.chunks).await?;
        if !missing.is_empty() {
            return Err(StoreError::MissingChunks {
                content_id: manifest.content_id.clone(),
                missing,
            });
        }

        let row = ManifestRow {
            content_id: manifest.content_id.clone(),
            version: manifest.version as i64,
            manifest_hash: manifest.hash.to_hex(),
            chunk_size: manifest.chunk_size as i64,
            content_size: manifest.content_size as i64,
            created_at: manifest.created_at,
        };
        let addresses: Vec<String> = manifest.chunks.iter().map(|a| a.to_hex()).collect();
        let pool = self.pool.clone();

        with_retries("insert_manifest", move || {
            let pool = pool.clone();
            let row = row.clone();
            let addresses = addresses.clone();
            async move {
                let mut tx = pool.begin().await?;

                sqlx::query(
                    r#"
                    INSERT INTO manifests (content_id, version, manifest_hash, chunk_size, content_size, created_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&row.content_id)
                .bind(row.version)
                .bind(&row.manifest_hash)
                .bind(row.chunk_size)
                .bind(row.content_size)
                .bind(row.created_at)
                .execute(&mut *tx)
                .await?;

                for (position, address) in addresses.iter().enumerate() {
                    sqlx::query(
                        r#"
                        INSERT INTO manifest_chunks (content_id, version, position, address)
                        VALUES (?, ?, ?, ?)
                        "#,
                    )
                    .bind(&row.content_id)
                    .bind(row.version)
                    .bind(position as i64)
                    .bind(address)
                    .execute(&mut *tx)
                    .await?;

                    sqlx::query("UPDATE chunks SET refcount = refcount + 1 WHERE address = ?")
                        .bind(address)
                        .execute(&mut *tx)
                        .await?;
                }

                tx.commit().await
            }
        })
        .await
    }

    /// Load the latest manifest version for a content id.
    pub async fn latest_manifest(&self, content_id: &str) -> StoreResult<Option<ContentManifest>> {
        let pool = self.pool.clone();
        let id = content_id.to_string();

        let manifest_row = with_retries("latest_manifest", move || {
            let pool = pool.clone();
            let id = id.clone();
            async move {
                sqlx::query_as::<_, ManifestRow>(
                    "SELECT * FROM manifests WHERE content_id = ? ORDER BY version DESC LIMIT 1",
                )
                .bind(id)
                .fetch_optional(&pool)
                .await
            }
        })
        .await?;

        let Some(manifest_row) = manifest_row else {
            return Ok(None);
        };

        let pool = self.pool.clone();
        let id = manifest_row.content_id.clone();
        let version = manifest_row.version;

        let chunk_rows = with_retries("manifest_chunks", move || {
            let pool = pool.clone();
            let id = id.clone();
            async move {
                sqlx::query_as::<_, ManifestChunkRow>(
                    "SELECT * FROM manifest_chunks WHERE content_id = ? AND version = ? ORDER BY position ASC",
                )
                .bind(id)
                .bind(version)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        manifest_from_rows(manifest_row, chunk_rows).map(Some)
    }

    /// Latest version number for a content id.
    pub async fn latest_manifest_version(&self, content_id: &str) -> StoreResult<Option<u32>> {
        let pool = self.pool.clone();
        let id = content_id.to_string();

        // MAX() over an empty set yields a single NULL row.
        let (version,) = with_retries("latest_manifest_version", move || {
            let pool = pool.clone();
            let id = id.clone();
            async move {
                sqlx::query_as::<_, (Option<i64>,)>(
                    "SELECT MAX(version) FROM manifests WHERE content_id = ?",
                )
                .bind(id)
                .fetch_one(&pool)
                .await
            }
        })
        .await?;

        Ok(version.map(|v| v as u32))
    }

    /// Delete chunks with zero refcount created before the cutoff.
    ///
    /// Returns the addresses removed. Selection and deletion run inside one
    /// immediate transaction so a concurrent manifest insert cannot bump a
    /// refcount between the check and the delete.
    pub async fn sweep_unreferenced(
        &self,
        older_than: OffsetDateTime,
        limit: u32,
    ) -> StoreResult<Vec<String>> {
        let pool = self.pool.clone();

        let swept = with_retries("sweep_unreferenced", move || {
            let pool = pool.clone();
            async move {
                let mut tx = pool.begin().await?;

                let rows: Vec<(String,)> = sqlx::query_as(
                    r#"
                    SELECT address FROM chunks
                    WHERE refcount = 0 AND created_at < ?
                    ORDER BY created_at ASC
                    LIMIT ?
                    "#,
                )
                .bind(older_than)
                .bind(limit as i64)
                .fetch_all(&mut *tx)
                .await?;

                for (address,) in &rows {
                    sqlx::query("DELETE FROM chunks WHERE address = ? AND refcount = 0")
                        .bind(address)
                        .execute(&mut *tx)
                        .await?;
                }

                tx.commit().await?;
                Ok(rows.into_iter().map(|(a,)| a).collect::<Vec<_>>())
            }
        })
        .await?;

        if !swept.is_empty() {
            tracing::info!(count = swept.len(), "swept unreferenced chunks");
        }
        Ok(swept)
    }
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn put(&self, chunk: EncryptedChunk) -> StoreResult<()> {
        self.put_chunk(&chunk).await
    }

    async fn get(&self, address: &ChunkAddress) -> StoreResult<Option<EncryptedChunk>> {
        self.get_chunk(address).await
    }

    async fn contains(&self, address: &ChunkAddress) -> StoreResult<bool> {
        self.chunk_exists(address).await
    }

    async fn flush(&self) -> StoreResult<()> {
        // Every put already lands in SQLite; nothing buffered to drain.
        Ok(())
    }
}

#[async_trait]
impl ManifestStore for SqliteStore {
    async fn put_manifest(&self, manifest: &ContentManifest) -> StoreResult<()> {
        self.insert_manifest(manifest).await
    }

    async fn get_manifest(&self, content_id: &str) -> StoreResult<Option<ContentManifest>> {
        self.latest_manifest(content_id).await
    }

    async fn latest_version(&self, content_id: &str) -> StoreResult<Option<u32>> {
        self.latest_manifest_version(content_id).await
    }
}
