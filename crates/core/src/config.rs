//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Chunking configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Chunk size in bytes (default: 256 KiB).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Maximum parallel chunk encode/store operations per publish.
    #[serde(default = "default_max_parallel_chunks")]
    pub max_parallel_chunks: u32,
}

impl ChunkingConfig {
    /// Validate the chunk size bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size < crate::MIN_CHUNK_SIZE || self.chunk_size > crate::MAX_CHUNK_SIZE {
            return Err(format!(
                "chunk_size {} out of range [{}, {}]",
                self.chunk_size,
                crate::MIN_CHUNK_SIZE,
                crate::MAX_CHUNK_SIZE
            ));
        }
        if self.max_parallel_chunks == 0 {
            return Err("max_parallel_chunks must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_parallel_chunks: default_max_parallel_chunks(),
        }
    }
}

/// Compression algorithm for stored chunks.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionConfig {
    /// No compression.
    None,
    /// Zstandard compression (default).
    #[default]
    Zstd,
}

/// Convergent cipher configuration.
///
/// The store secret feeds the per-chunk key derivation. Without it, an
/// outsider who can guess a plaintext cannot derive the chunk key, which is
/// what separates this scheme from naive convergent encryption.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CipherConfig {
    /// Store-wide secret as 64 hex characters (32 bytes).
    pub store_secret: String,
}

impl CipherConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.store_secret.len() != 64
            || !self.store_secret.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err("store_secret must be 64 hex characters".to_string());
        }
        Ok(())
    }
}

/// Chunk store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Dirty bytes accumulated before the hot tier auto-flushes to durable
    /// storage.
    #[serde(default = "default_flush_watermark_bytes")]
    pub flush_watermark_bytes: u64,
    /// Maximum number of chunks kept in the hot tier.
    #[serde(default = "default_hot_capacity")]
    pub hot_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            flush_watermark_bytes: default_flush_watermark_bytes(),
            hot_capacity: default_hot_capacity(),
        }
    }
}

/// Placement scheduler configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Target replication factor per chunk (default: 3).
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u32,
    /// Liveness window in seconds: devices with older telemetry are excluded
    /// from placement (default: 120).
    #[serde(default = "default_liveness_window_secs")]
    pub liveness_window_secs: u64,
}

impl PlacementConfig {
    /// Get the liveness window as a Duration.
    pub fn liveness_window(&self) -> Duration {
        let secs = i64::try_from(self.liveness_window_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.replication_factor == 0 {
            return Err("replication_factor must be at least 1".to_string());
        }
        if self.liveness_window_secs == 0 {
            return Err("liveness_window_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            replication_factor: default_replication_factor(),
            liveness_window_secs: default_liveness_window_secs(),
        }
    }
}

fn default_chunk_size() -> u64 {
    crate::DEFAULT_CHUNK_SIZE
}

fn default_max_parallel_chunks() -> u32 {
    8
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/weft.db")
}

fn default_flush_watermark_bytes() -> u64 {
    32 * 1024 * 1024 // 32 MiB
}

fn default_hot_capacity() -> usize {
    1024
}

fn default_replication_factor() -> u32 {
    crate::DEFAULT_REPLICATION_FACTOR
}

fn default_liveness_window_secs() -> u64 {
    120
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chunking configuration.
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Compression algorithm.
    #[serde(default)]
    pub compression: CompressionConfig,
    /// Convergent cipher configuration (required).
    pub cipher: CipherConfig,
    /// Chunk store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Placement scheduler configuration.
    #[serde(default)]
    pub placement: PlacementConfig,
}

impl AppConfig {
    /// Load configuration from an optional TOML file merged with
    /// `WEFT_`-prefixed environment variables (double underscore separates
    /// nesting, e.g. `WEFT_CHUNKING__CHUNK_SIZE`).
    pub fn load(config_path: Option<&str>) -> crate::Result<Self> {
        use figment::providers::{Env, Format, Toml};
        use figment::Figment;

        let mut figment = Figment::new();
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("WEFT_").split("__"));

        let config: AppConfig = figment
            .extract()
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate().map_err(crate::Error::Config)?;
        Ok(config)
    }

    /// Validate all sections.
    pub fn validate(&self) -> Result<(), String> {
        self.chunking.validate()?;
        self.cipher.validate()?;
        self.placement.validate()?;
        Ok(())
    }

    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses a fixed dummy store secret.
    pub fn for_testing() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            compression: CompressionConfig::default(),
            cipher: CipherConfig {
                // SHA256 of "weft-test-secret"; deterministic but not a real secret.
                store_secret: "9f735e0df9a1ddc702bf0a1a7b83033f9f7153a00c29de82cedadc9957289b05"
                    .to_string(),
            },
            store: StoreConfig::default(),
            placement: PlacementConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunking_rejects_bad_sizes() {
        let mut config = ChunkingConfig::default();
        config.chunk_size = 0;
        assert!(config.validate().is_err());

        config.chunk_size = crate::MAX_CHUNK_SIZE + 1;
        assert!(config.validate().is_err());

        config.chunk_size = crate::DEFAULT_CHUNK_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cipher_requires_hex_secret() {
        let bad = CipherConfig {
            store_secret: "not-hex".to_string(),
        };
        assert!(bad.validate().is_err());

        let good = CipherConfig {
            store_secret: "00".repeat(32),
        };
        assert!(good.validate().is_ok());
    }

    #[test]
    fn test_placement_defaults() {
        let config = PlacementConfig::default();
        assert_eq!(config.replication_factor, 3);
        assert_eq!(config.liveness_window(), Duration::seconds(120));
    }

    #[test]
    fn test_app_config_load_from_toml() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[chunking]
chunk_size = 65536

[cipher]
store_secret = "{}"
"#,
            "ab".repeat(32)
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.chunking.chunk_size, 65536);
        assert_eq!(config.compression, CompressionConfig::Zstd);
    }
}
