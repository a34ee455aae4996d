//! Chunk compression utilities.
//!
//! Zstandard via streaming tokio encoders. Decompression verifies that the
//! output length exactly equals the recorded original size; a mismatch is
//! the primary defense against truncated or tampered ciphertext reaching
//! application code.

use crate::error::{CodecError, CodecResult};
use async_compression::tokio::write::{ZstdDecoder, ZstdEncoder};
use tokio::io::AsyncWriteExt;
use weft_core::CompressionConfig;

/// Compress chunk plaintext using the configured algorithm.
pub async fn compress(data: &[u8], compression: CompressionConfig) -> CodecResult<Vec<u8>> {
    match compression {
        CompressionConfig::None => Ok(data.to_vec()),
        CompressionConfig::Zstd => {
            let mut encoder =
                ZstdEncoder::with_quality(Vec::new(), async_compression::Level::Default);
            encoder.write_all(data).await?;
            encoder.shutdown().await?;
            Ok(encoder.into_inner())
        }
    }
}

/// Decompress chunk data, verifying the exact original length.
pub async fn decompress(
    data: &[u8],
    compression: CompressionConfig,
    original_size: u64,
) -> CodecResult<Vec<u8>> {
    let output = match compression {
        CompressionConfig::None => data.to_vec(),
        CompressionConfig::Zstd => {
            let mut decoder = ZstdDecoder::new(Vec::new());
            decoder.write_all(data).await?;
            decoder.shutdown().await?;
            decoder.into_inner()
        }
    };

    if output.len() as u64 != original_size {
        return Err(CodecError::CorruptChunk {
            expected: original_size,
            actual: output.len() as u64,
        });
    }

    Ok(output)
}
