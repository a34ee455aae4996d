//! Encode/decode pipeline for single chunks.
//!
//! Publish direction: plaintext -> address -> compress -> seal.
//! Retrieve direction: open -> decompress -> verify address.

use crate::compress::{compress, decompress};
use crate::convergent::ConvergentCipher;
use crate::error::{CodecError, CodecResult};
use bytes::Bytes;
use weft_core::{ChunkAddress, CompressionConfig, EncryptedChunk};

/// Encode one plaintext chunk into its stored form.
pub async fn encode_chunk(
    plaintext: &[u8],
    index: u32,
    cipher: &ConvergentCipher,
    compression: CompressionConfig,
) -> CodecResult<EncryptedChunk> {
    let address = ChunkAddress::compute(plaintext);
    let compressed = compress(plaintext, compression).await?;
    let compressed_size = compressed.len() as u64;
    let (ciphertext, iv, tag) = cipher.seal(&address, &compressed)?;

    Ok(EncryptedChunk {
        address,
        ciphertext: Bytes::from(ciphertext),
        iv,
        tag,
        original_size: plaintext.len() as u64,
        compressed_size,
        index,
    })
}

/// Decode a stored chunk back to plaintext.
///
/// Fails closed on tag mismatch, on a decompressed-length mismatch, and on
/// a plaintext that does not hash back to the chunk's address.
pub async fn decode_chunk(
    chunk: &EncryptedChunk,
    cipher: &ConvergentCipher,
    compression: CompressionConfig,
) -> CodecResult<Bytes> {
    let compressed = cipher.open(&chunk.address, &chunk.ciphertext, &chunk.tag)?;
    let plaintext = decompress(&compressed, compression, chunk.original_size).await?;

    let actual = ChunkAddress::compute(&plaintext);
    if actual != chunk.address {
        return Err(CodecError::AddressMismatch {
            expected: chunk.address.to_hex(),
            actual: actual.to_hex(),
        });
    }

    Ok(Bytes::from(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergent::StoreSecret;

    fn test_cipher() -> ConvergentCipher {
        ConvergentCipher::new(StoreSecret::from_bytes([3u8; 32]))
    }

    #[tokio::test]
    async fn test_encode_decode_roundtrip() {
        let cipher = test_cipher();
        let plaintext = b"round trip payload".repeat(100);

        let chunk = encode_chunk(&plaintext, 0, &cipher, CompressionConfig::Zstd)
            .await
            .unwrap();
        assert_eq!(chunk.original_size, plaintext.len() as u64);
        assert_eq!(chunk.compressed_size, chunk.ciphertext.len() as u64);

        let restored = decode_chunk(&chunk, &cipher, CompressionConfig::Zstd)
            .await
            .unwrap();
        assert_eq!(restored.as_ref(), plaintext.as_slice());
    }

    #[tokio::test]
    async fn test_encoding_converges() {
        let cipher = test_cipher();
        let plaintext = b"identical chunk plaintext";

        let a = encode_chunk(plaintext, 0, &cipher, CompressionConfig::Zstd)
            .await
            .unwrap();
        let b = encode_chunk(plaintext, 5, &cipher, CompressionConfig::Zstd)
            .await
            .unwrap();

        // Address, ciphertext, iv, and tag all converge; only the index differs.
        assert_eq!(a.address, b.address);
        assert_eq!(a.ciphertext, b.ciphertext);
        assert_eq!(a.iv, b.iv);
        assert_eq!(a.tag, b.tag);
    }

    #[tokio::test]
    async fn test_flipped_ciphertext_bit_fails_authentication() {
        let cipher = test_cipher();
        let chunk = encode_chunk(b"payload", 0, &cipher, CompressionConfig::None)
            .await
            .unwrap();

        let mut corrupted = chunk.clone();
        let mut bytes = corrupted.ciphertext.to_vec();
        bytes[0] ^= 0x01;
        corrupted.ciphertext = Bytes::from(bytes);

        assert!(matches!(
            decode_chunk(&corrupted, &cipher, CompressionConfig::None).await,
            Err(CodecError::AuthenticationFailed)
        ));
    }

    #[tokio::test]
    async fn test_empty_chunk() {
        let cipher = test_cipher();
        let chunk = encode_chunk(b"", 0, &cipher, CompressionConfig::Zstd)
            .await
            .unwrap();
        let restored = decode_chunk(&chunk, &cipher, CompressionConfig::Zstd)
            .await
            .unwrap();
        assert!(restored.is_empty());
    }
}
