//! Convergent authenticated encryption.
//!
//! Ordinary randomized AEAD defeats content-addressed deduplication: a fresh
//! random IV per call makes identical plaintexts produce different
//! ciphertexts. Weft instead derives the per-chunk key and IV from the chunk
//! address and a store-wide secret:
//!
//! - key = HMAC-SHA256(store_secret, "weft-convergent-v1:" || address)
//! - IV  = first 12 bytes of HMAC-SHA256(key, address)
//! - AES-256-GCM over the compressed plaintext
//!
//! Two publishes of identical plaintext converge to one stored chunk,
//! address, and ciphertext. The tradeoff: an attacker who can guess a
//! plaintext and holds the store secret can confirm its presence by
//! recomputing the address. An outsider without the secret cannot mount the
//! offline dictionary attack that breaks naive convergent encryption.

use crate::error::{CodecError, CodecResult};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use weft_core::ChunkAddress;

type HmacSha256 = Hmac<Sha256>;

/// Domain separation prefix for key derivation.
const KEY_DERIVATION_CONTEXT: &[u8] = b"weft-convergent-v1:";

/// A store-wide secret for convergent key derivation.
pub struct StoreSecret([u8; 32]);

impl StoreSecret {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a new random secret.
    pub fn generate() -> Self {
        use rand_core::{OsRng, RngCore};
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse from 64 hex characters.
    pub fn from_hex(s: &str) -> CodecResult<Self> {
        if s.len() != 64 {
            return Err(CodecError::InvalidSecret(format!(
                "expected 64 hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex_str = std::str::from_utf8(chunk)
                .map_err(|e| CodecError::InvalidSecret(e.to_string()))?;
            bytes[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|e| CodecError::InvalidSecret(e.to_string()))?;
        }
        Ok(Self(bytes))
    }

    /// Encode as lowercase hex.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for StoreSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreSecret([REDACTED])")
    }
}

/// Convergent AES-256-GCM cipher bound to one store secret.
pub struct ConvergentCipher {
    secret: StoreSecret,
}

impl ConvergentCipher {
    /// Create a cipher from a store secret.
    pub fn new(secret: StoreSecret) -> Self {
        Self { secret }
    }

    /// Derive the per-chunk AES-256 key from the chunk address.
    fn derive_key(&self, address: &ChunkAddress) -> [u8; 32] {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret.0)
            .expect("HMAC accepts any key length");
        mac.update(KEY_DERIVATION_CONTEXT);
        mac.update(address.as_bytes());
        mac.finalize().into_bytes().into()
    }

    /// Derive the deterministic 12-byte IV from the key and address.
    fn derive_iv(key: &[u8; 32], address: &ChunkAddress) -> [u8; 12] {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
        mac.update(address.as_bytes());
        let digest = mac.finalize().into_bytes();
        let mut iv = [0u8; 12];
        iv.copy_from_slice(&digest[..12]);
        iv
    }

    /// Encrypt compressed chunk plaintext.
    ///
    /// Returns the ciphertext, the derived IV, and the 16-byte GCM tag.
    pub fn seal(
        &self,
        address: &ChunkAddress,
        compressed: &[u8],
    ) -> CodecResult<(Vec<u8>, [u8; 12], [u8; 16])> {
        let key_bytes = self.derive_key(address);
        let iv = Self::derive_iv(&key_bytes, address);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        let mut ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: compressed,
                    aad: address.as_bytes(),
                },
            )
            .map_err(|_| CodecError::AuthenticationFailed)?;

        // aes-gcm appends the tag; split it off for separate storage.
        let tag_offset = ciphertext.len() - 16;
        let mut tag = [0u8; 16];
        tag.copy_from_slice(&ciphertext[tag_offset..]);
        ciphertext.truncate(tag_offset);

        Ok((ciphertext, iv, tag))
    }

    /// Decrypt a chunk, failing closed on any tag mismatch.
    ///
    /// Key and IV are recomputed from the known address; partially-verified
    /// plaintext is never returned.
    pub fn open(
        &self,
        address: &ChunkAddress,
        ciphertext: &[u8],
        tag: &[u8; 16],
    ) -> CodecResult<Vec<u8>> {
        let key_bytes = self.derive_key(address);
        let iv = Self::derive_iv(&key_bytes, address);

        let mut combined = Vec::with_capacity(ciphertext.len() + 16);
        combined.extend_from_slice(ciphertext);
        combined.extend_from_slice(tag);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        cipher
            .decrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: &combined,
                    aad: address.as_bytes(),
                },
            )
            .map_err(|_| CodecError::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> ConvergentCipher {
        ConvergentCipher::new(StoreSecret::from_bytes([42u8; 32]))
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let cipher = test_cipher();
        let plaintext = b"compressed chunk bytes";
        let address = ChunkAddress::compute(plaintext);

        let (ciphertext, _iv, tag) = cipher.seal(&address, plaintext).unwrap();
        let restored = cipher.open(&address, &ciphertext, &tag).unwrap();
        assert_eq!(restored, plaintext);
    }

    #[test]
    fn test_sealing_is_deterministic() {
        let cipher = test_cipher();
        let plaintext = b"identical plaintext";
        let address = ChunkAddress::compute(plaintext);

        let (ct1, iv1, tag1) = cipher.seal(&address, plaintext).unwrap();
        let (ct2, iv2, tag2) = cipher.seal(&address, plaintext).unwrap();
        assert_eq!(ct1, ct2);
        assert_eq!(iv1, iv2);
        assert_eq!(tag1, tag2);
    }

    #[test]
    fn test_different_secrets_diverge() {
        let plaintext = b"shared plaintext";
        let address = ChunkAddress::compute(plaintext);

        let a = ConvergentCipher::new(StoreSecret::from_bytes([1u8; 32]));
        let b = ConvergentCipher::new(StoreSecret::from_bytes([2u8; 32]));

        let (ct_a, _, _) = a.seal(&address, plaintext).unwrap();
        let (ct_b, _, _) = b.seal(&address, plaintext).unwrap();
        assert_ne!(ct_a, ct_b);
    }

    #[test]
    fn test_tampered_ciphertext_fails_closed() {
        let cipher = test_cipher();
        let plaintext = b"integrity matters";
        let address = ChunkAddress::compute(plaintext);

        let (mut ciphertext, _iv, tag) = cipher.seal(&address, plaintext).unwrap();
        ciphertext[0] ^= 0x01;

        match cipher.open(&address, &ciphertext, &tag) {
            Err(CodecError::AuthenticationFailed) => {}
            other => panic!("expected AuthenticationFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_tampered_tag_fails_closed() {
        let cipher = test_cipher();
        let plaintext = b"integrity matters";
        let address = ChunkAddress::compute(plaintext);

        let (ciphertext, _iv, mut tag) = cipher.seal(&address, plaintext).unwrap();
        tag[15] ^= 0x80;

        assert!(matches!(
            cipher.open(&address, &ciphertext, &tag),
            Err(CodecError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_secret_hex_roundtrip() {
        let secret = StoreSecret::from_bytes([7u8; 32]);
        let hex = secret.to_hex();
        let parsed = StoreSecret::from_hex(&hex).unwrap();
        assert_eq!(parsed.0, secret.0);
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = StoreSecret::from_bytes([9u8; 32]);
        assert_eq!(format!("{secret:?}"), "StoreSecret([REDACTED])");
    }
}
