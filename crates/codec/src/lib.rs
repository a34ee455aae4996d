//! Compression and convergent encryption for weft chunks.
//!
//! This crate implements the leaf stages of the publish pipeline:
//! plaintext chunk -> compress -> convergent AEAD -> [`EncryptedChunk`],
//! and the reverse on retrieve. Compression always runs before encryption;
//! encrypted data is incompressible, so the other order would only waste
//! cycles.
//!
//! [`EncryptedChunk`]: weft_core::EncryptedChunk

pub mod compress;
pub mod convergent;
pub mod error;
pub mod pipeline;

pub use compress::{compress, decompress};
pub use convergent::{ConvergentCipher, StoreSecret};
pub use error::{CodecError, CodecResult};
pub use pipeline::{decode_chunk, encode_chunk};
