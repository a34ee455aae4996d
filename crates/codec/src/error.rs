//! Codec error types.

use thiserror::Error;

/// Errors from compression and convergent encryption.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),

    #[error("corrupt chunk: decompressed to {actual} bytes, expected {expected}")]
    CorruptChunk { expected: u64, actual: u64 },

    #[error("authentication failed: GCM tag mismatch")]
    AuthenticationFailed,

    #[error("address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: String, actual: String },

    #[error("invalid store secret: {0}")]
    InvalidSecret(String),
}

/// Result type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;
