//! Engine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown content id. Recoverable; surfaced to the caller.
    #[error("content not found: {0}")]
    ContentNotFound(String),

    /// A manifest references an address the store does not hold. This is a
    /// consistency violation that correct operation never produces.
    #[error("chunk {address} missing for content {content_id}")]
    ChunkMissing {
        content_id: String,
        address: String,
    },

    /// The operation was cancelled at a chunk boundary.
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Codec(#[from] weft_codec::CodecError),

    #[error(transparent)]
    Store(#[from] weft_store::StoreError),

    #[error(transparent)]
    Core(#[from] weft_core::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
