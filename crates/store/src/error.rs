//! Store error types.

use thiserror::Error;

/// Format missing addresses for display, capped to keep log lines bounded.
fn format_missing(addresses: &[String]) -> String {
    const MAX_DISPLAYED: usize = 5;
    if addresses.len() <= MAX_DISPLAYED {
        format!("{addresses:?}")
    } else {
        let sample: Vec<_> = addresses.iter().take(MAX_DISPLAYED).collect();
        format!("{:?} (and {} more)", sample, addresses.len() - MAX_DISPLAYED)
    }
}

/// Chunk/manifest store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("corrupt chunk record for {address}: {detail}")]
    CorruptChunk { address: String, detail: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest {content_id} references {} missing chunks: {}", .missing.len(), format_missing(.missing))]
    MissingChunks {
        content_id: String,
        missing: Vec<String>,
    },

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
