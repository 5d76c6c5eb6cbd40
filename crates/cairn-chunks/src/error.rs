use cairn_types::Hash;

/// Errors from chunk store operations.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// The bytes of a chunk do not digest to the hash it was stored under.
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: Hash, computed: Hash },

    /// A chunk log could not be parsed.
    #[error("corrupt chunk log at offset {offset}: {reason}")]
    CorruptLog { offset: u64, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for chunk store operations.
pub type ChunkResult<T> = Result<T, ChunkError>;
