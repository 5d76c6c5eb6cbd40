use cairn_chunks::ChunkError;
use cairn_types::Hash;

/// Errors from encoding and decoding values.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// The value could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The chunk bytes are not a valid value encoding.
    #[error("cannot decode chunk {hash}: {reason}")]
    Decode { hash: Hash, reason: String },

    /// The chunk itself is damaged.
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

/// Result alias for value operations.
pub type ValueResult<T> = Result<T, ValueError>;
