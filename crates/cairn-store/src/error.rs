use cairn_chunks::ChunkError;
use cairn_value::ValueError;

/// Errors from value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store holds data in a format this build does not speak.
    ///
    /// Fatal: once seen, every later operation on the same value store fails
    /// with this error.
    #[error("incompatible chunk format: expected {expected}, backing store reports {found}")]
    IncompatibleVersion { expected: String, found: String },

    /// Failure inside the backing chunk store.
    #[error("chunk store error: {0}")]
    Chunk(#[from] ChunkError),

    /// A streaming read was started outside a Tokio runtime.
    #[error("read_many_values needs a Tokio runtime")]
    NoRuntime,

    /// A chunk could not be encoded or decoded.
    #[error("value codec error: {0}")]
    Value(#[from] ValueError),
}

impl StoreError {
    /// Returns `true` for errors that must never be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IncompatibleVersion { .. })
    }
}

/// Result alias for value store operations.
pub type StoreResult<T> = Result<T, StoreError>;
