use cairn_store::StoreError;
use cairn_types::Hash;
use cairn_value::ValueError;

/// Errors from collection construction and traversal.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    /// The value store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An item could not be encoded.
    #[error("value codec error: {0}")]
    Value(#[from] ValueError),

    /// A meta tuple points at a chunk the store does not have.
    #[error("dangling ref in collection tree: {}", .0.short_hex())]
    MissingChunk(Hash),

    /// A value was expected to be a collection of a given kind.
    #[error("expected a {expected}, found a {found}")]
    NotACollection {
        expected: &'static str,
        found: &'static str,
    },
}

/// Result alias for collection operations.
pub type CollectionResult<T> = Result<T, CollectionError>;
