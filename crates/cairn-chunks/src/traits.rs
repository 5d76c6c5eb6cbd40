use cairn_types::Hash;

use crate::chunk::Chunk;
use crate::error::ChunkResult;

/// Durable, hash-keyed chunk storage.
///
/// All implementations must satisfy these invariants:
/// - Chunks are immutable once written. Putting a hash that is already
///   present is a no-op.
/// - `put` may buffer internally; only `flush` promises durability. Chunks
///   that were put but not yet flushed are still visible to `get` and `has`.
/// - The store never interprets chunk contents.
/// - All I/O errors are propagated, never silently ignored. Retry policy, if
///   any, lives inside the implementation.
pub trait ChunkStore: Send + Sync {
    /// Fetch a chunk by hash.
    ///
    /// Returns `Ok(None)` if the chunk does not exist.
    fn get(&self, hash: &Hash) -> ChunkResult<Option<Chunk>>;

    /// Fetch many chunks in one batch, handing each to `found` as it arrives.
    ///
    /// Hashes with no chunk are skipped. The default implementation calls
    /// [`get`](ChunkStore::get) for each hash; backends may override it to
    /// save round trips.
    fn get_many(&self, hashes: &[Hash], found: &mut dyn FnMut(Chunk)) -> ChunkResult<()> {
        for hash in hashes {
            if let Some(chunk) = self.get(hash)? {
                found(chunk);
            }
        }
        Ok(())
    }

    /// Check whether a chunk exists.
    fn has(&self, hash: &Hash) -> ChunkResult<bool>;

    /// Enqueue a chunk for durable storage.
    fn put(&self, chunk: Chunk) -> ChunkResult<()>;

    /// Make every chunk put so far durable.
    fn flush(&self) -> ChunkResult<()>;

    /// Format version tag of the data held by this store.
    fn version(&self) -> String;
}
