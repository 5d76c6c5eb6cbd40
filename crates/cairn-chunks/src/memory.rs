use std::collections::HashMap;
use std::sync::RwLock;

use cairn_types::Hash;

use crate::chunk::Chunk;
use crate::error::ChunkResult;
use crate::traits::ChunkStore;
use crate::FORMAT_VERSION;

/// In-memory, HashMap-based chunk store.
///
/// Intended for tests and embedding. Chunks are held behind a `RwLock` and
/// cloned on read. Every `put` is immediately durable for the lifetime of the
/// store, so `flush` has nothing to do.
pub struct MemoryChunkStore {
    chunks: RwLock<HashMap<Hash, Chunk>>,
    version: String,
}

impl MemoryChunkStore {
    /// Create an empty store reporting [`FORMAT_VERSION`].
    pub fn new() -> Self {
        Self::with_version(FORMAT_VERSION)
    }

    /// Create an empty store reporting an arbitrary version tag.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            version: version.into(),
        }
    }

    /// Number of chunks currently stored.
    pub fn len(&self) -> usize {
        self.chunks.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.read().expect("lock poisoned").is_empty()
    }
}

impl Default for MemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn get(&self, hash: &Hash) -> ChunkResult<Option<Chunk>> {
        let map = self.chunks.read().expect("lock poisoned");
        Ok(map.get(hash).cloned())
    }

    fn get_many(&self, hashes: &[Hash], found: &mut dyn FnMut(Chunk)) -> ChunkResult<()> {
        // One lock acquisition for the whole batch.
        let hits: Vec<Chunk> = {
            let map = self.chunks.read().expect("lock poisoned");
            hashes.iter().filter_map(|h| map.get(h).cloned()).collect()
        };
        for chunk in hits {
            found(chunk);
        }
        Ok(())
    }

    fn has(&self, hash: &Hash) -> ChunkResult<bool> {
        let map = self.chunks.read().expect("lock poisoned");
        Ok(map.contains_key(hash))
    }

    fn put(&self, chunk: Chunk) -> ChunkResult<()> {
        let mut map = self.chunks.write().expect("lock poisoned");
        map.entry(chunk.hash()).or_insert(chunk);
        Ok(())
    }

    fn flush(&self) -> ChunkResult<()> {
        Ok(())
    }

    fn version(&self) -> String {
        self.version.clone()
    }
}

impl std::fmt::Debug for MemoryChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChunkStore")
            .field("chunk_count", &self.len())
            .field("version", &self.version)
            .finish()
    }
}
