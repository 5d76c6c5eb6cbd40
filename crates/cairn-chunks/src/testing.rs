//! Test doubles for code built on top of [`ChunkStore`].

use std::sync::Mutex;

use cairn_types::Hash;

use crate::chunk::Chunk;
use crate::error::ChunkResult;
use crate::memory::MemoryChunkStore;
use crate::traits::ChunkStore;

/// Chunk store wrapper that records every `put` and `flush` it forwards.
///
/// Flush-ordering tests use the recorded put order to check that each chunk
/// reached the store only after the chunks it references.
pub struct RecordingChunkStore<S = MemoryChunkStore> {
    inner: S,
    puts: Mutex<Vec<Hash>>,
    flushes: Mutex<usize>,
}

impl RecordingChunkStore<MemoryChunkStore> {
    /// Wrap a fresh in-memory store.
    pub fn new() -> Self {
        Self::wrap(MemoryChunkStore::new())
    }
}

impl Default for RecordingChunkStore<MemoryChunkStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ChunkStore> RecordingChunkStore<S> {
    /// Wrap an existing store.
    pub fn wrap(inner: S) -> Self {
        Self {
            inner,
            puts: Mutex::new(Vec::new()),
            flushes: Mutex::new(0),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Hashes passed to `put`, oldest first.
    pub fn puts(&self) -> Vec<Hash> {
        self.puts.lock().expect("lock poisoned").clone()
    }

    /// Position of `hash` in the put log, if it was ever put.
    pub fn put_index(&self, hash: &Hash) -> Option<usize> {
        self.puts
            .lock()
            .expect("lock poisoned")
            .iter()
            .position(|h| h == hash)
    }

    /// Number of `flush` calls forwarded.
    pub fn flush_count(&self) -> usize {
        *self.flushes.lock().expect("lock poisoned")
    }

    /// Forget everything recorded so far.
    pub fn reset(&self) {
        self.puts.lock().expect("lock poisoned").clear();
        *self.flushes.lock().expect("lock poisoned") = 0;
    }
}

impl<S: ChunkStore> ChunkStore for RecordingChunkStore<S> {
    fn get(&self, hash: &Hash) -> ChunkResult<Option<Chunk>> {
        self.inner.get(hash)
    }

    fn get_many(&self, hashes: &[Hash], found: &mut dyn FnMut(Chunk)) -> ChunkResult<()> {
        self.inner.get_many(hashes, found)
    }

    fn has(&self, hash: &Hash) -> ChunkResult<bool> {
        self.inner.has(hash)
    }

    fn put(&self, chunk: Chunk) -> ChunkResult<()> {
        self.puts.lock().expect("lock poisoned").push(chunk.hash());
        self.inner.put(chunk)
    }

    fn flush(&self) -> ChunkResult<()> {
        *self.flushes.lock().expect("lock poisoned") += 1;
        self.inner.flush()
    }

    fn version(&self) -> String {
        self.inner.version()
    }
}
