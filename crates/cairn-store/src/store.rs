use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use cairn_chunks::{Chunk, ChunkStore, FORMAT_VERSION};
use cairn_types::Hash;
use cairn_value::{decode, encode, Ref, Value};
use lru::LruCache;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::buffer::WriteBuffer;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::{ValueReader, ValueWriter};

/// Outcome of comparing the backing store's version tag with ours.
enum VersionCheck {
    Unchecked,
    Compatible,
    Incompatible(String),
}

struct StoreState {
    cache: Option<LruCache<Hash, Value>>,
    buffer: WriteBuffer,
    version: VersionCheck,
}

/// Caching, write-buffering front end to a [`ChunkStore`].
///
/// Cloning a `ValueStore` is cheap and yields another handle to the same
/// buffer and cache. All mutable state sits behind one mutex, so writes,
/// reads and flushes from different threads are serialized.
#[derive(Clone)]
pub struct ValueStore {
    chunks: Arc<dyn ChunkStore>,
    config: StoreConfig,
    state: Arc<Mutex<StoreState>>,
}

impl ValueStore {
    /// Wrap a backing store with the default configuration.
    pub fn new(chunks: Arc<dyn ChunkStore>) -> Self {
        Self::with_config(chunks, StoreConfig::default())
    }

    /// Wrap a backing store.
    pub fn with_config(chunks: Arc<dyn ChunkStore>, config: StoreConfig) -> Self {
        let cache = NonZeroUsize::new(config.cache_capacity).map(LruCache::new);
        Self {
            chunks,
            config,
            state: Arc::new(Mutex::new(StoreState {
                cache,
                buffer: WriteBuffer::default(),
                version: VersionCheck::Unchecked,
            })),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The backing chunk store.
    pub fn chunk_store(&self) -> &Arc<dyn ChunkStore> {
        &self.chunks
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Encode `value` and buffer its chunk, returning a ref to it.
    ///
    /// Nothing is written if the chunk is already buffered or already in the
    /// backing store. Otherwise each of the value's children is hinted to
    /// have this chunk as its parent, and the chunk joins the buffer. If the
    /// buffer then holds more than `pending_threshold_bytes`, it is drained
    /// into the backing store (children first) before returning; the backing
    /// store itself is not flushed.
    pub fn write_value(&self, value: &Value) -> StoreResult<Ref> {
        let chunk = encode(value)?;
        let children = value.children();
        let r = Ref::new(chunk.hash(), Ref::height_of(value));

        let mut state = self.lock();
        self.check_version(&mut state)?;

        if state.buffer.contains(&r.target()) || self.chunks.has(&r.target())? {
            debug!(chunk = %r.target().short_hex(), "write of known chunk skipped");
            return Ok(r);
        }

        state.buffer.insert(chunk, &children);
        debug!(
            chunk = %r.target().short_hex(),
            kind = value.kind_name(),
            children = children.len(),
            buffered_bytes = state.buffer.bytes(),
            "buffered value"
        );

        if state.buffer.bytes() > self.config.pending_threshold_bytes {
            let committed = self.drain(&mut state)?;
            debug!(committed, "write buffer over threshold; drained");
        }
        Ok(r)
    }

    /// Commit every buffered chunk, children before parents, then flush the
    /// backing store.
    pub fn flush(&self) -> StoreResult<()> {
        let mut state = self.lock();
        self.check_version(&mut state)?;
        let committed = self.drain(&mut state)?;
        self.chunks.flush()?;
        info!(committed, "value store flushed");
        Ok(())
    }

    /// Number of chunks waiting in the write buffer.
    pub fn buffered_len(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Encoded bytes waiting in the write buffer.
    pub fn buffered_bytes(&self) -> u64 {
        self.lock().buffer.bytes()
    }

    /// The chunk most recently written with a ref to `child`, while that
    /// hint is still live.
    pub fn parent_hint(&self, child: &Hash) -> Option<Hash> {
        self.lock().buffer.parent_hint(child)
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Read a value by hash from the cache, the buffer or the backing store.
    ///
    /// Returns `Ok(None)` if no such chunk exists anywhere.
    pub fn read_value(&self, hash: &Hash) -> StoreResult<Option<Value>> {
        let mut state = self.lock();
        self.check_version(&mut state)?;

        if let Some(hit) = state.cache.as_mut().and_then(|c| c.get(hash)) {
            return Ok(Some(hit.clone()));
        }

        let value = match state.buffer.get(hash).map(decode).transpose()? {
            Some(value) => value,
            None => match self.chunks.get(hash)? {
                Some(chunk) => decode(&chunk)?,
                None => return Ok(None),
            },
        };

        if let Some(cache) = state.cache.as_mut() {
            cache.put(*hash, value.clone());
        }
        Ok(Some(value))
    }

    /// Stream the values for `hashes` as they resolve.
    ///
    /// Cache and buffer hits are answered from memory; the rest are fetched
    /// in one batch on a blocking worker. Unknown hashes are left out. The
    /// channel closes once every resolvable value has been sent, in no
    /// particular order. Dropping the receiver early is fine: the worker
    /// still drains the backing fetch before exiting.
    ///
    /// The worker runs on the current Tokio runtime; called outside one this
    /// returns [`StoreError::NoRuntime`].
    pub fn read_many_values<I>(&self, hashes: I) -> StoreResult<mpsc::Receiver<StoreResult<Value>>>
    where
        I: IntoIterator<Item = Hash>,
    {
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        let mut ready = Vec::new();
        let mut missing = Vec::new();
        {
            let mut state = self.lock();
            self.check_version(&mut state)?;

            let unique: HashSet<Hash> = hashes.into_iter().collect();
            for hash in unique {
                if let Some(hit) = state.cache.as_mut().and_then(|c| c.get(&hash)) {
                    ready.push(hit.clone());
                } else if let Some(chunk) = state.buffer.get(&hash) {
                    ready.push(decode(chunk)?);
                } else {
                    missing.push(hash);
                }
            }
        }

        debug!(ready = ready.len(), fetching = missing.len(), "read_many_values");
        let (tx, rx) = mpsc::channel(self.config.read_many_buffer.max(1));
        let store = self.clone();
        runtime.spawn_blocking(move || store.stream_values(ready, missing, tx));
        Ok(rx)
    }

    fn stream_values(
        &self,
        ready: Vec<Value>,
        missing: Vec<Hash>,
        tx: mpsc::Sender<StoreResult<Value>>,
    ) {
        let mut open = true;
        for value in ready {
            if open && tx.blocking_send(Ok(value)).is_err() {
                open = false;
            }
        }

        let fetched = self.chunks.get_many(&missing, &mut |chunk: Chunk| {
            let item = decode(&chunk).map_err(StoreError::from);
            if let Ok(value) = &item {
                self.cache_insert(chunk.hash(), value);
            }
            if open && tx.blocking_send(item).is_err() {
                debug!("read_many_values receiver dropped; draining fetch");
                open = false;
            }
        });

        if let Err(e) = fetched {
            error!(error = %e, "batched chunk fetch failed");
            if open {
                let _ = tx.blocking_send(Err(e.into()));
            }
        }
    }

    fn cache_insert(&self, hash: Hash, value: &Value) {
        if let Some(cache) = self.lock().cache.as_mut() {
            cache.put(hash, value.clone());
        }
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().expect("lock poisoned")
    }

    /// Compare the backing store's version on first contact; remember a
    /// mismatch forever.
    fn check_version(&self, state: &mut StoreState) -> StoreResult<()> {
        if let VersionCheck::Unchecked = state.version {
            let found = self.chunks.version();
            state.version = if found == FORMAT_VERSION {
                VersionCheck::Compatible
            } else {
                error!(expected = FORMAT_VERSION, %found, "backing store has an incompatible format");
                VersionCheck::Incompatible(found)
            };
        }
        match &state.version {
            VersionCheck::Incompatible(found) => Err(StoreError::IncompatibleVersion {
                expected: FORMAT_VERSION.to_string(),
                found: found.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn drain(&self, state: &mut StoreState) -> StoreResult<usize> {
        let chunks = &self.chunks;
        Ok(state.buffer.drain(|chunk| chunks.put(chunk))?)
    }
}

impl ValueReader for ValueStore {
    fn read_value(&self, hash: &Hash) -> StoreResult<Option<Value>> {
        ValueStore::read_value(self, hash)
    }
}

impl ValueWriter for ValueStore {
    fn write_value(&self, value: &Value) -> StoreResult<Ref> {
        ValueStore::write_value(self, value)
    }
}

impl std::fmt::Debug for ValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ValueStore")
            .field("buffered_chunks", &state.buffer.len())
            .field("buffered_bytes", &state.buffer.bytes())
            .field("cached", &state.cache.as_ref().map_or(0, LruCache::len))
            .finish()
    }
}
