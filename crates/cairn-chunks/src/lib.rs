//! Chunks and the stores that hold them durably.
//!
//! A [`Chunk`] is an immutable blob of encoded bytes identified by the
//! domain-separated BLAKE3 digest of those bytes. Stores never interpret
//! chunk contents; they are pure hash-keyed blob stores.
//!
//! # Backends
//!
//! All backends implement [`ChunkStore`]:
//!
//! - [`MemoryChunkStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileChunkStore`] -- append-only log file with an in-memory index
//!
//! [`RecordingChunkStore`] wraps any backend and remembers the order of
//! `put` calls, which is what flush-ordering tests assert against.
//!
//! # Design Rules
//!
//! 1. Chunks are immutable once written; a second `put` of the same hash is
//!    a no-op.
//! 2. `put` may buffer; only `flush` promises durability.
//! 3. Every backend reports a format version tag. Readers compare it to
//!    [`FORMAT_VERSION`] before touching any data.

pub mod chunk;
pub mod error;
pub mod file;
pub mod memory;
pub mod testing;
pub mod traits;

pub use chunk::{Chunk, ContentHasher};
pub use error::{ChunkError, ChunkResult};
pub use file::{FileChunkStore, FileStoreConfig};
pub use memory::MemoryChunkStore;
pub use testing::RecordingChunkStore;
pub use traits::ChunkStore;

/// Version tag of the chunk format this build reads and writes.
pub const FORMAT_VERSION: &str = "cairn-1";
