//! The value store: Cairn's write-buffering and flush-ordering engine.
//!
//! [`ValueStore`] sits between callers building values and a durable
//! [`ChunkStore`](cairn_chunks::ChunkStore). Writes are encoded, deduplicated
//! by hash and buffered in memory; `flush` (or crossing the configured size
//! threshold) commits the buffer so that every chunk reaches the backing
//! store only after every buffered chunk it references. Reads are served
//! from a decode cache, then the buffer, then the backing store.
//!
//! # Design Rules
//!
//! 1. Absence is not an error: unknown hashes read as `None`.
//! 2. A backing store reporting a foreign format version poisons the value
//!    store for good; nothing is read or written afterwards.
//! 3. A failed decode never lands in the cache, and a failed put leaves the
//!    chunk buffered.

mod buffer;
pub mod config;
pub mod error;
pub mod store;
pub mod traits;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use store::ValueStore;
pub use traits::{ValueReader, ValueWriter};
