//! Chunk encoding of values.
//!
//! A value is serialized with bincode, whose output is fully determined by
//! the value: struct fields live in a `BTreeMap` and every other container
//! is ordered, so equal values always produce identical bytes and therefore
//! identical chunk hashes.

use cairn_chunks::Chunk;

use crate::error::{ValueError, ValueResult};
use crate::value::Value;

/// Encode a value into its chunk.
pub fn encode(value: &Value) -> ValueResult<Chunk> {
    let data = bincode::serialize(value).map_err(|e| ValueError::Serialization(e.to_string()))?;
    Ok(Chunk::new(data))
}

/// Decode a chunk back into a value.
///
/// The chunk's bytes are checked against its hash first, so a damaged
/// chunk is reported as such rather than decoded into the wrong value.
/// Decoding is shallow: refs inside the value stay unresolved.
pub fn decode(chunk: &Chunk) -> ValueResult<Value> {
    chunk.verify()?;
    bincode::deserialize(chunk.data()).map_err(|e| ValueError::Decode {
        hash: chunk.hash(),
        reason: e.to_string(),
    })
}
