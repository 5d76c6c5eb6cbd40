use cairn_types::Hash;

use crate::error::{ChunkError, ChunkResult};

/// Domain-separated BLAKE3 content hasher.
///
/// The domain tag is prepended to every digest, so a chunk's hash can never
/// collide with a hash computed for some other purpose over the same bytes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for value chunks.
    pub const CHUNK: Self = Self {
        domain: "cairn-chunk-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Hash::from_digest(*hasher.finalize().as_bytes())
    }
}

/// Immutable encoded byte blob identified by its content hash.
#[derive(Clone, PartialEq, Eq)]
pub struct Chunk {
    hash: Hash,
    data: Vec<u8>,
}

impl Chunk {
    /// Wrap encoded bytes, computing their hash.
    pub fn new(data: Vec<u8>) -> Self {
        let hash = ContentHasher::CHUNK.hash(&data);
        Self { hash, data }
    }

    /// Rebuild a chunk from bytes read back under a known hash.
    ///
    /// The pairing is not checked here; call [`Chunk::verify`] before
    /// trusting the data.
    pub fn from_parts(hash: Hash, data: Vec<u8>) -> Self {
        Self { hash, data }
    }

    /// The content hash.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// The encoded bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the chunk carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume the chunk, returning its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Recompute the digest and compare it with the stored hash.
    pub fn verify(&self) -> ChunkResult<()> {
        let computed = ContentHasher::CHUNK.hash(&self.data);
        if computed != self.hash {
            return Err(ChunkError::HashMismatch {
                expected: self.hash,
                computed,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("hash", &self.hash)
            .field("len", &self.data.len())
            .finish()
    }
}
