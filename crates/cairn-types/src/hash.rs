use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Number of bytes in a [`Hash`].
pub const HASH_LEN: usize = 32;

/// Content digest of an encoded chunk.
///
/// A `Hash` is the BLAKE3 digest of a chunk's bytes. It is the only identity
/// a chunk has: two chunks with equal hashes are the same chunk, and a
/// reference to a chunk is nothing more than its hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    /// Digest raw bytes without any domain tag.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Wrap a pre-computed digest.
    pub const fn from_digest(digest: [u8; HASH_LEN]) -> Self {
        Self(digest)
    }

    /// The empty hash (all zeros). Never the digest of a real chunk.
    pub const fn empty() -> Self {
        Self([0u8; HASH_LEN])
    }

    /// Returns `true` for the all-zero hash.
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// First four digest bytes as a little-endian integer.
    ///
    /// Digests are uniformly distributed, so this is usable as a cheap
    /// pseudo-random draw keyed by content.
    pub fn prefix_u32(&self) -> u32 {
        u32::from_le_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Full lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight hex characters, for logs.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = TypeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let digest: [u8; HASH_LEN] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: HASH_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(digest))
    }
}

impl From<[u8; HASH_LEN]> for Hash {
    fn from(digest: [u8; HASH_LEN]) -> Self {
        Self(digest)
    }
}

impl From<Hash> for [u8; HASH_LEN] {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(Hash::of(b"hello"), Hash::of(b"hello"));
        assert_ne!(Hash::of(b"hello"), Hash::of(b"world"));
    }

    #[test]
    fn empty_hash_is_all_zeros() {
        assert!(Hash::empty().is_empty());
        assert!(Hash::default().is_empty());
        assert!(!Hash::of(b"").is_empty());
    }

    #[test]
    fn hex_forms() {
        let h = Hash::of(b"test");
        assert_eq!(h.short_hex().len(), 8);
        assert!(h.to_hex().starts_with(&h.short_hex()));
        assert_eq!(format!("{h}"), h.to_hex());
    }

    #[test]
    fn slice_conversion_checks_length() {
        let h = Hash::of(b"bytes");
        assert_eq!(Hash::try_from(&h.as_bytes()[..]).unwrap(), h);
        assert_eq!(
            Hash::try_from(&[1u8, 2][..]),
            Err(TypeError::InvalidLength { expected: 32, actual: 2 })
        );
    }

    #[test]
    fn prefix_reads_first_four_bytes() {
        let mut digest = [0u8; HASH_LEN];
        digest[0] = 1;
        digest[3] = 2;
        assert_eq!(Hash::from_digest(digest).prefix_u32(), 0x0200_0001);
    }

    #[test]
    fn serde_json_keeps_identity() {
        let h = Hash::of(b"serde");
        let json = serde_json::to_string(&h).unwrap();
        let parsed: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, h);
    }

    #[test]
    fn ordering_follows_bytes() {
        assert!(Hash::from_digest([0; 32]) < Hash::from_digest([1; 32]));
    }
}
