use std::fmt;

use cairn_types::Hash;
use serde::{Deserialize, Serialize};

use crate::codec::encode;
use crate::error::ValueResult;
use crate::value::Value;

/// Weak pointer to a value by the hash of its chunk.
///
/// A `Ref` never holds its target; resolving it takes a store lookup.
/// `height` is the length of the longest ref path below the target plus one,
/// so a ref to a value without children has height 1.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ref {
    target: Hash,
    height: u64,
}

impl Ref {
    /// Build a ref from known parts.
    pub fn new(target: Hash, height: u64) -> Self {
        Self { target, height }
    }

    /// Compute the ref that writing `value` would produce.
    pub fn of(value: &Value) -> ValueResult<Self> {
        let chunk = encode(value)?;
        Ok(Self::new(chunk.hash(), Self::height_of(value)))
    }

    /// Height a ref to `value` carries.
    pub fn height_of(value: &Value) -> u64 {
        1 + value.children().iter().map(Ref::height).max().unwrap_or(0)
    }

    /// Hash of the referenced chunk.
    pub fn target(&self) -> Hash {
        self.target
    }

    /// Height hint of the referenced value.
    pub fn height(&self) -> u64 {
        self.height
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({}, h={})", self.target.short_hex(), self.height)
    }
}
