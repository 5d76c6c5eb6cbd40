use serde::{Deserialize, Serialize};

use crate::refs::Ref;
use crate::value::Value;

/// Routing entry of a meta sequence.
///
/// `child` points at a collection chunk whose root sequence holds the
/// subtree; `boundary` is the last item of that subtree (the largest, for
/// sets) and `count` the number of items in it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetaTuple {
    pub child: Ref,
    pub boundary: Value,
    pub count: u64,
}

impl MetaTuple {
    pub fn new(child: Ref, boundary: Value, count: u64) -> Self {
        Self {
            child,
            boundary,
            count,
        }
    }
}

/// One node of a persistent ordered tree.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sequence {
    /// Items stored inline.
    Leaf(Vec<Value>),
    /// Tuples routing to child sequences.
    Meta(Vec<MetaTuple>),
}

impl Sequence {
    /// An empty leaf.
    pub fn empty() -> Self {
        Self::Leaf(Vec::new())
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    /// Number of entries at this level (items or tuples).
    pub fn len(&self) -> usize {
        match self {
            Self::Leaf(items) => items.len(),
            Self::Meta(tuples) => tuples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of items in the subtree rooted here.
    pub fn item_count(&self) -> u64 {
        match self {
            Self::Leaf(items) => items.len() as u64,
            Self::Meta(tuples) => tuples.iter().map(|t| t.count).sum(),
        }
    }

    /// Ordering key of entry `index`: the item itself in a leaf, the
    /// boundary in a meta sequence.
    pub fn key_at(&self, index: usize) -> &Value {
        match self {
            Self::Leaf(items) => &items[index],
            Self::Meta(tuples) => &tuples[index].boundary,
        }
    }

    /// Key of the last entry, i.e. the last item of the whole subtree.
    pub fn last_key(&self) -> Option<&Value> {
        match self {
            Self::Leaf(items) => items.last(),
            Self::Meta(tuples) => tuples.last().map(|t| &t.boundary),
        }
    }

    /// Item count of entry `index`: 1 in a leaf, the tuple count in a meta
    /// sequence.
    pub fn count_at(&self, index: usize) -> u64 {
        match self {
            Self::Leaf(_) => 1,
            Self::Meta(tuples) => tuples[index].count,
        }
    }

    /// First index at or after `from` whose key is `>= key`.
    pub fn seek_from(&self, from: usize, key: &Value) -> Option<usize> {
        (from..self.len()).find(|&i| self.key_at(i) >= key)
    }
}
