//! Bottom-up construction of sequence trees.

use cairn_store::ValueWriter;
use cairn_value::{encode, MetaTuple, Sequence, Value};
use tracing::debug;

use crate::config::SequenceConfig;
use crate::error::{CollectionError, CollectionResult};

/// Which collection a tree belongs to. Child chunks carry the same kind as
/// their root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Set,
    List,
}

impl CollectionKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::List => "list",
        }
    }

    /// Wrap a sequence into a value of this kind.
    pub fn wrap(self, seq: Sequence) -> Value {
        match self {
            Self::Set => Value::Set(seq),
            Self::List => Value::List(seq),
        }
    }

    /// Take the sequence out of a value of this kind.
    pub fn unwrap(self, value: Value) -> CollectionResult<Sequence> {
        match (self, value) {
            (Self::Set, Value::Set(seq)) | (Self::List, Value::List(seq)) => Ok(seq),
            (_, other) => Err(CollectionError::NotACollection {
                expected: self.name(),
                found: other.kind_name(),
            }),
        }
    }
}

/// Build the root sequence for `items`, writing every non-root node.
///
/// Items are taken in the order given; sets sort and deduplicate before
/// calling this. A group of entries closes at a content-defined boundary
/// (see [`SequenceConfig`]), so the shape depends only on the items. Each
/// closed group below the root is written through `writer` as a `kind` value
/// and referenced from a [`MetaTuple`] one level up. All leaves end at the
/// same depth.
pub fn build_sequence<W: ValueWriter + ?Sized>(
    writer: &W,
    kind: CollectionKind,
    config: &SequenceConfig,
    items: Vec<Value>,
) -> CollectionResult<Sequence> {
    let total = items.len();
    let groups = group_items(config, items)?;
    if groups.len() <= 1 {
        return Ok(Sequence::Leaf(groups.into_iter().next().unwrap_or_default()));
    }

    let mut tuples = Vec::with_capacity(groups.len());
    for group in groups {
        tuples.push(write_leaf(writer, kind, group)?);
    }

    let mut levels = 1;
    loop {
        let groups = group_tuples(config, tuples);
        if groups.len() <= 1 {
            debug!(kind = kind.name(), items = total, levels, "built sequence tree");
            return Ok(Sequence::Meta(groups.into_iter().next().unwrap_or_default()));
        }
        tuples = Vec::with_capacity(groups.len());
        for group in groups {
            tuples.push(write_meta(writer, kind, group)?);
        }
        levels += 1;
    }
}

fn write_leaf<W: ValueWriter + ?Sized>(
    writer: &W,
    kind: CollectionKind,
    items: Vec<Value>,
) -> CollectionResult<MetaTuple> {
    let count = items.len() as u64;
    let boundary = items.last().cloned().unwrap_or(Value::Bool(false));
    let child = writer.write_value(&kind.wrap(Sequence::Leaf(items)))?;
    Ok(MetaTuple::new(child, boundary, count))
}

fn write_meta<W: ValueWriter + ?Sized>(
    writer: &W,
    kind: CollectionKind,
    tuples: Vec<MetaTuple>,
) -> CollectionResult<MetaTuple> {
    let count = tuples.iter().map(|t| t.count).sum();
    let boundary = tuples
        .last()
        .map(|t| t.boundary.clone())
        .unwrap_or(Value::Bool(false));
    let child = writer.write_value(&kind.wrap(Sequence::Meta(tuples)))?;
    Ok(MetaTuple::new(child, boundary, count))
}

fn group_items(config: &SequenceConfig, items: Vec<Value>) -> CollectionResult<Vec<Vec<Value>>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    for item in items {
        let prefix = encode(&item)?.hash().prefix_u32();
        current.push(item);
        if config.closes(current.len(), prefix) {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    Ok(groups)
}

fn group_tuples(config: &SequenceConfig, tuples: Vec<MetaTuple>) -> Vec<Vec<MetaTuple>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    for tuple in tuples {
        let prefix = tuple.child.target().prefix_u32();
        current.push(tuple);
        if config.closes(current.len(), prefix) {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_chunks::MemoryChunkStore;
    use cairn_store::{ValueReader, ValueStore};
    use std::sync::Arc;

    fn store() -> ValueStore {
        ValueStore::new(Arc::new(MemoryChunkStore::new()))
    }

    fn numbers(n: i64) -> Vec<Value> {
        (0..n).map(Value::Number).collect()
    }

    /// Depth of every leaf below `seq`, one entry per leaf.
    fn leaf_depths(vs: &ValueStore, seq: &Sequence, depth: usize, out: &mut Vec<usize>) {
        match seq {
            Sequence::Leaf(_) => out.push(depth),
            Sequence::Meta(tuples) => {
                for t in tuples {
                    let child = vs.read_value(&t.child.target()).unwrap().unwrap();
                    let child = CollectionKind::Set.unwrap(child).unwrap();
                    leaf_depths(vs, &child, depth + 1, out);
                }
            }
        }
    }

    #[test]
    fn small_input_stays_inline() {
        let vs = store();
        let root = build_sequence(&vs, CollectionKind::Set, &SequenceConfig::default(), numbers(1))
            .unwrap();
        assert_eq!(root, Sequence::Leaf(numbers(1)));
        assert_eq!(vs.buffered_len(), 0);

        let empty =
            build_sequence(&vs, CollectionKind::List, &SequenceConfig::default(), Vec::new())
                .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn large_input_builds_balanced_tree() {
        let vs = store();
        let root =
            build_sequence(&vs, CollectionKind::Set, &SequenceConfig::narrow(), numbers(200))
                .unwrap();
        assert!(!root.is_leaf());
        assert_eq!(root.item_count(), 200);
        assert_eq!(root.last_key(), Some(&Value::Number(199)));

        let mut depths = Vec::new();
        leaf_depths(&vs, &root, 0, &mut depths);
        assert!(depths.len() > 1);
        assert!(depths.iter().all(|d| *d == depths[0]), "uneven leaves: {depths:?}");
    }

    #[test]
    fn nodes_respect_max_fanout() {
        let vs = store();
        let config = SequenceConfig::narrow();
        let root = build_sequence(&vs, CollectionKind::Set, &config, numbers(100)).unwrap();
        assert!(root.len() <= config.max_fanout);
        if let Sequence::Meta(tuples) = &root {
            for t in tuples {
                let child = vs.read_value(&t.child.target()).unwrap().unwrap();
                assert!(child.sequence().unwrap().len() <= config.max_fanout);
            }
        }
    }

    #[test]
    fn shape_depends_only_on_items() {
        let a = build_sequence(&store(), CollectionKind::Set, &SequenceConfig::narrow(), numbers(64))
            .unwrap();
        let b = build_sequence(&store(), CollectionKind::Set, &SequenceConfig::narrow(), numbers(64))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let err = CollectionKind::Set.unwrap(Value::List(Sequence::empty())).unwrap_err();
        assert!(matches!(
            err,
            CollectionError::NotACollection {
                expected: "set",
                found: "list"
            }
        ));
    }
}
