use std::future::Future;

use cairn_store::{ValueReader, ValueWriter};
use cairn_types::Hash;
use cairn_value::{Sequence, Value};
use futures::future::join_all;
use tracing::debug;

use crate::builder::{build_sequence, CollectionKind};
use crate::config::SequenceConfig;
use crate::cursor::{walk, Cursor};
use crate::error::{CollectionError, CollectionResult};

/// Sorted collection of unique values, stored as a sequence tree.
///
/// A `Set` is only the root sequence; every deeper node is read on demand
/// through the `ValueReader` passed to each operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Set {
    root: Sequence,
}

impl Set {
    /// Build a set from `items` in any order. Duplicates collapse.
    pub fn new<W: ValueWriter + ?Sized>(
        writer: &W,
        config: &SequenceConfig,
        items: impl IntoIterator<Item = Value>,
    ) -> CollectionResult<Self> {
        let mut items: Vec<Value> = items.into_iter().collect();
        items.sort();
        items.dedup();
        let root = build_sequence(writer, CollectionKind::Set, config, items)?;
        Ok(Self { root })
    }

    /// Load the set stored under `hash`.
    pub fn load<R: ValueReader + ?Sized>(reader: &R, hash: &Hash) -> CollectionResult<Self> {
        let value = reader
            .read_value(hash)?
            .ok_or(CollectionError::MissingChunk(*hash))?;
        Self::try_from(value)
    }

    pub fn root(&self) -> &Sequence {
        &self.root
    }

    pub fn into_value(self) -> Value {
        Value::Set(self.root)
    }

    /// Number of items, read off the root without descending.
    pub fn len(&self) -> u64 {
        self.root.item_count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// A cursor at the first item `>= key`, or at the start.
    pub fn cursor<'r, R: ValueReader + ?Sized>(
        &self,
        reader: &'r R,
        key: Option<&Value>,
    ) -> CollectionResult<Cursor<'r, R>> {
        Cursor::at_key(reader, &self.root, key)
    }

    /// The smallest item.
    pub fn first<R: ValueReader + ?Sized>(&self, reader: &R) -> CollectionResult<Option<Value>> {
        Ok(self.cursor(reader, None)?.current().cloned())
    }

    /// Whether `key` is a member.
    pub fn has<R: ValueReader + ?Sized>(&self, reader: &R, key: &Value) -> CollectionResult<bool> {
        Ok(self.cursor(reader, Some(key))?.current() == Some(key))
    }

    /// Visit every item in ascending order.
    pub fn for_each<R: ValueReader + ?Sized>(
        &self,
        reader: &R,
        visit: impl FnMut(&Value),
    ) -> CollectionResult<()> {
        walk(reader, &self.root, visit)
    }

    /// Apply an asynchronous `transform` to every item.
    ///
    /// The transforms run concurrently; results come back in ascending item
    /// order.
    pub async fn map<R, F, Fut>(&self, reader: &R, mut transform: F) -> CollectionResult<Vec<Fut::Output>>
    where
        R: ValueReader + ?Sized,
        F: FnMut(Value) -> Fut,
        Fut: Future,
    {
        let mut pending = Vec::new();
        self.for_each(reader, |item| pending.push(transform(item.clone())))?;
        Ok(join_all(pending).await)
    }

    /// Items present in this set and in every one of `others`, ascending.
    ///
    /// Each round takes the largest current item across all cursors as the
    /// candidate and advances every cursor to it. If they all land on it, it
    /// is emitted and every cursor steps once; otherwise the overshooting
    /// cursor already holds the next candidate. The first exhausted cursor
    /// ends the search.
    pub fn intersect<R: ValueReader + ?Sized>(
        &self,
        reader: &R,
        others: &[&Set],
    ) -> CollectionResult<Vec<Value>> {
        let mut cursors = Vec::with_capacity(others.len() + 1);
        cursors.push(self.cursor(reader, None)?);
        for other in others {
            cursors.push(other.cursor(reader, None)?);
        }

        let mut out = Vec::new();
        let mut rounds = 0usize;
        'search: while cursors.iter().all(Cursor::is_valid) {
            rounds += 1;
            let Some(candidate) = cursors.iter().filter_map(|c| c.current()).max().cloned() else {
                break;
            };

            let mut agreed = true;
            for cursor in cursors.iter_mut() {
                if !cursor.advance_to(&candidate)? {
                    break 'search;
                }
                agreed &= cursor.current() == Some(&candidate);
            }

            if agreed {
                out.push(candidate);
                for cursor in cursors.iter_mut() {
                    cursor.advance()?;
                }
            }
        }

        debug!(inputs = cursors.len(), rounds, found = out.len(), "set intersection");
        Ok(out)
    }
}

impl TryFrom<Value> for Set {
    type Error = CollectionError;

    fn try_from(value: Value) -> CollectionResult<Self> {
        let root = CollectionKind::Set.unwrap(value)?;
        Ok(Self { root })
    }
}

impl From<Set> for Value {
    fn from(set: Set) -> Self {
        set.into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_chunks::MemoryChunkStore;
    use cairn_store::ValueStore;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn store() -> ValueStore {
        ValueStore::new(Arc::new(MemoryChunkStore::new()))
    }

    /// Set of single-letter strings from `from` to `to` inclusive.
    fn letters(vs: &ValueStore, from: char, to: char) -> Set {
        Set::new(vs, &SequenceConfig::narrow(), (from..=to).map(|c| Value::string(c)))
            .unwrap()
    }

    fn strings(s: &str) -> Vec<Value> {
        s.chars().map(Value::string).collect()
    }

    fn numbers(vs: &ValueStore, items: impl IntoIterator<Item = i64>) -> Set {
        Set::new(vs, &SequenceConfig::narrow(), items.into_iter().map(Value::Number)).unwrap()
    }

    // ---------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------

    #[test]
    fn new_sorts_and_deduplicates() {
        let vs = store();
        let set = Set::new(
            &vs,
            &SequenceConfig::default(),
            [3, 1, 2, 3, 1].map(Value::Number),
        )
        .unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.root(),
            &Sequence::Leaf(vec![Value::Number(1), Value::Number(2), Value::Number(3)])
        );
    }

    #[test]
    fn input_order_does_not_change_the_tree() {
        let vs = store();
        let ascending = numbers(&vs, 0..300);
        let descending = numbers(&vs, (0..300).rev());
        assert_eq!(ascending, descending);
        assert!(!ascending.root().is_leaf());
    }

    #[test]
    fn len_counts_without_descending() {
        let vs = store();
        let set = numbers(&vs, 0..500);
        assert_eq!(set.len(), 500);
        assert!(!set.is_empty());
        assert!(Set::new(&vs, &SequenceConfig::default(), Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn survives_flush_and_reconnect() {
        let chunks = Arc::new(MemoryChunkStore::new());
        let vs = ValueStore::new(chunks.clone());
        let set = numbers(&vs, 0..200);
        let r = vs.write_value(&set.clone().into_value()).unwrap();
        vs.flush().unwrap();

        let fresh = ValueStore::new(chunks);
        let loaded = Set::load(&fresh, &r.target()).unwrap();
        assert_eq!(loaded, set);
        let mut items = Vec::new();
        loaded.for_each(&fresh, |v| items.push(v.clone())).unwrap();
        assert_eq!(items, (0..200).map(Value::Number).collect::<Vec<_>>());
    }

    #[test]
    fn load_rejects_other_kinds() {
        let vs = store();
        let r = vs.write_value(&Value::List(Sequence::empty())).unwrap();
        assert!(matches!(
            Set::load(&vs, &r.target()),
            Err(CollectionError::NotACollection { found: "list", .. })
        ));
        assert!(matches!(
            Set::load(&vs, &Hash::of(b"absent")),
            Err(CollectionError::MissingChunk(_))
        ));
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    #[test]
    fn first_has_for_each() {
        let vs = store();
        let set = numbers(&vs, (0..200).map(|i| i * 3));

        assert_eq!(set.first(&vs).unwrap(), Some(Value::Number(0)));
        for i in 0..600 {
            assert_eq!(set.has(&vs, &Value::Number(i)).unwrap(), i % 3 == 0, "has({i})");
        }
        assert!(!set.has(&vs, &Value::string("0")).unwrap());

        let mut seen = Vec::new();
        set.for_each(&vs, |v| seen.push(v.clone())).unwrap();
        assert_eq!(seen.len(), 200);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn empty_set_reads() {
        let vs = store();
        let set = Set::new(&vs, &SequenceConfig::default(), Vec::new()).unwrap();
        assert_eq!(set.first(&vs).unwrap(), None);
        assert!(!set.has(&vs, &Value::Number(1)).unwrap());
        let mut calls = 0;
        set.for_each(&vs, |_| calls += 1).unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn mixed_kinds_sort_by_kind_first() {
        let vs = store();
        let set = Set::new(
            &vs,
            &SequenceConfig::default(),
            vec![Value::string("a"), Value::Number(10), Value::Bool(true)],
        )
        .unwrap();
        assert_eq!(set.first(&vs).unwrap(), Some(Value::Bool(true)));
    }

    #[tokio::test]
    async fn map_keeps_item_order() {
        let vs = store();
        let set = numbers(&vs, 0..100);
        let doubled = set
            .map(&vs, |v| async move {
                match v {
                    Value::Number(n) => n * 2,
                    _ => unreachable!(),
                }
            })
            .await
            .unwrap();
        assert_eq!(doubled, (0..100).map(|n| n * 2).collect::<Vec<_>>());
    }

    // ---------------------------------------------------------------
    // Intersection
    // ---------------------------------------------------------------

    #[test]
    fn intersect_identical_sets() {
        let vs = store();
        let a = letters(&vs, 'a', 'h');
        let b = letters(&vs, 'a', 'h');
        let c = letters(&vs, 'a', 'h');
        assert_eq!(a.intersect(&vs, &[&b, &c]).unwrap(), strings("abcdefgh"));
    }

    #[test]
    fn intersect_sparse_overlap() {
        let vs = store();
        let a = letters(&vs, 'a', 'h');
        let b = letters(&vs, 'a', 'h');
        let c = Set::new(
            &vs,
            &SequenceConfig::narrow(),
            strings("ah").into_iter().chain(strings("ijklmn")),
        )
        .unwrap();
        assert_eq!(a.intersect(&vs, &[&b, &c]).unwrap(), strings("ah"));
    }

    #[test]
    fn intersect_partial_overlap() {
        let vs = store();
        let a = letters(&vs, 'a', 'h');
        let b = letters(&vs, 'd', 'k');
        assert_eq!(a.intersect(&vs, &[&b]).unwrap(), strings("defgh"));
    }

    #[test]
    fn intersect_disjoint() {
        let vs = store();
        let a = letters(&vs, 'a', 'h');
        let b = letters(&vs, 'd', 'k');
        let c = letters(&vs, 'i', 'p');
        assert!(a.intersect(&vs, &[&b, &c]).unwrap().is_empty());
    }

    #[test]
    fn intersect_with_nothing_else_is_self() {
        let vs = store();
        let a = numbers(&vs, 0..50);
        let all = a.intersect(&vs, &[]).unwrap();
        assert_eq!(all, (0..50).map(Value::Number).collect::<Vec<_>>());
    }

    #[test]
    fn intersect_deep_trees() {
        let vs = store();
        let twos = numbers(&vs, (0..500).map(|i| i * 2));
        let threes = numbers(&vs, (0..400).map(|i| i * 3));
        let expected: Vec<Value> = (0..1000).filter(|i| i % 6 == 0).map(Value::Number).collect();
        assert_eq!(twos.intersect(&vs, &[&threes]).unwrap(), expected);
    }

    // ---------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn behaves_like_btreeset(
            items in prop::collection::btree_set(0i64..400, 0..150),
            lookups in prop::collection::vec(0i64..400, 0..30),
        ) {
            let vs = store();
            let set = numbers(&vs, items.iter().copied());

            prop_assert_eq!(set.len(), items.len() as u64);
            prop_assert_eq!(
                set.first(&vs).unwrap(),
                items.iter().next().map(|n| Value::Number(*n))
            );
            for p in &lookups {
                prop_assert_eq!(set.has(&vs, &Value::Number(*p)).unwrap(), items.contains(p));
            }

            let mut seen = Vec::new();
            set.for_each(&vs, |v| seen.push(v.clone())).unwrap();
            let expected: Vec<Value> = items.iter().map(|n| Value::Number(*n)).collect();
            prop_assert_eq!(seen, expected);
        }

        #[test]
        fn intersect_matches_btreeset(
            a in prop::collection::btree_set(0i64..200, 0..120),
            b in prop::collection::btree_set(0i64..200, 0..120),
            c in prop::collection::btree_set(0i64..200, 0..120),
        ) {
            let vs = store();
            let sa = numbers(&vs, a.iter().copied());
            let sb = numbers(&vs, b.iter().copied());
            let sc = numbers(&vs, c.iter().copied());

            let ab: BTreeSet<i64> = a.intersection(&b).copied().collect();
            let expected: Vec<Value> = ab.intersection(&c).map(|n| Value::Number(*n)).collect();
            prop_assert_eq!(sa.intersect(&vs, &[&sb, &sc]).unwrap(), expected);
        }

        #[test]
        fn advance_to_matches_range_lookup(
            items in prop::collection::btree_set(0i64..300, 1..120),
            keys in prop::collection::vec(0i64..320, 1..20),
        ) {
            let vs = store();
            let set = numbers(&vs, items.iter().copied());
            let mut keys = keys;
            keys.sort();

            let mut cursor = set.cursor(&vs, None).unwrap();
            for k in keys {
                if !cursor.is_valid() {
                    break;
                }
                if cursor.current().is_some_and(|cur| *cur > Value::Number(k)) {
                    continue;
                }
                cursor.advance_to(&Value::Number(k)).unwrap();
                let expected = items.range(k..).next().map(|n| Value::Number(*n));
                prop_assert_eq!(cursor.current().cloned(), expected);
            }
        }
    }
}
