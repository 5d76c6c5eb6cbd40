use std::future::Future;

use cairn_store::{ValueReader, ValueWriter};
use cairn_types::Hash;
use cairn_value::{Sequence, Value};
use futures::future::join_all;

use crate::builder::{build_sequence, CollectionKind};
use crate::config::SequenceConfig;
use crate::cursor::{walk, Cursor};
use crate::error::{CollectionError, CollectionResult};

/// Positional collection stored as a sequence tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct List {
    root: Sequence,
}

impl List {
    /// Build a list holding `items` in the order given.
    pub fn new<W: ValueWriter + ?Sized>(
        writer: &W,
        config: &SequenceConfig,
        items: impl IntoIterator<Item = Value>,
    ) -> CollectionResult<Self> {
        let root = build_sequence(writer, CollectionKind::List, config, items.into_iter().collect())?;
        Ok(Self { root })
    }

    /// Load the list stored under `hash`.
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
        Value::List(self.root)
    }

    pub fn len(&self) -> u64 {
        self.root.item_count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// The item at `index`, fetching a single root-to-leaf path.
    pub fn get<R: ValueReader + ?Sized>(
        &self,
        reader: &R,
        index: u64,
    ) -> CollectionResult<Option<Value>> {
        Ok(Cursor::at_index(reader, &self.root, index)?.current().cloned())
    }

    pub fn for_each<R: ValueReader + ?Sized>(
        &self,
        reader: &R,
        visit: impl FnMut(&Value),
    ) -> CollectionResult<()> {
        walk(reader, &self.root, visit)
    }

    /// Apply an asynchronous `transform` to every item, keeping positions.
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
}

impl TryFrom<Value> for List {
    type Error = CollectionError;

    fn try_from(value: Value) -> CollectionResult<Self> {
        let root = CollectionKind::List.unwrap(value)?;
        Ok(Self { root })
    }
}

impl From<List> for Value {
    fn from(list: List) -> Self {
        list.into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_chunks::MemoryChunkStore;
    use cairn_store::ValueStore;
    use std::sync::Arc;

    fn store() -> ValueStore {
        ValueStore::new(Arc::new(MemoryChunkStore::new()))
    }

    #[test]
    fn keeps_order_and_duplicates() {
        let vs = store();
        let items = vec![Value::Number(3), Value::Number(1), Value::Number(3)];
        let list = List::new(&vs, &SequenceConfig::default(), items.clone()).unwrap();
        assert_eq!(list.len(), 3);

        let mut seen = Vec::new();
        list.for_each(&vs, |v| seen.push(v.clone())).unwrap();
        assert_eq!(seen, items);
    }

    #[test]
    fn get_by_index_in_deep_tree() {
        let vs = store();
        let items: Vec<Value> = (0..300).rev().map(Value::Number).collect();
        let list = List::new(&vs, &SequenceConfig::narrow(), items.clone()).unwrap();
        assert!(!list.root().is_leaf());
        assert_eq!(list.len(), 300);

        for (i, expected) in items.iter().enumerate() {
            assert_eq!(list.get(&vs, i as u64).unwrap().as_ref(), Some(expected));
        }
        assert_eq!(list.get(&vs, 300).unwrap(), None);
    }

    #[test]
    fn repeated_runs_share_chunks() {
        let vs = store();
        let items: Vec<Value> = std::iter::repeat(Value::string("same")).take(200).collect();
        let list = List::new(&vs, &SequenceConfig::narrow(), items).unwrap();
        assert_eq!(list.len(), 200);
        assert_eq!(list.get(&vs, 199).unwrap(), Some(Value::string("same")));
        // Identical groups collapse to one chunk each, so far fewer chunks
        // than items end up buffered.
        assert!(vs.buffered_len() < 20);
    }

    #[test]
    fn round_trips_through_the_store() {
        let chunks = Arc::new(MemoryChunkStore::new());
        let vs = ValueStore::new(chunks.clone());
        let items: Vec<Value> = (0..120).map(|i| Value::string(format!("item-{i}"))).collect();
        let list = List::new(&vs, &SequenceConfig::narrow(), items.clone()).unwrap();
        let r = vs.write_value(&list.into_value()).unwrap();
        vs.flush().unwrap();

        let fresh = ValueStore::new(chunks);
        let loaded = List::load(&fresh, &r.target()).unwrap();
        let mut seen = Vec::new();
        loaded.for_each(&fresh, |v| seen.push(v.clone())).unwrap();
        assert_eq!(seen, items);
    }

    #[tokio::test]
    async fn map_keeps_positions() {
        let vs = store();
        let items: Vec<Value> = (0..50).rev().map(Value::Number).collect();
        let list = List::new(&vs, &SequenceConfig::narrow(), items).unwrap();
        let lens = list
            .map(&vs, |v| async move { v.kind_name().len() + matches!(v, Value::Number(0)) as usize })
            .await
            .unwrap();
        assert_eq!(lens.len(), 50);
        assert_eq!(lens.last(), Some(&7));
        assert!(lens[..49].iter().all(|l| *l == 6));
    }
}
