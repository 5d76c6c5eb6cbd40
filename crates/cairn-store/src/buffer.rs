//! Write buffer with parent hints and dependency-ordered draining.

use std::collections::HashMap;

use cairn_chunks::Chunk;
use cairn_types::Hash;
use cairn_value::Ref;
use tracing::debug;

struct BufferedChunk {
    chunk: Chunk,
    /// Targets of the chunk's direct refs, in encoding order.
    children: Vec<Hash>,
}

/// Chunks written but not yet committed to the backing store.
///
/// Besides the chunks themselves the buffer keeps one parent hint per child
/// hash: the most recently written chunk known to reference it. Hints are a
/// heuristic for finding the top of a pending subtree; commit order is
/// enforced by the post-order walk over real child lists, not by the hints.
#[derive(Default)]
pub(crate) struct WriteBuffer {
    chunks: HashMap<Hash, BufferedChunk>,
    bytes: u64,
    parent_hints: HashMap<Hash, Hash>,
}

impl WriteBuffer {
    pub(crate) fn contains(&self, hash: &Hash) -> bool {
        self.chunks.contains_key(hash)
    }

    pub(crate) fn get(&self, hash: &Hash) -> Option<&Chunk> {
        self.chunks.get(hash).map(|b| &b.chunk)
    }

    pub(crate) fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Encoded bytes currently buffered.
    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }

    pub(crate) fn parent_hint(&self, child: &Hash) -> Option<Hash> {
        self.parent_hints.get(child).copied()
    }

    /// Buffer a chunk whose value references `children`.
    ///
    /// Every child's hint is pointed at this chunk, replacing any earlier
    /// parent. Returns `false` if the chunk was already buffered.
    pub(crate) fn insert(&mut self, chunk: Chunk, children: &[Ref]) -> bool {
        let hash = chunk.hash();
        if self.chunks.contains_key(&hash) {
            return false;
        }
        for child in children {
            self.parent_hints.insert(child.target(), hash);
        }
        self.bytes += chunk.len() as u64;
        self.chunks.insert(
            hash,
            BufferedChunk {
                chunk,
                children: children.iter().map(Ref::target).collect(),
            },
        );
        true
    }

    /// Topmost buffered ancestor of `start` reachable through parent hints.
    pub(crate) fn root_of(&self, start: Hash) -> Hash {
        let mut current = start;
        // A hint chain can be no longer than the buffer.
        for _ in 0..self.chunks.len() {
            match self.parent_hints.get(&current) {
                Some(parent) if self.chunks.contains_key(parent) => current = *parent,
                _ => break,
            }
        }
        current
    }

    /// Hand every buffered chunk to `put`, children before parents.
    ///
    /// A chunk leaves the buffer only once `put` accepted it, so on error the
    /// failed chunk and everything not yet visited stay buffered. On success
    /// the byte counter and the hint map are reset.
    pub(crate) fn drain<E>(
        &mut self,
        mut put: impl FnMut(Chunk) -> Result<(), E>,
    ) -> Result<usize, E> {
        let mut committed = 0;
        let starts: Vec<Hash> = self.chunks.keys().copied().collect();
        for start in starts {
            if !self.chunks.contains_key(&start) {
                continue;
            }
            let root = self.root_of(start);
            committed += self.commit_subtree(root, &mut put)?;
        }
        debug_assert!(self.chunks.is_empty());
        self.bytes = 0;
        self.parent_hints.clear();
        Ok(committed)
    }

    /// Iterative post-order commit of the buffered part of `root`'s subtree.
    fn commit_subtree<E>(
        &mut self,
        root: Hash,
        put: &mut impl FnMut(Chunk) -> Result<(), E>,
    ) -> Result<usize, E> {
        let mut committed = 0;
        // (hash, children already scheduled)
        let mut stack = vec![(root, false)];
        while let Some((hash, expanded)) = stack.pop() {
            let Some(entry) = self.chunks.get(&hash) else {
                // Committed through another parent already.
                continue;
            };
            if !expanded {
                stack.push((hash, true));
                for child in entry.children.iter().rev() {
                    if self.chunks.contains_key(child) {
                        stack.push((*child, false));
                    }
                }
                continue;
            }

            put(entry.chunk.clone())?;
            if let Some(done) = self.chunks.remove(&hash) {
                self.bytes = self.bytes.saturating_sub(done.chunk.len() as u64);
            }
            debug!(chunk = %hash.short_hex(), "committed buffered chunk");
            committed += 1;
        }
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_value::{encode, Sequence, Value};

    /// Encode `value`, buffer it, and return its ref.
    fn buffer(buf: &mut WriteBuffer, value: Value) -> Ref {
        let chunk = encode(&value).unwrap();
        let r = Ref::of(&value).unwrap();
        buf.insert(chunk, &value.children());
        r
    }

    fn list(items: &[Ref]) -> Value {
        Value::List(Sequence::Leaf(items.iter().copied().map(Value::Ref).collect()))
    }

    fn drain_order(buf: &mut WriteBuffer) -> Vec<Hash> {
        let mut order = Vec::new();
        buf.drain(|c: Chunk| -> Result<(), ()> {
            order.push(c.hash());
            Ok(())
        })
        .unwrap();
        order
    }

    #[test]
    fn insert_tracks_bytes_and_rejects_duplicates() {
        let mut buf = WriteBuffer::default();
        let chunk = encode(&Value::string("hello")).unwrap();
        let len = chunk.len() as u64;
        assert!(buf.insert(chunk.clone(), &[]));
        assert!(!buf.insert(chunk, &[]));
        assert_eq!(buf.bytes(), len);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn latest_parent_wins() {
        let mut buf = WriteBuffer::default();
        let s = buffer(&mut buf, Value::string("oy"));
        let p1 = buffer(&mut buf, list(&[s]));
        assert_eq!(buf.parent_hint(&s.target()), Some(p1.target()));
        let p2 = buffer(&mut buf, Value::Set(Sequence::Leaf(vec![Value::Ref(s)])));
        assert_eq!(buf.parent_hint(&s.target()), Some(p2.target()));
    }

    #[test]
    fn root_of_follows_buffered_parents_only() {
        let mut buf = WriteBuffer::default();
        let s = buffer(&mut buf, Value::string("oy"));
        let ml = buffer(&mut buf, list(&[s]));
        let l = buffer(&mut buf, list(&[ml]));
        assert_eq!(buf.root_of(s.target()), l.target());

        // A hint to a parent that was never buffered is ignored.
        let mut lone = WriteBuffer::default();
        let orphan = buffer(&mut lone, Value::string("oy"));
        lone.parent_hints.insert(orphan.target(), Hash::of(b"elsewhere"));
        assert_eq!(lone.root_of(orphan.target()), orphan.target());
    }

    #[test]
    fn drain_puts_children_first_and_resets() {
        let mut buf = WriteBuffer::default();
        // Written parents-first: the parent is buffered before its children
        // exist in the buffer.
        let s_val = Value::string("oy");
        let n_val = Value::Number(42);
        let s = Ref::of(&s_val).unwrap();
        let n = Ref::of(&n_val).unwrap();
        let top = buffer(&mut buf, list(&[s, n]));
        buffer(&mut buf, n_val);
        buffer(&mut buf, s_val);

        let order = drain_order(&mut buf);
        assert_eq!(order.len(), 3);
        assert_eq!(order.last(), Some(&top.target()));
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.bytes(), 0);
        assert!(buf.parent_hint(&s.target()).is_none());
    }

    #[test]
    fn shared_child_is_put_once() {
        let mut buf = WriteBuffer::default();
        let s = buffer(&mut buf, Value::string("shared"));
        let a = buffer(&mut buf, list(&[s]));
        let b = buffer(&mut buf, Value::Set(Sequence::Leaf(vec![Value::Ref(s)])));
        let top = buffer(&mut buf, list(&[a, b]));

        let order = drain_order(&mut buf);
        let pos = |r: Ref| order.iter().position(|h| *h == r.target()).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos(s) < pos(a));
        assert!(pos(s) < pos(b));
        assert!(pos(a) < pos(top) && pos(b) < pos(top));
    }

    #[test]
    fn failed_put_keeps_chunk_buffered() {
        let mut buf = WriteBuffer::default();
        let s = buffer(&mut buf, Value::string("oy"));
        let err = buf.drain(|_c: Chunk| Err("disk full"));
        assert_eq!(err, Err("disk full"));
        assert!(buf.contains(&s.target()));
        assert!(buf.bytes() > 0);
    }
}
