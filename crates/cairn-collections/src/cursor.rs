//! Positioned traversal over sequence trees.

use cairn_store::ValueReader;
use cairn_value::{Sequence, Value};

use crate::error::{CollectionError, CollectionResult};

struct Frame {
    seq: Sequence,
    idx: usize,
}

/// A position inside a sequence tree.
///
/// The cursor keeps the decoded sequences on the path from the root down to
/// the current leaf, one frame per level, and reads child chunks through
/// `reader` only when it has to descend into a subtree it does not hold.
/// Once it runs off either end of the tree it is invalid and has no current
/// item.
///
/// Key-based seeking (`at_key`, `advance_to`) assumes the tree is sorted,
/// as set trees are.
pub struct Cursor<'r, R: ValueReader + ?Sized> {
    reader: &'r R,
    frames: Vec<Frame>,
    valid: bool,
}

impl<'r, R: ValueReader + ?Sized> Cursor<'r, R> {
    /// Position at the first item `>= key`, or at the very first item when
    /// `key` is `None`.
    ///
    /// At each meta level this picks the first tuple whose boundary is
    /// `>= key` and descends into it. If nothing qualifies the cursor is
    /// invalid.
    pub fn at_key(reader: &'r R, root: &Sequence, key: Option<&Value>) -> CollectionResult<Self> {
        let mut cursor = Self {
            reader,
            frames: Vec::new(),
            valid: false,
        };
        if let Some(idx) = first_at_or_after(root, 0, key) {
            cursor.frames.push(Frame {
                seq: root.clone(),
                idx,
            });
            cursor.descend(key)?;
        }
        Ok(cursor)
    }

    /// Position at the item with zero-based `index`, counting through the
    /// tuple counts so that only one path is fetched.
    pub fn at_index(reader: &'r R, root: &Sequence, index: u64) -> CollectionResult<Self> {
        let mut cursor = Self {
            reader,
            frames: Vec::new(),
            valid: false,
        };
        let mut remaining = index;
        let mut seq = root.clone();
        loop {
            let mut found = None;
            for i in 0..seq.len() {
                let count = seq.count_at(i);
                if remaining < count {
                    found = Some(i);
                    break;
                }
                remaining -= count;
            }
            let Some(idx) = found else {
                cursor.invalidate();
                return Ok(cursor);
            };

            if seq.is_leaf() {
                cursor.frames.push(Frame { seq, idx });
                cursor.valid = true;
                return Ok(cursor);
            }
            let child = cursor.child_of(&seq, idx)?;
            cursor.frames.push(Frame { seq, idx });
            seq = child;
        }
    }

    /// Whether the cursor points at an item.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The item under the cursor, `None` once invalid.
    pub fn current(&self) -> Option<&Value> {
        if !self.valid {
            return None;
        }
        match self.frames.last() {
            Some(Frame {
                seq: Sequence::Leaf(items),
                idx,
            }) => items.get(*idx),
            _ => None,
        }
    }

    /// Step to the next item, crossing into the next leaf when needed.
    ///
    /// Returns whether the cursor is still valid. Advancing an invalid
    /// cursor is a no-op returning `false`.
    pub fn advance(&mut self) -> CollectionResult<bool> {
        if !self.valid {
            return Ok(false);
        }
        loop {
            let Some(top) = self.frames.last_mut() else {
                self.invalidate();
                return Ok(false);
            };
            if top.idx + 1 < top.seq.len() {
                top.idx += 1;
                break;
            }
            self.frames.pop();
        }
        self.descend(None)?;
        Ok(self.valid)
    }

    /// Move forward to the first item `>= key`.
    ///
    /// Only the levels whose subtree ends before `key` are given up; the
    /// rest of the path is reused. Returns whether the cursor is still
    /// valid.
    ///
    /// # Panics
    ///
    /// If the cursor is invalid, or if `key` is below the current item.
    /// Cursors never move backwards.
    pub fn advance_to(&mut self, key: &Value) -> CollectionResult<bool> {
        assert!(self.valid, "advance_to called on an invalid cursor");
        if let Some(current) = self.current() {
            assert!(
                key >= current,
                "advance_to would move backwards: {key:?} is below {current:?}"
            );
        }

        while let Some(top) = self.frames.last() {
            if top.seq.last_key().is_some_and(|last| last >= key) {
                break;
            }
            self.frames.pop();
        }

        let Some(top) = self.frames.last_mut() else {
            self.invalidate();
            return Ok(false);
        };
        match top.seq.seek_from(top.idx, key) {
            Some(idx) => top.idx = idx,
            None => {
                self.invalidate();
                return Ok(false);
            }
        }
        self.descend(Some(key))?;
        Ok(self.valid)
    }

    /// From the frame on top, keep descending until a leaf is on top.
    fn descend(&mut self, key: Option<&Value>) -> CollectionResult<()> {
        loop {
            let Some(top) = self.frames.last() else {
                self.invalidate();
                return Ok(());
            };
            if top.seq.is_leaf() {
                self.valid = true;
                return Ok(());
            }
            let child = self.child_of(&top.seq, top.idx)?;
            match first_at_or_after(&child, 0, key) {
                Some(idx) => self.frames.push(Frame { seq: child, idx }),
                None => {
                    self.invalidate();
                    return Ok(());
                }
            }
        }
    }

    /// Fetch the child sequence behind tuple `idx` of a meta sequence.
    fn child_of(&self, seq: &Sequence, idx: usize) -> CollectionResult<Sequence> {
        let Sequence::Meta(tuples) = seq else {
            return Ok(seq.clone());
        };
        let target = tuples[idx].child.target();
        match self.reader.read_value(&target)? {
            Some(Value::List(child)) | Some(Value::Set(child)) => Ok(child),
            Some(other) => Err(CollectionError::NotACollection {
                expected: "collection",
                found: other.kind_name(),
            }),
            None => Err(CollectionError::MissingChunk(target)),
        }
    }

    fn invalidate(&mut self) {
        self.valid = false;
        self.frames.clear();
    }
}

/// First index at or after `from`: the first whose key is `>= key`, or
/// simply `from` when there is no key.
fn first_at_or_after(seq: &Sequence, from: usize, key: Option<&Value>) -> Option<usize> {
    match key {
        Some(key) => seq.seek_from(from, key),
        None => (from < seq.len()).then_some(from),
    }
}

/// Visit every item under `root` in order.
pub(crate) fn walk<R: ValueReader + ?Sized>(
    reader: &R,
    root: &Sequence,
    mut visit: impl FnMut(&Value),
) -> CollectionResult<()> {
    let mut cursor = Cursor::at_key(reader, root, None)?;
    while let Some(item) = cursor.current() {
        visit(item);
        cursor.advance()?;
    }
    Ok(())
}
