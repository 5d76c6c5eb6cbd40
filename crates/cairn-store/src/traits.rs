use cairn_types::Hash;
use cairn_value::{Ref, Value};

use crate::error::StoreResult;

/// Something values can be read back from by hash.
///
/// Cursors descend collection trees through this trait, one child chunk at a
/// time.
pub trait ValueReader {
    /// Read a value by the hash of its chunk. `Ok(None)` if it is unknown.
    fn read_value(&self, hash: &Hash) -> StoreResult<Option<Value>>;
}

/// Something values can be written to, yielding refs.
pub trait ValueWriter {
    /// Write a value, returning a ref to it. Durability may be deferred.
    fn write_value(&self, value: &Value) -> StoreResult<Ref>;
}

impl<T: ValueReader + ?Sized> ValueReader for &T {
    fn read_value(&self, hash: &Hash) -> StoreResult<Option<Value>> {
        (**self).read_value(hash)
    }
}

impl<T: ValueWriter + ?Sized> ValueWriter for &T {
    fn write_value(&self, value: &Value) -> StoreResult<Ref> {
        (**self).write_value(value)
    }
}
