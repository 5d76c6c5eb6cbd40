//! Large ordered collections stored as content-addressed trees.
//!
//! A collection's root [`Sequence`](cairn_value::Sequence) is built bottom-up
//! by [`build_sequence`]: items are cut into groups at content-defined
//! boundaries, each group is written as its own chunk, and the resulting
//! meta tuples are grouped again until one group remains. Equal contents
//! therefore always produce the same tree.
//!
//! Reads go through a [`Cursor`], which holds the path from the root to the
//! current leaf and fetches child chunks on descent. [`Set`] and [`List`]
//! are thin handles over a root sequence built on top of it.

pub mod builder;
pub mod config;
pub mod cursor;
pub mod error;
pub mod list;
pub mod set;

pub use builder::{build_sequence, CollectionKind};
pub use config::SequenceConfig;
pub use cursor::Cursor;
pub use error::{CollectionError, CollectionResult};
pub use list::List;
pub use set::Set;
