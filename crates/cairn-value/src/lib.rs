//! The in-memory entity model of Cairn and its chunk encoding.
//!
//! A [`Value`] is a closed sum of primitives, structs, ordered collections
//! and [`Ref`]s. Every value has exactly one chunk encoding ([`encode`]), and
//! a value's direct outgoing references ([`Value::children`]) are the edges
//! of the chunk DAG.
//!
//! Large collections are not stored as one chunk. Their root [`Sequence`] is
//! either a leaf of items or a meta sequence of [`MetaTuple`]s, each pointing
//! by `Ref` at a child collection chunk and carrying the largest item in that
//! subtree.

pub mod codec;
pub mod error;
pub mod refs;
pub mod sequence;
pub mod value;

pub use codec::{decode, encode};
pub use error::{ValueError, ValueResult};
pub use refs::Ref;
pub use sequence::{MetaTuple, Sequence};
pub use value::{Struct, Value};
