//! Foundation types for Cairn.
//!
//! Every chunk Cairn stores is identified by a [`Hash`] of its encoded bytes.
//! Identical bytes always produce the same `Hash`, which is the sole identity
//! and equality key for chunks throughout the workspace.

pub mod error;
pub mod hash;

pub use error::TypeError;
pub use hash::Hash;
