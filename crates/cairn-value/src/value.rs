use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::refs::Ref;
use crate::sequence::Sequence;

/// A decoded Cairn value.
///
/// Equality is structural. The derived ordering is total: values rank by
/// kind in declaration order (`Bool < Number < String < Blob < Struct <
/// List < Set < Ref`), then by content within a kind. Sets and meta
/// sequence boundaries rely on this ordering.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Number(i64),
    String(String),
    Blob(Vec<u8>),
    Struct(Struct),
    /// Positional collection.
    List(Sequence),
    /// Sorted collection of unique items.
    Set(Sequence),
    Ref(Ref),
}

impl Value {
    /// Shorthand for `Value::String`.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Short lowercase name of the value's kind, for logs and errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Blob(_) => "blob",
            Self::Struct(_) => "struct",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Ref(_) => "ref",
        }
    }

    /// The root sequence of a list or set.
    pub fn sequence(&self) -> Option<&Sequence> {
        match self {
            Self::List(seq) | Self::Set(seq) => Some(seq),
            _ => None,
        }
    }

    /// Take the root sequence out of a list or set.
    pub fn into_sequence(self) -> Option<Sequence> {
        match self {
            Self::List(seq) | Self::Set(seq) => Some(seq),
            _ => None,
        }
    }

    /// The value's direct outgoing references, in encoding order.
    ///
    /// Values embedded inline (struct fields, collection items, meta tuple
    /// boundaries) are walked through; a `Ref` is reported but not followed.
    pub fn children(&self) -> Vec<Ref> {
        enum Pending<'a> {
            Value(&'a Value),
            Ref(Ref),
        }

        let mut refs = Vec::new();
        let mut stack = vec![Pending::Value(self)];
        while let Some(next) = stack.pop() {
            let value = match next {
                Pending::Ref(r) => {
                    refs.push(r);
                    continue;
                }
                Pending::Value(value) => value,
            };
            match value {
                Self::Bool(_) | Self::Number(_) | Self::String(_) | Self::Blob(_) => {}
                Self::Ref(r) => refs.push(*r),
                Self::Struct(s) => stack.extend(s.fields.values().rev().map(Pending::Value)),
                Self::List(seq) | Self::Set(seq) => match seq {
                    Sequence::Leaf(items) => stack.extend(items.iter().rev().map(Pending::Value)),
                    Sequence::Meta(tuples) => {
                        // Pushed in reverse so pops yield each tuple's child
                        // ref before anything inside its boundary.
                        for tuple in tuples.iter().rev() {
                            stack.push(Pending::Value(&tuple.boundary));
                            stack.push(Pending::Ref(tuple.child));
                        }
                    }
                },
            }
        }
        refs
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Self::Ref(r)
    }
}

impl From<Struct> for Value {
    fn from(s: Struct) -> Self {
        Self::Struct(s)
    }
}

/// A named record of fields, kept in field-name order.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Struct {
    pub name: String,
    pub fields: BTreeMap<String, Value>,
}

impl Struct {
    /// Create a struct from any iterator of `(field, value)` pairs.
    pub fn new<K, I>(name: impl Into<String>, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Look up a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}
