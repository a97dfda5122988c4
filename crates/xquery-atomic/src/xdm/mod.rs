//! XQuery data model: atomic types, scalar values and lazy sequences.
use core::fmt;

use crate::engine::runtime::Error;
use crate::model::XdmNode;

pub mod array;
pub mod cast;
pub mod compare;
pub mod derived;
pub mod lexical;
pub mod sequence;
pub mod temporal;
pub mod types;
pub mod value;

pub use array::{ItemArray, ObjectArray, PrimitiveArray};
pub use cast::CastContext;
pub use compare::{CompareContext, CompareFlags, Comparison};
pub use sequence::{SequenceCursor, XdmSequenceStream};
pub use temporal::{Duration, Moment};
pub use types::{AtomicType, ItemType, Occurrence, SequenceType, TypeFamily};
pub use value::{Numeric, QNameValue, XdmAtomicValue};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(ns_uri: Option<String>, local: impl Into<String>) -> Self {
        Self { ns_uri, local: local.into() }
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns_uri {
            Some(ns) => write!(f, "Q{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

pub type XdmSequence<N> = Vec<XdmItem<N>>;

/// Result of pulling one item from a lazy sequence.
pub type XdmItemResult<N> = Result<XdmItem<N>, Error>;

#[derive(Debug, Clone, PartialEq)]
pub enum XdmItem<N> {
    Node(N),
    Atomic(XdmAtomicValue),
}

impl<N: XdmNode> XdmItem<N> {
    /// Atomization: nodes yield their typed value, atomic values themselves.
    pub fn atomize(&self) -> Vec<XdmAtomicValue> {
        match self {
            XdmItem::Node(n) => n.typed_value(),
            XdmItem::Atomic(a) => vec![a.clone()],
        }
    }

    pub fn as_atomic(&self) -> Option<&XdmAtomicValue> {
        match self {
            XdmItem::Atomic(a) => Some(a),
            XdmItem::Node(_) => None,
        }
    }

    /// String value of the item (`fn:string`).
    pub fn string_value(&self) -> String {
        match self {
            XdmItem::Node(n) => n.string_value(),
            XdmItem::Atomic(a) => a.as_string(),
        }
    }
}

impl<N> From<XdmAtomicValue> for XdmItem<N> {
    fn from(a: XdmAtomicValue) -> Self {
        XdmItem::Atomic(a)
    }
}

impl<N> fmt::Display for XdmItem<N>
where
    N: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdmItem::Node(n) => write!(f, "{n:?}"),
            XdmItem::Atomic(a) => write!(f, "{a}"),
        }
    }
}
