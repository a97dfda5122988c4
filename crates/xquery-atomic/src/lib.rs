//! Atomic value and type layer of an XQuery/XPath engine.
//!
//! The crate provides:
//! - [`xdm`]: the XML Schema atomic type lattice, scalar values, casts, comparisons
//!   and the lazy sequence abstraction values flow through.
//! - [`interop`]: the class-to-sequence-type table used when marshalling host values.
//! - [`engine`]: contexts, errors, collations, regex support and the function library.
//! - [`model`]: the node interface consumed from the surrounding data model.
pub mod consts;
pub mod engine;
pub mod interop;
pub mod model;
pub mod xdm;

pub use engine::registry::{CallCtx, CompiledCall, FunctionRegistry};
pub use engine::default_function_registry;
pub use engine::runtime::{
    DynamicContext, DynamicContextBuilder, Error, ErrorCode, StaticContext, StaticContextBuilder,
};
pub use model::{NodeKind, QName, XdmNode};
pub use xdm::{
    AtomicType, Comparison, ExpandedName, SequenceType, XdmAtomicValue, XdmItem, XdmSequence,
    XdmSequenceStream,
};
