//! Node interface consumed from the surrounding data model.
//!
//! The atomic layer only needs a handful of node capabilities: atomization
//! (string and typed value), names, in-scope namespaces for `QName` resolution
//! and document order for node unions. Everything else belongs to the tree
//! implementation behind this trait.
use crate::engine::runtime::{Error, ErrorCode};
use crate::xdm::XdmAtomicValue;
use core::cmp::Ordering;

pub mod simple;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

/// Document order derived from ancestry alone.
///
/// An ancestor precedes its descendants. Below the nearest common ancestor
/// attributes come first, then namespace nodes, then children. Two nodes
/// without a common root have no order here and fail with `err:FOER0000`.
pub fn try_compare_by_ancestry<N: XdmNode>(a: &N, b: &N) -> Result<Ordering, Error> {
    if a == b {
        return Ok(Ordering::Equal);
    }
    let root_first = |n: &N| {
        let mut chain: Vec<N> = std::iter::successors(Some(n.clone()), N::parent).collect();
        chain.reverse();
        chain
    };
    let (chain_a, chain_b) = (root_first(a), root_first(b));
    let shared = chain_a.iter().zip(&chain_b).take_while(|(x, y)| x == y).count();
    if shared == 0 {
        return Err(Error::from_code(ErrorCode::FOER0000, "nodes belong to different trees and have no common order"));
    }
    let (Some(branch_a), Some(branch_b)) = (chain_a.get(shared), chain_b.get(shared)) else {
        // One chain is a prefix of the other: the shorter one is the ancestor.
        return Ok(chain_a.len().cmp(&chain_b.len()));
    };
    let fork = &chain_a[shared - 1];
    let rank = |n: &N| {
        fork.attributes()
            .into_iter()
            .chain(fork.namespaces())
            .chain(fork.children())
            .position(|sibling| &sibling == n)
    };
    Ok(rank(branch_a).cmp(&rank(branch_b)))
}

pub trait XdmNode: Clone + Eq + core::fmt::Debug + Send + Sync + 'static {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> Option<QName>;
    fn string_value(&self) -> String;

    /// Typed value used by atomization. Untyped trees yield the string value as
    /// `xs:untypedAtomic`.
    fn typed_value(&self) -> Vec<XdmAtomicValue> {
        vec![XdmAtomicValue::untyped(self.string_value())]
    }

    fn base_uri(&self) -> Option<String> {
        None
    }

    fn parent(&self) -> Option<Self>;
    fn children(&self) -> Vec<Self>;
    fn attributes(&self) -> Vec<Self>;
    fn namespaces(&self) -> Vec<Self> {
        Vec::new()
    }

    fn compare_document_order(&self, other: &Self) -> Result<Ordering, Error> {
        try_compare_by_ancestry(self, other)
    }
}

/// In-scope namespace bindings of an element, nearest declaration first.
/// The `xml` prefix is always present.
pub fn in_scope_namespaces<N: XdmNode>(node: &N) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    let mut cur = Some(node.clone());
    while let Some(n) = cur {
        for ns in n.namespaces() {
            let prefix = ns.name().map(|q| q.local).unwrap_or_default();
            if !out.iter().any(|(p, _)| *p == prefix) {
                out.push((prefix, ns.string_value()));
            }
        }
        cur = n.parent();
    }
    if !out.iter().any(|(p, _)| p == "xml") {
        out.push(("xml".to_string(), crate::consts::XML_URI.to_string()));
    }
    out
}

/// Resolve a prefix (empty string for the default namespace) against the
/// in-scope namespaces of `node`.
pub fn lookup_namespace_uri<N: XdmNode>(node: &N, prefix: &str) -> Option<String> {
    in_scope_namespaces(node)
        .into_iter()
        .find_map(|(p, uri)| (p == prefix).then_some(uri))
        .filter(|uri| !uri.is_empty())
}
