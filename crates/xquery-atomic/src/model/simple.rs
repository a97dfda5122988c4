//! Small immutable in-memory tree implementing [`XdmNode`].
//!
//! Used by tests and quick prototypes:
//! ```
//! use xquery_atomic::model::simple::{elem, attr, ns, text};
//! use xquery_atomic::XdmNode;
//! let root = elem("root")
//!     .namespace(ns("p", "urn:one"))
//!     .attr(attr("id", "r"))
//!     .child(elem("child").child(text("Hello")))
//!     .build();
//! assert_eq!(root.string_value(), "Hello");
//! assert_eq!(root.children()[0].parent(), Some(root.clone()));
//! ```
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use super::{NodeKind, QName, XdmNode};

struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    parent: OnceLock<Weak<Inner>>,
    attributes: Vec<SimpleNode>,
    namespaces: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
}

/// Arc-backed node. Equality is identity.
#[derive(Clone)]
pub struct SimpleNode(Arc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SimpleNode {}

impl std::hash::Hash for SimpleNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name)
            .field("value", &self.0.value)
            .finish_non_exhaustive()
    }
}

fn local_name(name: &str) -> QName {
    QName { prefix: None, local: name.to_string(), ns_uri: None }
}

impl SimpleNode {
    fn leaf(kind: NodeKind, name: Option<QName>, value: Option<String>) -> Self {
        SimpleNode(Arc::new(Inner {
            kind,
            name,
            value,
            parent: OnceLock::new(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
        }))
    }

    pub fn document() -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Document, None)
    }
    pub fn element(name: &str) -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Element, Some(local_name(name)))
    }
    /// Element in a namespace, e.g. `element_ns("p", "urn:x", "item")` for `p:item`.
    pub fn element_ns(prefix: &str, uri: &str, local: &str) -> SimpleNodeBuilder {
        let prefix = (!prefix.is_empty()).then(|| prefix.to_string());
        SimpleNodeBuilder::new(
            NodeKind::Element,
            Some(QName { prefix, local: local.to_string(), ns_uri: Some(uri.to_string()) }),
        )
    }
    pub fn attribute(name: &str, value: &str) -> SimpleNode {
        Self::leaf(NodeKind::Attribute, Some(local_name(name)), Some(value.to_string()))
    }
    pub fn text(value: &str) -> SimpleNode {
        Self::leaf(NodeKind::Text, None, Some(value.to_string()))
    }
    pub fn comment(value: &str) -> SimpleNode {
        Self::leaf(NodeKind::Comment, None, Some(value.to_string()))
    }
    /// Namespace node binding `prefix` (empty for the default namespace) to `uri`.
    pub fn namespace(prefix: &str, uri: &str) -> SimpleNode {
        Self::leaf(NodeKind::Namespace, Some(local_name(prefix)), Some(uri.to_string()))
    }
}

pub struct SimpleNodeBuilder {
    kind: NodeKind,
    name: Option<QName>,
    children: Vec<SimpleNode>,
    attributes: Vec<SimpleNode>,
    namespaces: Vec<SimpleNode>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, name: Option<QName>) -> Self {
        Self { kind, name, children: Vec::new(), attributes: Vec::new(), namespaces: Vec::new() }
    }

    #[must_use]
    pub fn child(mut self, child: impl Into<SimpleNodeOrBuilder>) -> Self {
        self.children.push(match child.into() {
            SimpleNodeOrBuilder::Built(n) => n,
            SimpleNodeOrBuilder::Builder(b) => b.build(),
        });
        self
    }

    #[must_use]
    pub fn attr(mut self, attr: SimpleNode) -> Self {
        debug_assert!(attr.kind() == NodeKind::Attribute);
        self.attributes.push(attr);
        self
    }

    #[must_use]
    pub fn namespace(mut self, ns: SimpleNode) -> Self {
        debug_assert!(ns.kind() == NodeKind::Namespace);
        self.namespaces.push(ns);
        self
    }

    pub fn build(self) -> SimpleNode {
        let node = SimpleNode(Arc::new(Inner {
            kind: self.kind,
            name: self.name,
            value: None,
            parent: OnceLock::new(),
            attributes: self.attributes,
            namespaces: self.namespaces,
            children: self.children,
        }));
        let weak = Arc::downgrade(&node.0);
        for n in node.0.attributes.iter().chain(&node.0.namespaces).chain(&node.0.children) {
            // A node built into two parents keeps its first parent.
            let _ = n.0.parent.set(weak.clone());
        }
        node
    }
}

pub enum SimpleNodeOrBuilder {
    Built(SimpleNode),
    Builder(SimpleNodeBuilder),
}
impl From<SimpleNode> for SimpleNodeOrBuilder {
    fn from(n: SimpleNode) -> Self {
        SimpleNodeOrBuilder::Built(n)
    }
}
impl From<SimpleNodeBuilder> for SimpleNodeOrBuilder {
    fn from(b: SimpleNodeBuilder) -> Self {
        SimpleNodeOrBuilder::Builder(b)
    }
}

pub fn elem(name: &str) -> SimpleNodeBuilder {
    SimpleNode::element(name)
}
pub fn text(v: &str) -> SimpleNode {
    SimpleNode::text(v)
}
pub fn attr(name: &str, v: &str) -> SimpleNode {
    SimpleNode::attribute(name, v)
}
pub fn ns(prefix: &str, uri: &str) -> SimpleNode {
    SimpleNode::namespace(prefix, uri)
}
pub fn doc() -> SimpleNodeBuilder {
    SimpleNode::document()
}

impl XdmNode for SimpleNode {
    fn kind(&self) -> NodeKind {
        self.0.kind
    }
    fn name(&self) -> Option<QName> {
        self.0.name.clone()
    }
    fn string_value(&self) -> String {
        fn collect(n: &SimpleNode, out: &mut String) {
            if n.0.kind == NodeKind::Text
                && let Some(v) = &n.0.value
            {
                out.push_str(v);
            }
            for c in &n.0.children {
                collect(c, out);
            }
        }
        match self.0.kind {
            NodeKind::Element | NodeKind::Document => {
                let mut out = String::new();
                collect(self, &mut out);
                out
            }
            _ => self.0.value.clone().unwrap_or_default(),
        }
    }
    fn parent(&self) -> Option<Self> {
        self.0.parent.get().and_then(Weak::upgrade).map(SimpleNode)
    }
    fn children(&self) -> Vec<Self> {
        self.0.children.clone()
    }
    fn attributes(&self) -> Vec<Self> {
        self.0.attributes.clone()
    }
    fn namespaces(&self) -> Vec<Self> {
        self.0.namespaces.clone()
    }
}
