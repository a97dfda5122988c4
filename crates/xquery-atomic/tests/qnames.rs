use rstest::rstest;
use xquery_atomic::consts::{FNS, XML_URI, XS};
use xquery_atomic::model::simple::{SimpleNode, attr, doc, elem, ns, text};
use xquery_atomic::xdm::QNameValue;
use xquery_atomic::{
    AtomicType, DynamicContext, DynamicContextBuilder, ErrorCode, ExpandedName, StaticContext, StaticContextBuilder,
    XdmAtomicValue as A, XdmItem, XdmNode, XdmSequenceStream, default_function_registry,
};

type Seq = XdmSequenceStream<SimpleNode>;

fn s(v: &str) -> Seq {
    Seq::atomic(A::string(v))
}

fn node(n: &SimpleNode) -> Seq {
    Seq::single(XdmItem::Node(n.clone()))
}

fn q(prefix: Option<&str>, uri: Option<&str>, local: &str) -> A {
    A::qname(QNameValue::new(prefix, uri, local))
}

fn call_in(
    ns_uri: &str,
    name: &str,
    args: &[Seq],
    static_ctx: &StaticContext,
    ctx: &DynamicContext<SimpleNode>,
) -> Result<Vec<A>, ErrorCode> {
    let registry = default_function_registry::<SimpleNode>();
    let fname = ExpandedName::new(Some(ns_uri.to_string()), name);
    let call = registry.resolve_by_arity(&fname, args.len(), static_ctx).map_err(|e| e.code_enum())?;
    let out = call.evaluate(args, ctx).map_err(|e| e.code_enum())?;
    out.map(|item| item.map(|i| i.as_atomic().cloned().unwrap()).map_err(|e| e.code_enum())).collect()
}

fn call(name: &str, args: &[Seq]) -> Result<Vec<A>, ErrorCode> {
    call_in(FNS, name, args, &StaticContext::default(), &DynamicContextBuilder::new().build())
}

/// `<p:root xmlns:p="urn:p" xmlns="urn:default"><child xmlns:c="urn:c"/></p:root>`
fn scoped_tree() -> SimpleNode {
    SimpleNode::element_ns("p", "urn:p", "root")
        .namespace(ns("p", "urn:p"))
        .namespace(ns("", "urn:default"))
        .child(SimpleNode::element_ns("", "urn:default", "child").namespace(ns("c", "urn:c")))
        .build()
}

#[rstest]
fn qname_constructor() {
    assert_eq!(call("QName", &[s("urn:x"), s("x:item")]).unwrap(), [q(Some("x"), Some("urn:x"), "item")]);
    assert_eq!(call("QName", &[s("urn:x"), s("item")]).unwrap(), [q(None, Some("urn:x"), "item")]);
    assert_eq!(call("QName", &[Seq::empty(), s("item")]).unwrap(), [q(None, None, "item")]);
    assert_eq!(call("QName", &[s(""), s("x:item")]).unwrap_err(), ErrorCode::FOCA0002);
    assert_eq!(call("QName", &[s("urn:x"), s("1bad")]).unwrap_err(), ErrorCode::FOCA0002);
}

#[rstest]
fn qname_accessors() {
    let name = Seq::atomic(q(Some("x"), Some("urn:x"), "item"));
    assert_eq!(call("local-name-from-QName", &[name.clone()]).unwrap()[0].as_string(), "item");
    assert_eq!(call("local-name-from-QName", &[name.clone()]).unwrap()[0].atomic_type(), AtomicType::NcName);
    assert_eq!(call("namespace-uri-from-QName", &[name.clone()]).unwrap(), [A::any_uri("urn:x")]);
    assert_eq!(call("prefix-from-QName", &[name]).unwrap()[0].as_string(), "x");

    let bare = Seq::atomic(q(None, None, "item"));
    assert!(call("prefix-from-QName", &[bare.clone()]).unwrap().is_empty());
    assert_eq!(call("namespace-uri-from-QName", &[bare]).unwrap(), [A::any_uri("")]);
    assert!(call("local-name-from-QName", &[Seq::empty()]).unwrap().is_empty());
    assert_eq!(call("local-name-from-QName", &[s("item")]).unwrap_err(), ErrorCode::XPTY0004);
}

#[rstest]
fn resolve_qname_uses_the_element_scope() {
    let root = scoped_tree();
    let child = root.children()[0].clone();

    let out = call("resolve-QName", &[s("p:thing"), node(&child)]).unwrap();
    assert_eq!(out, [q(Some("p"), Some("urn:p"), "thing")]);
    let out = call("resolve-QName", &[s("thing"), node(&child)]).unwrap();
    assert_eq!(out, [q(None, Some("urn:default"), "thing")]);
    let out = call("resolve-QName", &[s("c:thing"), node(&child)]).unwrap();
    assert_eq!(out, [q(Some("c"), Some("urn:c"), "thing")]);

    assert_eq!(call("resolve-QName", &[s("c:thing"), node(&root)]).unwrap_err(), ErrorCode::FONS0004);
    assert_eq!(call("resolve-QName", &[s("not a name"), node(&root)]).unwrap_err(), ErrorCode::FOCA0002);
    assert!(call("resolve-QName", &[Seq::empty(), node(&root)]).unwrap().is_empty());
}

#[rstest]
fn namespace_lookup_by_prefix() {
    let root = scoped_tree();
    let child = root.children()[0].clone();
    assert_eq!(call("namespace-uri-for-prefix", &[s("p"), node(&child)]).unwrap(), [A::any_uri("urn:p")]);
    assert_eq!(call("namespace-uri-for-prefix", &[s(""), node(&child)]).unwrap(), [A::any_uri("urn:default")]);
    assert_eq!(call("namespace-uri-for-prefix", &[s("xml"), node(&child)]).unwrap(), [A::any_uri(XML_URI)]);
    assert!(call("namespace-uri-for-prefix", &[s("zz"), node(&child)]).unwrap().is_empty());
    assert!(call("namespace-uri-for-prefix", &[s(""), node(&elem("plain").build())]).unwrap().is_empty());
}

#[rstest]
fn in_scope_prefixes_include_inherited_and_xml() {
    let root = scoped_tree();
    let child = root.children()[0].clone();
    let mut prefixes: Vec<String> =
        call("in-scope-prefixes", &[node(&child)]).unwrap().iter().map(A::as_string).collect();
    prefixes.sort();
    assert_eq!(prefixes, ["", "c", "p", "xml"]);

    let plain = call("in-scope-prefixes", &[node(&elem("plain").build())]).unwrap();
    assert_eq!(plain, [A::string("xml")]);
}

#[rstest]
fn namespace_functions_need_an_element() {
    let err = call("in-scope-prefixes", &[Seq::empty()]).unwrap_err();
    assert_eq!(err, ErrorCode::XPTY0004);
    let err = call("resolve-QName", &[s("a"), s("not a node")]).unwrap_err();
    assert_eq!(err, ErrorCode::XPTY0004);
}

#[rstest]
fn node_name_functions() {
    let root = scoped_tree();
    assert_eq!(call("name", &[node(&root)]).unwrap(), [A::string("p:root")]);
    assert_eq!(call("local-name", &[node(&root)]).unwrap(), [A::string("root")]);
    assert_eq!(call("namespace-uri", &[node(&root)]).unwrap(), [A::any_uri("urn:p")]);

    let child = root.children()[0].clone();
    assert_eq!(call("name", &[node(&child)]).unwrap(), [A::string("child")]);

    let tree = doc().child(elem("a").attr(attr("id", "1")).child(text("t"))).build();
    let a = tree.children()[0].clone();
    let t = a.children()[0].clone();
    assert_eq!(call("name", &[node(&a.attributes()[0])]).unwrap(), [A::string("id")]);
    assert_eq!(call("name", &[node(&t)]).unwrap(), [A::string("")]);
    assert_eq!(call("namespace-uri", &[node(&a)]).unwrap(), [A::any_uri("")]);
    assert_eq!(call("name", &[Seq::empty()]).unwrap(), [A::string("")]);
    assert_eq!(call("local-name", &[s("x")]).unwrap_err(), ErrorCode::XPTY0004);
}

#[rstest]
fn node_name_functions_read_the_focus() {
    let root = scoped_tree();
    let ctx = DynamicContextBuilder::new().with_context_item(XdmItem::Node(root)).build();
    let static_ctx = StaticContext::default();
    assert_eq!(call_in(FNS, "local-name", &[], &static_ctx, &ctx).unwrap(), [A::string("root")]);
    assert_eq!(call_in(FNS, "name", &[], &static_ctx, &ctx).unwrap(), [A::string("p:root")]);

    let atomic_focus = DynamicContextBuilder::new().with_context_item(XdmItem::Atomic(A::integer(1))).build();
    assert_eq!(call_in(FNS, "name", &[], &static_ctx, &atomic_focus).unwrap_err(), ErrorCode::XPTY0004);
    assert_eq!(call("name", &[]).unwrap_err(), ErrorCode::XPDY0002);
}

#[rstest]
fn qname_constructor_function_uses_static_bindings() {
    let static_ctx = StaticContextBuilder::new().with_namespace("p", "urn:p").build();
    let ctx = DynamicContextBuilder::new().build();
    let out = call_in(XS, "QName", &[s("p:item")], &static_ctx, &ctx).unwrap();
    assert_eq!(out, [q(Some("p"), Some("urn:p"), "item")]);
    let err = call_in(XS, "QName", &[s("z:item")], &static_ctx, &ctx).unwrap_err();
    assert_eq!(err, ErrorCode::FONS0004);
}
