use super::common::{FnResult, arg_type_error, maybe_string, opt_atomic, opt_string, string};
use crate::engine::registry::CallCtx;
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::{XdmNode, in_scope_namespaces, lookup_namespace_uri};
use crate::xdm::cast::derived_string;
use crate::xdm::lexical::split_qname;
use crate::xdm::{AtomicType, QNameValue, XdmAtomicValue, XdmItem, XdmSequenceStream};

/// Zero or one node; atomic items are a type error.
fn opt_node<N: XdmNode>(ctx: &CallCtx<'_, N>, seq: &XdmSequenceStream<N>, pos: usize) -> Result<Option<N>, Error> {
    let mut cursor = seq.cursor();
    let first = cursor.next_item().transpose()?;
    if cursor.next_item().is_some() {
        return Err(ctx.error(ErrorCode::XPTY0004, format!("argument {pos} expects at most one node")));
    }
    match first {
        None => Ok(None),
        Some(XdmItem::Node(n)) => Ok(Some(n)),
        Some(XdmItem::Atomic(a)) => Err(arg_type_error(ctx, pos, "node()?", &a)),
    }
}

fn one_node<N: XdmNode>(ctx: &CallCtx<'_, N>, seq: &XdmSequenceStream<N>, pos: usize) -> Result<N, Error> {
    opt_node(ctx, seq, pos)?
        .ok_or_else(|| ctx.error(ErrorCode::XPTY0004, format!("argument {pos} must not be the empty sequence")))
}

/// Node argument, or the focus for the zero-argument forms.
fn node_or_focus<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> Result<Option<N>, Error> {
    match args.first() {
        Some(seq) => opt_node(ctx, seq, 1),
        None => match ctx.require_focus()? {
            XdmItem::Node(n) => Ok(Some(n.clone())),
            XdmItem::Atomic(_) => Err(ctx.error(ErrorCode::XPTY0004, "context item is not a node")),
        },
    }
}

fn opt_qname<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    seq: &XdmSequenceStream<N>,
    pos: usize,
) -> Result<Option<QNameValue>, Error> {
    match opt_atomic(ctx, seq, pos)? {
        None => Ok(None),
        Some(XdmAtomicValue::QName(q)) => Ok(Some(q)),
        Some(other) => Err(arg_type_error(ctx, pos, "xs:QName?", &other)),
    }
}

fn ncname(s: &str) -> Result<XdmAtomicValue, Error> {
    derived_string(AtomicType::NcName, s)
}

fn invalid_qname<N: XdmNode>(ctx: &CallCtx<'_, N>, lexical: &str) -> Error {
    ctx.error(ErrorCode::FOCA0002, format!("'{lexical}' is not a valid lexical QName"))
}

pub(super) fn qname_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let uri = opt_string(ctx, &args[0], 1)?;
    let lexical = opt_string(ctx, &args[1], 2)?;
    let Some((prefix, local)) = split_qname(&lexical) else {
        return Err(invalid_qname(ctx, &lexical));
    };
    if prefix.is_some() && uri.is_empty() {
        return Err(ctx.error(ErrorCode::FOCA0002, format!("prefixed QName '{lexical}' needs a namespace URI")));
    }
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::qname(QNameValue::new(prefix, Some(uri.as_str()), local))))
}

pub(super) fn resolve_qname_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let Some(lexical) = maybe_string(ctx, &args[0], 1)? else {
        return Ok(XdmSequenceStream::empty());
    };
    let element = one_node(ctx, &args[1], 2)?;
    let Some((prefix, local)) = split_qname(&lexical) else {
        return Err(invalid_qname(ctx, &lexical));
    };
    let uri = lookup_namespace_uri(&element, prefix.unwrap_or(""));
    if let (Some(p), None) = (prefix, &uri) {
        return Err(ctx.error(ErrorCode::FONS0004, format!("no namespace is bound to prefix '{p}'")));
    }
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::qname(QNameValue::new(prefix, uri.as_deref(), local))))
}

pub(super) fn local_name_from_qname_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let value = opt_qname(ctx, &args[0], 1)?.map(|q| ncname(&q.local)).transpose()?;
    Ok(XdmSequenceStream::optional(value))
}

pub(super) fn namespace_uri_from_qname_fn<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    args: &[XdmSequenceStream<N>],
) -> FnResult<N> {
    let value = opt_qname(ctx, &args[0], 1)?
        .map(|q| XdmAtomicValue::any_uri(q.ns_uri.as_ref().map(|u| u.to_string()).unwrap_or_default()));
    Ok(XdmSequenceStream::optional(value))
}

pub(super) fn prefix_from_qname_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let value = opt_qname(ctx, &args[0], 1)?.and_then(|q| q.prefix).map(|p| ncname(&p)).transpose()?;
    Ok(XdmSequenceStream::optional(value))
}

pub(super) fn namespace_uri_for_prefix_fn<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    args: &[XdmSequenceStream<N>],
) -> FnResult<N> {
    let prefix = opt_string(ctx, &args[0], 1)?;
    let element = one_node(ctx, &args[1], 2)?;
    Ok(XdmSequenceStream::optional(lookup_namespace_uri(&element, &prefix).map(XdmAtomicValue::any_uri)))
}

pub(super) fn in_scope_prefixes_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let element = one_node(ctx, &args[0], 1)?;
    let prefixes = in_scope_namespaces(&element)
        .into_iter()
        .filter(|(prefix, uri)| !(prefix.is_empty() && uri.is_empty()))
        .map(|(prefix, _)| XdmAtomicValue::string(prefix));
    Ok(XdmSequenceStream::from_atomics(prefixes))
}

pub(super) fn name_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let lexical = node_or_focus(ctx, args)?.and_then(|n| n.name()).map(|q| match q.prefix {
        Some(p) if !p.is_empty() => format!("{p}:{}", q.local),
        _ => q.local,
    });
    Ok(string(lexical.unwrap_or_default()))
}

pub(super) fn local_name_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let local = node_or_focus(ctx, args)?.and_then(|n| n.name()).map(|q| q.local);
    Ok(string(local.unwrap_or_default()))
}

pub(super) fn namespace_uri_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let uri = node_or_focus(ctx, args)?.and_then(|n| n.name()).and_then(|q| q.ns_uri);
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::any_uri(uri.unwrap_or_default())))
}
