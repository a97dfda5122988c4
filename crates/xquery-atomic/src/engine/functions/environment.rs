use super::common::{FnResult, boolean, maybe_string};
use crate::engine::registry::CallCtx;
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequenceStream};

/// Absolute form of `uri` against the static base URI when it is relative.
fn absolutize<N: XdmNode>(ctx: &CallCtx<'_, N>, uri: &str) -> String {
    if url::Url::parse(uri).is_ok() {
        return uri.to_string();
    }
    ctx.static_ctx
        .base_uri
        .as_deref()
        .and_then(|base| url::Url::parse(base).ok())
        .and_then(|base| base.join(uri).ok())
        .map_or_else(|| uri.to_string(), String::from)
}

fn load<N: XdmNode>(ctx: &CallCtx<'_, N>, uri: &str) -> Result<N, Error> {
    let Some(resolver) = ctx.dyn_ctx.node_resolver.as_ref() else {
        return Err(ctx.error(ErrorCode::FODC0002, format!("no document resolver available for '{uri}'")));
    };
    match resolver.doc_node(&absolutize(ctx, uri)) {
        Ok(Some(doc)) => Ok(doc),
        Ok(None) => Err(ctx.error(ErrorCode::FODC0002, format!("no document found at '{uri}'"))),
        Err(e) => Err(ctx.error(ErrorCode::FODC0005, format!("cannot load '{uri}': {}", e.message)).with_source(e.source)),
    }
}

pub(super) fn doc_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let Some(uri) = maybe_string(ctx, &args[0], 1)? else {
        return Ok(XdmSequenceStream::empty());
    };
    Ok(XdmSequenceStream::single(XdmItem::Node(load(ctx, &uri)?)))
}

pub(super) fn doc_available_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let available = match maybe_string(ctx, &args[0], 1)? {
        None => false,
        Some(uri) => load(ctx, &uri).is_ok(),
    };
    Ok(boolean(available))
}

pub(super) fn default_collation_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, _args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let uri = ctx.collation(None)?.uri().to_string();
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::string(uri)))
}

pub(super) fn static_base_uri_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, _args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(XdmSequenceStream::optional(ctx.static_ctx.base_uri.as_deref().map(XdmAtomicValue::any_uri)))
}
