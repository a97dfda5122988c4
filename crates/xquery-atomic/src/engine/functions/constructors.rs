use super::common::{FnResult, opt_atomic};
use crate::engine::registry::CallCtx;
use crate::model::XdmNode;
use crate::xdm::{AtomicType, XdmSequenceStream};

/// `xs:T($arg as xs:anyAtomicType?) as xs:T?`, a cast under the call's
/// namespace bindings and strictness.
pub(super) fn construct<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>], target: AtomicType) -> FnResult<N> {
    let Some(value) = opt_atomic(ctx, &args[0], 1)? else {
        return Ok(XdmSequenceStream::empty());
    };
    let cast = target.cast(&value, &ctx.cast_context()).map_err(|e| match e.location {
        Some(_) => e,
        None => ctx.error(e.code_enum(), e.message),
    })?;
    Ok(XdmSequenceStream::atomic(cast))
}

/// Types that get a constructor function: everything concrete in the `xs` namespace.
pub(super) fn constructible() -> impl Iterator<Item = AtomicType> {
    AtomicType::ALL.into_iter().filter(|t| !t.is_abstract() && *t != AtomicType::HostObject)
}
