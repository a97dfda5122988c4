use super::common::{FnResult, boolean, ebv};
use crate::engine::registry::CallCtx;
use crate::model::XdmNode;
use crate::xdm::XdmSequenceStream;

pub(super) fn true_fn<N: XdmNode>(_ctx: &CallCtx<'_, N>, _args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(boolean(true))
}

pub(super) fn false_fn<N: XdmNode>(_ctx: &CallCtx<'_, N>, _args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(boolean(false))
}

pub(super) fn not_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(boolean(!ebv(ctx, &args[0])?))
}

pub(super) fn boolean_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(boolean(ebv(ctx, &args[0])?))
}
