use itertools::Itertools;

use super::common::{FnResult, arg_type_error, atomized, opt_atomic, opt_string};
use crate::engine::registry::CallCtx;
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmSequenceStream};

/// `fn:error` in all arities. The code defaults to `err:FOER0000`; the error
/// object, when given, is appended to the message in atomized form.
pub(super) fn error_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let code = match args.first() {
        None => None,
        Some(seq) => match opt_atomic(ctx, seq, 1)? {
            None => None,
            Some(XdmAtomicValue::QName(q)) => Some(q.expanded()),
            Some(other) => return Err(arg_type_error(ctx, 1, "xs:QName?", &other)),
        },
    };
    let code = code.unwrap_or_else(|| ErrorCode::FOER0000.qname());
    let mut message = match args.get(1) {
        Some(seq) => opt_string(ctx, seq, 2)?,
        None => String::from("error raised by fn:error"),
    };
    if let Some(object) = args.get(2) {
        let rendered = atomized(object)?.iter().map(XdmAtomicValue::as_string).join(" ");
        if !rendered.is_empty() {
            message = format!("{message} [{rendered}]");
        }
    }
    Err(Error::new_qname(code, message))
}

/// `fn:trace($value, $label)`: logs the atomized value and returns it unchanged.
pub(super) fn trace_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let label = match args.get(1) {
        Some(seq) => opt_string(ctx, seq, 2)?,
        None => String::new(),
    };
    let rendered = args[0].clone().map(|item| item.map(|i| i.string_value())).collect::<Result<Vec<_>, _>>()?;
    tracing::info!(target: "xquery_atomic::trace", label = %label, value = %rendered.join(" "), "fn:trace");
    Ok(args[0].clone())
}
