//! Argument coercion and result helpers shared by the function families.
use std::sync::Arc;

use compact_str::CompactString;

use crate::engine::collation::Collation;
use crate::engine::registry::CallCtx;
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{AtomicType, CastContext, Numeric, XdmAtomicValue, XdmItem, XdmSequence, XdmSequenceStream};

pub(super) type FnResult<N> = Result<XdmSequenceStream<N>, Error>;

pub(super) fn items<N: XdmNode>(seq: &XdmSequenceStream<N>) -> Result<XdmSequence<N>, Error> {
    seq.clone().materialize()
}

/// Atomized values of a whole argument.
pub(super) fn atomized<N: XdmNode>(seq: &XdmSequenceStream<N>) -> Result<Vec<XdmAtomicValue>, Error> {
    let mut out = Vec::new();
    for item in seq.clone() {
        out.extend(item?.atomize());
    }
    Ok(out)
}

/// Zero or one atomized value. `pos` is the 1-based argument position.
pub(super) fn opt_atomic<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    seq: &XdmSequenceStream<N>,
    pos: usize,
) -> Result<Option<XdmAtomicValue>, Error> {
    let mut values = atomized(seq)?;
    match values.len() {
        0 | 1 => Ok(values.pop()),
        n => Err(ctx.error(ErrorCode::XPTY0004, format!("argument {pos} expects at most one item, got {n}"))),
    }
}

pub(super) fn one_atomic<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    seq: &XdmSequenceStream<N>,
    pos: usize,
) -> Result<XdmAtomicValue, Error> {
    opt_atomic(ctx, seq, pos)?
        .ok_or_else(|| ctx.error(ErrorCode::XPTY0004, format!("argument {pos} must not be the empty sequence")))
}

pub(super) fn arg_type_error<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    pos: usize,
    expected: &str,
    got: &XdmAtomicValue,
) -> Error {
    ctx.error(ErrorCode::XPTY0004, format!("argument {pos} expects {expected}, got {}", got.atomic_type()))
}

/// `xs:string?` argument; the empty sequence reads as `""`.
pub(super) fn opt_string<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    seq: &XdmSequenceStream<N>,
    pos: usize,
) -> Result<String, Error> {
    match opt_atomic(ctx, seq, pos)? {
        None => Ok(String::new()),
        Some(v) => match v.string_like() {
            Some(s) => Ok(s.to_string()),
            None => Err(arg_type_error(ctx, pos, "xs:string?", &v)),
        },
    }
}

/// `xs:string?` argument that keeps the empty sequence distinct.
pub(super) fn maybe_string<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    seq: &XdmSequenceStream<N>,
    pos: usize,
) -> Result<Option<String>, Error> {
    match opt_atomic(ctx, seq, pos)? {
        None => Ok(None),
        Some(v) => match v.string_like() {
            Some(s) => Ok(Some(s.to_string())),
            None => Err(arg_type_error(ctx, pos, "xs:string?", &v)),
        },
    }
}

/// Numeric argument. Untyped values are cast to `xs:double`.
pub(super) fn opt_numeric<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    seq: &XdmSequenceStream<N>,
    pos: usize,
) -> Result<Option<Numeric>, Error> {
    let Some(v) = opt_atomic(ctx, seq, pos)? else {
        return Ok(None);
    };
    if v.is_untyped() {
        return Ok(AtomicType::Double.cast(&v, &CastContext::default())?.numeric());
    }
    v.numeric().map(Some).ok_or_else(|| arg_type_error(ctx, pos, "a numeric value", &v))
}

/// `xs:integer` argument. Untyped values are cast to `xs:integer`.
pub(super) fn opt_integer<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    seq: &XdmSequenceStream<N>,
    pos: usize,
) -> Result<Option<i128>, Error> {
    let Some(v) = opt_atomic(ctx, seq, pos)? else {
        return Ok(None);
    };
    let v = if v.is_untyped() { AtomicType::Integer.cast(&v, &CastContext::default())? } else { v };
    match v {
        XdmAtomicValue::Integer { value, .. } => Ok(Some(value)),
        other => Err(arg_type_error(ctx, pos, "xs:integer", &other)),
    }
}

pub(super) fn one_integer<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    seq: &XdmSequenceStream<N>,
    pos: usize,
) -> Result<i128, Error> {
    opt_integer(ctx, seq, pos)?
        .ok_or_else(|| ctx.error(ErrorCode::XPTY0004, format!("argument {pos} must not be the empty sequence")))
}

pub(super) fn one_double<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    seq: &XdmSequenceStream<N>,
    pos: usize,
) -> Result<f64, Error> {
    opt_numeric(ctx, seq, pos)?
        .map(Numeric::to_f64)
        .ok_or_else(|| ctx.error(ErrorCode::XPTY0004, format!("argument {pos} must not be the empty sequence")))
}

/// Effective boolean value.
pub(super) fn ebv<N: XdmNode>(ctx: &CallCtx<'_, N>, seq: &XdmSequenceStream<N>) -> Result<bool, Error> {
    let mut cursor = seq.cursor();
    let first = match cursor.next_item().transpose()? {
        None => return Ok(false),
        Some(XdmItem::Node(_)) => return Ok(true),
        Some(XdmItem::Atomic(a)) => a,
    };
    if cursor.next_item().transpose()?.is_some() {
        return Err(ctx.error(
            ErrorCode::FORG0006,
            "effective boolean value is not defined for a sequence of two or more atomic values",
        ));
    }
    if let Some(s) = first.string_like() {
        return Ok(!s.is_empty());
    }
    match (&first, first.numeric()) {
        (XdmAtomicValue::Boolean(b), _) => Ok(*b),
        (_, Some(Numeric::Integer(i))) => Ok(i != 0),
        (_, Some(Numeric::Decimal(d))) => Ok(!d.is_zero()),
        (_, Some(n)) => {
            let f = n.to_f64();
            Ok(f != 0.0 && !f.is_nan())
        }
        _ => Err(ctx.error(
            ErrorCode::FORG0006,
            format!("effective boolean value is not defined for {}", first.atomic_type()),
        )),
    }
}

/// Collation from the optional argument at `index`, else the default.
pub(super) fn collation_arg<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    args: &[XdmSequenceStream<N>],
    index: usize,
) -> Result<Arc<dyn Collation>, Error> {
    match args.get(index) {
        Some(seq) => {
            let uri = opt_string(ctx, seq, index + 1)?;
            ctx.collation(Some(&uri))
        }
        None => ctx.collation(None),
    }
}

pub(super) fn boolean<N: XdmNode>(b: bool) -> XdmSequenceStream<N> {
    XdmSequenceStream::atomic(XdmAtomicValue::boolean(b))
}

pub(super) fn string<N: XdmNode>(s: impl Into<CompactString>) -> XdmSequenceStream<N> {
    XdmSequenceStream::atomic(XdmAtomicValue::string(s))
}

pub(super) fn integer<N: XdmNode>(i: i128) -> XdmSequenceStream<N> {
    XdmSequenceStream::atomic(XdmAtomicValue::integer(i))
}

/// Length of a string in codepoints, as an XDM integer.
pub(super) fn char_count(s: &str) -> i128 {
    i128::try_from(s.chars().count()).unwrap_or(i128::MAX)
}
