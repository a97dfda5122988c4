use super::common::{FnResult, atomized, boolean, collation_arg, items, one_atomic, one_double, one_integer, opt_integer};
use crate::engine::collation::Collation;
use crate::engine::registry::CallCtx;
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::{NodeKind, XdmNode};
use crate::xdm::compare::{CompareContext, Comparison, compare_atomic};
use crate::xdm::derived::{atomize, insert_before, remove, subsequence};
use crate::xdm::{CompareFlags, XdmAtomicValue, XdmItem, XdmSequenceStream};

const VALUE_EQUALITY: CompareFlags = CompareFlags { ordering: false, value_comparison: true };

pub(super) fn empty_fn<N: XdmNode>(_ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(boolean(args[0].is_empty()?))
}

pub(super) fn exists_fn<N: XdmNode>(_ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(boolean(!args[0].is_empty()?))
}

pub(super) fn reverse_fn<N: XdmNode>(_ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let mut all = items(&args[0])?;
    all.reverse();
    Ok(XdmSequenceStream::from_vec(all))
}

pub(super) fn zero_or_one_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    if args[0].item_at(2)?.is_some() {
        return Err(ctx.error(ErrorCode::FORG0003, "fn:zero-or-one called with a sequence of more than one item"));
    }
    Ok(args[0].clone())
}

pub(super) fn one_or_more_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    if args[0].is_empty()? {
        return Err(ctx.error(ErrorCode::FORG0004, "fn:one-or-more called with the empty sequence"));
    }
    Ok(args[0].clone())
}

pub(super) fn exactly_one_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    if args[0].is_empty()? || args[0].item_at(2)?.is_some() {
        return Err(ctx.error(ErrorCode::FORG0005, "fn:exactly-one called with a sequence not of length one"));
    }
    Ok(args[0].clone())
}

pub(super) fn unordered_fn<N: XdmNode>(_ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(args[0].clone())
}

pub(super) fn data_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    match args.first() {
        Some(seq) => Ok(atomize(seq)),
        None => Ok(XdmSequenceStream::from_atomics(ctx.require_focus()?.atomize())),
    }
}

fn atomic_deep_equal(a: &XdmAtomicValue, b: &XdmAtomicValue, ctx: &CompareContext) -> Result<bool, Error> {
    Ok(match compare_atomic(a, b, ctx, VALUE_EQUALITY)? {
        Comparison::Equal => true,
        Comparison::Fail => a.is_nan() && b.is_nan(),
        _ => false,
    })
}

fn same_name<N: XdmNode>(a: &N, b: &N) -> bool {
    match (a.name(), b.name()) {
        (Some(x), Some(y)) => x.local == y.local && x.ns_uri == y.ns_uri,
        (None, None) => true,
        _ => false,
    }
}

fn significant_children<N: XdmNode>(n: &N) -> Vec<N> {
    n.children()
        .into_iter()
        .filter(|c| !matches!(c.kind(), NodeKind::Comment | NodeKind::ProcessingInstruction))
        .collect()
}

/// Structural equality: names, attributes in any order, and significant
/// children in order. Text compares under the collation.
fn nodes_deep_equal<N: XdmNode>(a: &N, b: &N, collation: &dyn Collation) -> bool {
    if a.kind() != b.kind() {
        return false;
    }
    let same_text = || collation.compare(&a.string_value(), &b.string_value()).is_eq();
    match a.kind() {
        NodeKind::Document => children_deep_equal(a, b, collation),
        NodeKind::Element => {
            let (attrs_a, attrs_b) = (a.attributes(), b.attributes());
            same_name(a, b)
                && attrs_a.len() == attrs_b.len()
                && attrs_a.iter().all(|x| attrs_b.iter().any(|y| nodes_deep_equal(x, y, collation)))
                && children_deep_equal(a, b, collation)
        }
        NodeKind::Attribute | NodeKind::Namespace | NodeKind::ProcessingInstruction => same_name(a, b) && same_text(),
        NodeKind::Text | NodeKind::Comment => same_text(),
    }
}

fn children_deep_equal<N: XdmNode>(a: &N, b: &N, collation: &dyn Collation) -> bool {
    let (ca, cb) = (significant_children(a), significant_children(b));
    ca.len() == cb.len() && ca.iter().zip(&cb).all(|(x, y)| nodes_deep_equal(x, y, collation))
}

pub(super) fn deep_equal_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let collation = collation_arg(ctx, args, 2)?;
    let cmp_ctx = ctx.dyn_ctx.compare_context(collation.clone());
    let (left, right) = (items(&args[0])?, items(&args[1])?);
    if left.len() != right.len() {
        return Ok(boolean(false));
    }
    for (a, b) in left.iter().zip(&right) {
        let equal = match (a, b) {
            (XdmItem::Atomic(x), XdmItem::Atomic(y)) => atomic_deep_equal(x, y, &cmp_ctx)?,
            (XdmItem::Node(x), XdmItem::Node(y)) => nodes_deep_equal(x, y, collation.as_ref()),
            _ => false,
        };
        if !equal {
            return Ok(boolean(false));
        }
    }
    Ok(boolean(true))
}

pub(super) fn index_of_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let search = one_atomic(ctx, &args[1], 2)?;
    let cmp_ctx = ctx.dyn_ctx.compare_context(collation_arg(ctx, args, 2)?);
    let mut hits = Vec::new();
    for (i, v) in atomized(&args[0])?.iter().enumerate() {
        // Incomparable pairs are simply not matches.
        if let Ok(Comparison::Equal) = compare_atomic(v, &search, &cmp_ctx, VALUE_EQUALITY) {
            hits.push(XdmAtomicValue::integer(i128::try_from(i + 1).unwrap_or(i128::MAX)));
        }
    }
    Ok(XdmSequenceStream::from_atomics(hits))
}

fn position_arg(p: i128) -> i64 {
    i64::try_from(p).unwrap_or(if p < 0 { i64::MIN } else { i64::MAX })
}

pub(super) fn insert_before_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let position = position_arg(one_integer(ctx, &args[1], 2)?);
    Ok(insert_before(&args[0], position, &args[2]))
}

pub(super) fn remove_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let position = position_arg(one_integer(ctx, &args[1], 2)?);
    Ok(remove(&args[0], position))
}

pub(super) fn subsequence_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let start = one_double(ctx, &args[1], 2)?;
    let length = match args.get(2) {
        Some(l) => Some(one_double(ctx, l, 3)?),
        None => None,
    };
    Ok(subsequence(&args[0], start, length))
}

/// Item at a 1-based position, using the quick index when the source has one.
pub(super) fn item_at_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let Some(pos) = opt_integer(ctx, &args[1], 2)? else {
        return Ok(XdmSequenceStream::empty());
    };
    let Ok(pos) = usize::try_from(pos) else {
        return Ok(XdmSequenceStream::empty());
    };
    Ok(args[0].item_at(pos)?.map_or_else(XdmSequenceStream::empty, XdmSequenceStream::single))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::collation::{CodepointCollation, SimpleCaseCollation};
    use crate::model::simple::{attr, elem, text};

    #[test]
    fn deep_equal_ignores_attribute_order_but_not_child_order() {
        let a = elem("p").attr(attr("x", "1")).attr(attr("y", "2")).child(text("hi")).build();
        let b = elem("p").attr(attr("y", "2")).attr(attr("x", "1")).child(text("hi")).build();
        let c = elem("p").attr(attr("x", "1")).attr(attr("y", "2")).child(text("HI")).build();
        assert!(nodes_deep_equal(&a, &b, &CodepointCollation));
        assert!(!nodes_deep_equal(&a, &c, &CodepointCollation));
        assert!(nodes_deep_equal(&a, &c, &SimpleCaseCollation));
    }
}
