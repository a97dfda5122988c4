//! Value comparison.
//!
//! [`compare_atomic`] returns one of five codes. `Fail` means both operands are
//! comparable but stand in no order (NaN, unequal QNames, mismatched duration
//! subtypes under equality). `Error` means the operand types cannot be
//! compared at all. Callers branch on the difference: `distinct-values`
//! treats a NaN/NaN `Fail` as a match, `index-of` never matches on `Error`.
use core::cmp::Ordering;
use core::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;
use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::engine::collation::{CodepointCollation, Collation};
use crate::engine::runtime::{Error, ErrorCode};
use crate::xdm::cast::CastContext;
use crate::xdm::lexical::parse_double;
use crate::xdm::value::{Numeric, hash_as_double};
use crate::xdm::{AtomicType, TypeFamily, XdmAtomicValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Equal,
    Less,
    Greater,
    /// Comparable, but no relative order exists.
    Fail,
    /// The operand types are incomparable.
    Error,
}

impl Comparison {
    pub fn from_ordering(o: Ordering) -> Self {
        match o {
            Ordering::Less => Comparison::Less,
            Ordering::Equal => Comparison::Equal,
            Ordering::Greater => Comparison::Greater,
        }
    }

    /// Mirror the result of a reflected comparison.
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Comparison::Less => Comparison::Greater,
            Comparison::Greater => Comparison::Less,
            other => other,
        }
    }

    pub fn is_equal(self) -> bool {
        self == Comparison::Equal
    }

    pub fn to_ordering(self) -> Option<Ordering> {
        match self {
            Comparison::Less => Some(Ordering::Less),
            Comparison::Equal => Some(Ordering::Equal),
            Comparison::Greater => Some(Ordering::Greater),
            Comparison::Fail | Comparison::Error => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompareFlags {
    /// The caller needs an order (`lt`, `gt`, sorting), not just equality.
    pub ordering: bool,
    /// Value-comparison rules: untyped operands are strings and never
    /// promoted to numbers.
    pub value_comparison: bool,
}

impl CompareFlags {
    pub const EQUALITY: CompareFlags = CompareFlags { ordering: false, value_comparison: false };
    pub const ORDERING: CompareFlags = CompareFlags { ordering: true, value_comparison: false };
}

/// Environment of a comparison: the string collation and the implicit timezone
/// applied to moments that carry none.
#[derive(Clone)]
pub struct CompareContext {
    pub collation: Arc<dyn Collation>,
    pub implicit_tz: FixedOffset,
}

impl CompareContext {
    pub fn new(collation: Arc<dyn Collation>, implicit_tz: FixedOffset) -> Self {
        Self { collation, implicit_tz }
    }

    #[must_use]
    pub fn with_collation(&self, collation: Arc<dyn Collation>) -> Self {
        Self { collation, implicit_tz: self.implicit_tz }
    }
}

impl Default for CompareContext {
    fn default() -> Self {
        Self { collation: Arc::new(CodepointCollation), implicit_tz: Utc.fix() }
    }
}

impl core::fmt::Debug for CompareContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompareContext")
            .field("collation", &self.collation.uri())
            .field("implicit_tz", &self.implicit_tz)
            .finish()
    }
}

fn unparsable_untyped(s: &str) -> Error {
    Error::from_code(ErrorCode::FORG0001, format!("cannot convert untyped value '{s}' to xs:double"))
}

/// Compare two atomic values.
///
/// Dispatch happens on the left operand's family. A string on the left meeting
/// a non-string on the right is reflected so the right operand's rules apply.
/// An untyped operand adopts the other side's type, except that two untyped
/// operands compare as strings.
pub fn compare_atomic(
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
    ctx: &CompareContext,
    flags: CompareFlags,
) -> Result<Comparison, Error> {
    use XdmAtomicValue as V;
    match a {
        V::UntypedAtomic(s) => compare_untyped(s, b, ctx, flags),
        V::String { value: s, .. } | V::AnyUri(s) => match b.string_like() {
            Some(t) => Ok(compare_strings(s, t, ctx)),
            None => Ok(compare_atomic(b, a, ctx, flags)?.reverse()),
        },
        V::Integer { .. } | V::Decimal(_) | V::Float(_) | V::Double(_) => {
            let Some(left) = a.numeric() else { return Ok(Comparison::Error) };
            match b {
                V::UntypedAtomic(s) => Ok(compare_untyped(s, a, ctx, flags)?.reverse()),
                _ => Ok(b.numeric().map_or(Comparison::Error, |right| compare_numeric(left, right))),
            }
        }
        V::Boolean(x) => match b {
            V::Boolean(y) => Ok(Comparison::from_ordering(x.cmp(y))),
            V::UntypedAtomic(s) => Ok(compare_untyped(s, a, ctx, flags)?.reverse()),
            _ => Ok(Comparison::Error),
        },
        V::Duration { ty: ta, value: da } => match b {
            V::Duration { ty: tb, value: db } => {
                let same_ordered_kind = ta == tb && *ta != AtomicType::Duration;
                if flags.ordering {
                    if !same_ordered_kind {
                        return Ok(Comparison::Error);
                    }
                    let ord = match ta {
                        AtomicType::YearMonthDuration => da.months().cmp(&db.months()),
                        _ => da.seconds().cmp(&db.seconds()),
                    };
                    Ok(Comparison::from_ordering(ord))
                } else if da == db {
                    Ok(Comparison::Equal)
                } else if same_ordered_kind {
                    let ord = da.months().cmp(&db.months()).then(da.seconds().cmp(&db.seconds()));
                    Ok(Comparison::from_ordering(ord))
                } else {
                    Ok(Comparison::Fail)
                }
            }
            V::UntypedAtomic(s) => Ok(compare_untyped(s, a, ctx, flags)?.reverse()),
            _ => Ok(Comparison::Error),
        },
        V::Moment { ty: ta, value: ma } => match b {
            V::Moment { ty: tb, value: mb } if ta == tb => {
                let is_gregorian_part = !matches!(ta, AtomicType::DateTime | AtomicType::Date | AtomicType::Time);
                if flags.ordering && is_gregorian_part {
                    return Ok(Comparison::Error);
                }
                let ord = ma.utc_instant(ctx.implicit_tz).cmp(&mb.utc_instant(ctx.implicit_tz));
                Ok(Comparison::from_ordering(ord))
            }
            V::UntypedAtomic(s) => Ok(compare_untyped(s, a, ctx, flags)?.reverse()),
            _ => Ok(Comparison::Error),
        },
        V::QName(qa) => match b {
            V::QName(qb) if !flags.ordering => {
                Ok(if qa.same_name(qb) { Comparison::Equal } else { Comparison::Fail })
            }
            _ => Ok(Comparison::Error),
        },
        V::Binary { ty: ta, bytes: ba } => match b {
            V::Binary { ty: tb, bytes: bb } if ta == tb && !flags.ordering => {
                Ok(if ba == bb { Comparison::Equal } else { Comparison::Fail })
            }
            V::UntypedAtomic(s) if !flags.ordering => Ok(compare_untyped(s, a, ctx, flags)?.reverse()),
            _ => Ok(Comparison::Error),
        },
        V::HostObject(oa) => match b {
            V::HostObject(ob) => Ok(if oa == ob { Comparison::Equal } else { Comparison::Fail }),
            _ => Ok(Comparison::Error),
        },
    }
}

fn compare_untyped(
    s: &str,
    other: &XdmAtomicValue,
    ctx: &CompareContext,
    flags: CompareFlags,
) -> Result<Comparison, Error> {
    if let Some(t) = other.string_like() {
        return Ok(compare_strings(s, t, ctx));
    }
    if flags.value_comparison {
        return Ok(Comparison::Error);
    }
    let ty = other.atomic_type();
    if let Some(right) = other.numeric() {
        let left = parse_double(s).ok_or_else(|| unparsable_untyped(s))?;
        return Ok(compare_numeric(Numeric::Double(left), right));
    }
    if matches!(ty.family(), TypeFamily::QName | TypeFamily::HostObject) {
        return Ok(Comparison::Error);
    }
    let converted = ty.cast(&XdmAtomicValue::untyped(s), &CastContext::default())?;
    compare_atomic(&converted, other, ctx, flags)
}

fn compare_strings(a: &str, b: &str, ctx: &CompareContext) -> Comparison {
    Comparison::from_ordering(ctx.collation.compare(a, b))
}

/// Compare two numbers after promoting both to the wider type.
pub fn compare_numeric(a: Numeric, b: Numeric) -> Comparison {
    let rank = a.rank().max(b.rank());
    let (Some(pa), Some(pb)) = (a.promote_to(rank), b.promote_to(rank)) else {
        return compare_f64(a.to_f64(), b.to_f64());
    };
    match (pa, pb) {
        (Numeric::Integer(x), Numeric::Integer(y)) => Comparison::from_ordering(x.cmp(&y)),
        (Numeric::Decimal(x), Numeric::Decimal(y)) => Comparison::from_ordering(x.cmp(&y)),
        (Numeric::Float(x), Numeric::Float(y)) => {
            x.partial_cmp(&y).map_or(Comparison::Fail, Comparison::from_ordering)
        }
        (x, y) => compare_f64(x.to_f64(), y.to_f64()),
    }
}

fn compare_f64(x: f64, y: f64) -> Comparison {
    x.partial_cmp(&y).map_or(Comparison::Fail, Comparison::from_ordering)
}

/// Equality predicate used by `distinct-values`: `Equal`, or `Fail` between
/// two NaN values.
pub fn distinct_equal(a: &XdmAtomicValue, b: &XdmAtomicValue, ctx: &CompareContext) -> bool {
    let flags = CompareFlags { ordering: false, value_comparison: true };
    match compare_atomic(a, b, ctx, flags) {
        Ok(Comparison::Equal) => true,
        Ok(Comparison::Fail) => a.is_nan() && b.is_nan(),
        _ => false,
    }
}

/// Hash consistent with [`distinct_equal`] under the same context.
///
/// Numbers hash through their float image: a decimal equal to a float at
/// float precision must land in the float's bucket, and values equal at
/// double precision also agree once rounded to float.
pub fn hash_atomic(value: &XdmAtomicValue, ctx: &CompareContext) -> u64 {
    use XdmAtomicValue as V;
    if let Some(n) = value.numeric() {
        return hash_as_double(f64::from(n.to_f32()));
    }
    let mut h = DefaultHasher::new();
    match value {
        V::UntypedAtomic(s) | V::AnyUri(s) | V::String { value: s, .. } => {
            0u8.hash(&mut h);
            ctx.collation.key(s).hash(&mut h);
        }
        V::Boolean(b) => b.hash(&mut h),
        V::Duration { value, .. } => {
            value.months().hash(&mut h);
            value.seconds().normalize().hash(&mut h);
        }
        V::Moment { value, .. } => value.utc_instant(ctx.implicit_tz).hash(&mut h),
        V::QName(q) => {
            q.ns_uri.hash(&mut h);
            q.local.hash(&mut h);
        }
        V::Binary { bytes, .. } => bytes.hash(&mut h),
        V::HostObject(o) => o.identity().hash(&mut h),
        V::Integer { .. } | V::Decimal(_) | V::Float(_) | V::Double(_) => {}
    }
    h.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    fn needs_order(self) -> bool {
        matches!(self, ComparisonOp::Lt | ComparisonOp::Le | ComparisonOp::Gt | ComparisonOp::Ge)
    }

    fn holds(self, c: Comparison) -> bool {
        use Comparison as C;
        match self {
            ComparisonOp::Eq => c == C::Equal,
            ComparisonOp::Ne => c != C::Equal,
            ComparisonOp::Lt => c == C::Less,
            ComparisonOp::Le => matches!(c, C::Less | C::Equal),
            ComparisonOp::Gt => c == C::Greater,
            ComparisonOp::Ge => matches!(c, C::Greater | C::Equal),
        }
    }
}

fn incomparable(a: &XdmAtomicValue, b: &XdmAtomicValue) -> Error {
    Error::from_code(
        ErrorCode::XPTY0004,
        format!("cannot compare {} with {}", a.atomic_type(), b.atomic_type()),
    )
}

/// Value comparison (`eq`, `lt`, ...) of two atomic values.
pub fn value_compare(
    op: ComparisonOp,
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
    ctx: &CompareContext,
) -> Result<bool, Error> {
    let flags = CompareFlags { ordering: op.needs_order(), value_comparison: true };
    match compare_atomic(a, b, ctx, flags)? {
        Comparison::Error => Err(incomparable(a, b)),
        c => Ok(op.holds(c)),
    }
}

/// General comparison (`=`, `<`, ...): existential over both atomized operands.
pub fn general_compare(
    op: ComparisonOp,
    lhs: &[XdmAtomicValue],
    rhs: &[XdmAtomicValue],
    ctx: &CompareContext,
) -> Result<bool, Error> {
    let flags = CompareFlags { ordering: op.needs_order(), value_comparison: false };
    for a in lhs {
        for b in rhs {
            match compare_atomic(a, b, ctx, flags)? {
                Comparison::Error => return Err(incomparable(a, b)),
                c if op.holds(c) => return Ok(true),
                _ => {}
            }
        }
    }
    Ok(false)
}

/// Sort-key comparator for `order by` style sorting.
///
/// Empty keys and NaN sort first, or last with `empty_greatest`. Two such keys
/// are equal.
pub fn compare_for_order(
    a: Option<&XdmAtomicValue>,
    b: Option<&XdmAtomicValue>,
    ctx: &CompareContext,
    empty_greatest: bool,
) -> Result<Ordering, Error> {
    let lowest = |v: Option<&XdmAtomicValue>| v.is_none_or(XdmAtomicValue::is_nan);
    let empty_side = if empty_greatest { Ordering::Greater } else { Ordering::Less };
    match (a, b) {
        (x, y) if lowest(x) && lowest(y) => Ok(Ordering::Equal),
        (x, _) if lowest(x) => Ok(empty_side),
        (_, y) if lowest(y) => Ok(empty_side.reverse()),
        (Some(x), Some(y)) => match compare_atomic(x, y, ctx, CompareFlags::ORDERING)? {
            Comparison::Error => Err(incomparable(x, y)),
            c => Ok(c.to_ordering().unwrap_or(Ordering::Equal)),
        },
        _ => Ok(Ordering::Equal),
    }
}

/// Decimal from an integer, used when the decimal lattice must hold an integer.
pub(crate) fn integer_to_decimal(i: i128) -> Result<Decimal, Error> {
    Decimal::from_i128(i).ok_or_else(|| Error::from_code(ErrorCode::FOAR0002, format!("{i} exceeds xs:decimal range")))
}
