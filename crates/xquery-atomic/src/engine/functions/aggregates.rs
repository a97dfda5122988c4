//! Aggregates over atomized sequences.
//!
//! `sum` and `avg` fold into an [`Accumulator`] whose mode is fixed by the
//! first item: numeric (promoted along integer → decimal → float → double as
//! wider items arrive) or one of the two totally ordered duration types. Any
//! other item, or an item from a different mode, is `err:FORG0006` naming its
//! 1-based position.
use core::cmp::Ordering;

use rust_decimal::Decimal;

use super::common::{FnResult, atomized, collation_arg, integer};
use crate::engine::registry::CallCtx;
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::compare::{Comparison, compare_atomic, integer_to_decimal};
use crate::xdm::derived::distinct_values;
use crate::xdm::{AtomicType, CastContext, CompareFlags, Duration, Numeric, XdmAtomicValue, XdmSequenceStream};

fn overflow() -> Error {
    Error::from_code(ErrorCode::FOAR0002, "numeric overflow in aggregate")
}

fn promote(n: Numeric, rank: u8) -> Result<Numeric, Error> {
    match (n, rank) {
        (Numeric::Integer(i), 1) => Ok(Numeric::Decimal(integer_to_decimal(i)?)),
        _ => n.promote_to(rank).ok_or_else(overflow),
    }
}

fn add_numeric(a: Numeric, b: Numeric) -> Result<Numeric, Error> {
    let rank = a.rank().max(b.rank());
    match (promote(a, rank)?, promote(b, rank)?) {
        (Numeric::Integer(x), Numeric::Integer(y)) => x.checked_add(y).map(Numeric::Integer).ok_or_else(overflow),
        (Numeric::Decimal(x), Numeric::Decimal(y)) => x.checked_add(y).map(Numeric::Decimal).ok_or_else(overflow),
        (Numeric::Float(x), Numeric::Float(y)) => Ok(Numeric::Float(x + y)),
        (x, y) => Ok(Numeric::Double(x.to_f64() + y.to_f64())),
    }
}

/// Running total of `sum`/`avg`.
#[derive(Debug, Clone, Copy)]
enum Accumulator {
    Numeric(Numeric),
    Duration { ty: AtomicType, value: Duration },
}

impl Accumulator {
    fn start(value: &XdmAtomicValue, pos: usize) -> Result<Self, Error> {
        match value {
            XdmAtomicValue::Duration { ty, value }
                if matches!(ty, AtomicType::YearMonthDuration | AtomicType::DayTimeDuration) =>
            {
                Ok(Accumulator::Duration { ty: *ty, value: *value })
            }
            v => v.numeric().map(Accumulator::Numeric).ok_or_else(|| incompatible(v, pos)),
        }
    }

    fn add(self, value: &XdmAtomicValue, pos: usize) -> Result<Self, Error> {
        match (self, value) {
            (Accumulator::Numeric(acc), v) => match v.numeric() {
                Some(n) => Ok(Accumulator::Numeric(add_numeric(acc, n)?)),
                None => Err(incompatible(v, pos)),
            },
            (Accumulator::Duration { ty, value: acc }, XdmAtomicValue::Duration { ty: vt, value: d }) if ty == *vt => {
                Ok(Accumulator::Duration { ty, value: acc.checked_add(*d)? })
            }
            (Accumulator::Duration { .. }, v) => Err(incompatible(v, pos)),
        }
    }

    fn into_value(self) -> XdmAtomicValue {
        match self {
            Accumulator::Numeric(n) => n.into_value(),
            Accumulator::Duration { ty, value } => XdmAtomicValue::duration(ty, value),
        }
    }

    fn divide(self, count: usize) -> Result<XdmAtomicValue, Error> {
        let count_i64 = i64::try_from(count).map_err(|_| overflow())?;
        Ok(match self {
            Accumulator::Numeric(Numeric::Integer(sum)) => {
                XdmAtomicValue::decimal(integer_to_decimal(sum)?.checked_div(Decimal::from(count_i64)).ok_or_else(overflow)?)
            }
            Accumulator::Numeric(Numeric::Decimal(sum)) => {
                XdmAtomicValue::decimal(sum.checked_div(Decimal::from(count_i64)).ok_or_else(overflow)?)
            }
            #[allow(clippy::cast_precision_loss)]
            Accumulator::Numeric(Numeric::Float(sum)) => XdmAtomicValue::float(sum / count as f32),
            #[allow(clippy::cast_precision_loss)]
            Accumulator::Numeric(Numeric::Double(sum)) => XdmAtomicValue::double(sum / count as f64),
            Accumulator::Duration { ty, value } => XdmAtomicValue::duration(ty, value.checked_div(count_i64)?),
        })
    }
}

fn incompatible(value: &XdmAtomicValue, pos: usize) -> Error {
    Error::from_code(
        ErrorCode::FORG0006,
        format!("item {pos} of type {} cannot be aggregated with the preceding items", value.atomic_type()),
    )
}

/// Atomized values with untyped items cast to `xs:double`.
fn aggregate_inputs<N: XdmNode>(seq: &XdmSequenceStream<N>) -> Result<Vec<XdmAtomicValue>, Error> {
    atomized(seq)?
        .into_iter()
        .map(|v| if v.is_untyped() { AtomicType::Double.cast(&v, &CastContext::default()) } else { Ok(v) })
        .collect()
}

fn accumulate(values: &[XdmAtomicValue]) -> Result<Option<Accumulator>, Error> {
    let mut acc: Option<Accumulator> = None;
    for (i, v) in values.iter().enumerate() {
        acc = Some(match acc {
            None => Accumulator::start(v, i + 1)?,
            Some(a) => a.add(v, i + 1)?,
        });
    }
    Ok(acc)
}

pub(super) fn count_fn<N: XdmNode>(_ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let n = args[0].item_count()?;
    Ok(integer(i128::try_from(n).map_err(|_| overflow())?))
}

pub(super) fn sum_fn<N: XdmNode>(_ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let values = aggregate_inputs(&args[0])?;
    match accumulate(&values)? {
        Some(acc) => Ok(XdmSequenceStream::atomic(acc.into_value())),
        None => match args.get(1) {
            Some(zero) => Ok(zero.clone()),
            None => Ok(integer(0)),
        },
    }
}

pub(super) fn avg_fn<N: XdmNode>(_ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let values = aggregate_inputs(&args[0])?;
    match accumulate(&values)? {
        Some(acc) => Ok(XdmSequenceStream::atomic(acc.divide(values.len())?)),
        None => Ok(XdmSequenceStream::empty()),
    }
}

pub(super) fn max_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    extreme(ctx, args, Ordering::Greater)
}

pub(super) fn min_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    extreme(ctx, args, Ordering::Less)
}

/// `max`/`min`: NaN wins over every number, numbers come back promoted to the
/// widest numeric type seen, anyURI compares as string.
fn extreme<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>], want: Ordering) -> FnResult<N> {
    let cmp_ctx = ctx.dyn_ctx.compare_context(collation_arg(ctx, args, 1)?);
    let mut best: Option<XdmAtomicValue> = None;
    let mut rank: Option<u8> = None;
    for (i, v) in aggregate_inputs(&args[0])?.into_iter().enumerate() {
        let v = match v {
            XdmAtomicValue::AnyUri(s) => XdmAtomicValue::string(s),
            other => other,
        };
        let reference = best.as_ref().unwrap_or(&v);
        let c = compare_atomic(&v, reference, &cmp_ctx, CompareFlags::ORDERING)?;
        let nan_involved = v.is_nan() || reference.is_nan();
        if c == Comparison::Error || (c == Comparison::Fail && !nan_involved) {
            return Err(ctx.error(
                ErrorCode::FORG0006,
                format!("item {} of type {} is not comparable with the preceding items", i + 1, v.atomic_type()),
            ));
        }
        if let Some(n) = v.numeric() {
            rank = Some(rank.map_or(n.rank(), |r| r.max(n.rank())));
        }
        let replace = match &best {
            None => true,
            Some(b) if b.is_nan() => false,
            Some(_) => v.is_nan() || c.to_ordering() == Some(want),
        };
        if replace {
            best = Some(v);
        }
    }
    let result = match (best, rank) {
        (Some(b), Some(r)) => match b.numeric() {
            Some(n) if n.rank() < r => Some(promote(n, r)?.into_value()),
            _ => Some(b),
        },
        (b, _) => b,
    };
    Ok(XdmSequenceStream::optional(result))
}

pub(super) fn distinct_values_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let cmp_ctx = ctx.dyn_ctx.compare_context(collation_arg(ctx, args, 1)?);
    Ok(distinct_values(&args[0], cmp_ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_meeting_decimal_promotes_the_running_total() {
        let values = [XdmAtomicValue::integer(1), XdmAtomicValue::decimal(Decimal::new(25, 1))];
        let acc = accumulate(&values).ok().flatten().map(Accumulator::into_value);
        assert_eq!(acc, Some(XdmAtomicValue::decimal(Decimal::new(35, 1))));
    }

    #[test]
    fn string_in_numeric_total_reports_its_position() {
        let values = [XdmAtomicValue::integer(1), XdmAtomicValue::integer(2), XdmAtomicValue::string("x")];
        let err = accumulate(&values).err();
        assert_eq!(err.as_ref().map(Error::code_enum), Some(ErrorCode::FORG0006));
        assert!(err.is_some_and(|e| e.message.contains("item 3")));
    }

    #[test]
    fn decimal_total_meeting_duration_is_rejected() {
        let values = [XdmAtomicValue::decimal(Decimal::ONE), XdmAtomicValue::year_month_duration(3)];
        assert!(accumulate(&values).is_err());
    }
}
