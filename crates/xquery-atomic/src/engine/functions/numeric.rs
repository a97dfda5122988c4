use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::common::{FnResult, one_double, one_integer, opt_atomic, opt_numeric};
use crate::engine::registry::CallCtx;
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::cast::{decimal_from_f64, number_from_str};
use crate::xdm::compare::integer_to_decimal;
use crate::xdm::{AtomicType, CastContext, Numeric, XdmAtomicValue, XdmSequenceStream};

#[derive(Clone, Copy)]
enum Rounding {
    /// Halves go toward positive infinity (`fn:round`).
    HalfUp,
    HalfEven,
}

fn overflow(what: &str) -> Error {
    Error::from_code(ErrorCode::FOAR0002, format!("numeric overflow in {what}"))
}

fn map_numeric<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    args: &[XdmSequenceStream<N>],
    f: impl Fn(Numeric) -> Result<Numeric, Error>,
) -> FnResult<N> {
    match opt_numeric(ctx, &args[0], 1)? {
        None => Ok(XdmSequenceStream::empty()),
        Some(n) => Ok(XdmSequenceStream::atomic(f(n)?.into_value())),
    }
}

pub(super) fn abs_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    map_numeric(ctx, args, |n| {
        Ok(match n {
            Numeric::Integer(i) => Numeric::Integer(i.checked_abs().ok_or_else(|| overflow("fn:abs"))?),
            Numeric::Decimal(d) => Numeric::Decimal(d.abs()),
            Numeric::Float(f) => Numeric::Float(f.abs()),
            Numeric::Double(d) => Numeric::Double(d.abs()),
        })
    })
}

pub(super) fn ceiling_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    map_numeric(ctx, args, |n| {
        Ok(match n {
            Numeric::Integer(i) => Numeric::Integer(i),
            Numeric::Decimal(d) => Numeric::Decimal(d.ceil()),
            Numeric::Float(f) => Numeric::Float(f.ceil()),
            Numeric::Double(d) => Numeric::Double(d.ceil()),
        })
    })
}

pub(super) fn floor_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    map_numeric(ctx, args, |n| {
        Ok(match n {
            Numeric::Integer(i) => Numeric::Integer(i),
            Numeric::Decimal(d) => Numeric::Decimal(d.floor()),
            Numeric::Float(f) => Numeric::Float(f.floor()),
            Numeric::Double(d) => Numeric::Double(d.floor()),
        })
    })
}

pub(super) fn round_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let precision = match args.get(1) {
        Some(p) => one_integer(ctx, p, 2)?,
        None => 0,
    };
    map_numeric(ctx, args, |n| round_numeric(n, precision, Rounding::HalfUp))
}

pub(super) fn round_half_to_even_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let precision = match args.get(1) {
        Some(p) => one_integer(ctx, p, 2)?,
        None => 0,
    };
    map_numeric(ctx, args, |n| round_numeric(n, precision, Rounding::HalfEven))
}

fn round_numeric(n: Numeric, precision: i128, mode: Rounding) -> Result<Numeric, Error> {
    Ok(match n {
        Numeric::Integer(i) if precision >= 0 => Numeric::Integer(i),
        Numeric::Integer(i) => {
            let rounded = round_decimal(integer_to_decimal(i)?, precision, mode)?;
            Numeric::Integer(rounded.to_i128().ok_or_else(|| overflow("rounding"))?)
        }
        Numeric::Decimal(d) => Numeric::Decimal(round_decimal(d, precision, mode)?),
        #[allow(clippy::cast_possible_truncation)]
        Numeric::Float(f) => Numeric::Float(round_f64(f64::from(f), precision, mode)? as f32),
        Numeric::Double(d) => Numeric::Double(round_f64(d, precision, mode)?),
    })
}

fn strategy(d: Decimal, mode: Rounding) -> RoundingStrategy {
    match mode {
        Rounding::HalfEven => RoundingStrategy::MidpointNearestEven,
        Rounding::HalfUp if d.is_sign_negative() => RoundingStrategy::MidpointTowardZero,
        Rounding::HalfUp => RoundingStrategy::MidpointAwayFromZero,
    }
}

fn round_decimal(d: Decimal, precision: i128, mode: Rounding) -> Result<Decimal, Error> {
    let strategy = strategy(d, mode);
    if precision >= 0 {
        let dp = u32::try_from(precision).unwrap_or(u32::MAX).min(28);
        return Ok(d.round_dp_with_strategy(dp, strategy));
    }
    let mut factor = Decimal::ONE;
    for _ in 0..(-precision).min(29) {
        match factor.checked_mul(Decimal::TEN) {
            Some(f) => factor = f,
            None => return Ok(Decimal::ZERO),
        }
    }
    (d / factor).round_dp_with_strategy(0, strategy).checked_mul(factor).ok_or_else(|| overflow("rounding"))
}

fn round_half(x: f64, mode: Rounding) -> f64 {
    let t = x.trunc();
    if (x - t).abs() != 0.5 {
        return x.round();
    }
    match mode {
        Rounding::HalfUp => x.ceil(),
        Rounding::HalfEven if t % 2.0 == 0.0 => t,
        Rounding::HalfEven => t + x.signum(),
    }
}

fn round_f64(x: f64, precision: i128, mode: Rounding) -> Result<f64, Error> {
    if !x.is_finite() || x == 0.0 {
        return Ok(x);
    }
    if precision == 0 {
        return Ok(round_half(x, mode));
    }
    // Exact through the decimal lattice when the value fits.
    if let Ok(d) = decimal_from_f64(x)
        && let Some(f) = round_decimal(d, precision, mode)?.to_f64()
    {
        return Ok(if f == 0.0 { 0.0_f64.copysign(x) } else { f });
    }
    let p = i32::try_from(precision.clamp(-308, 308)).unwrap_or(0);
    let factor = 10_f64.powi(p.abs());
    Ok(if p > 0 { round_half(x * factor, mode) / factor } else { round_half(x / factor, mode) * factor })
}

pub(super) fn number_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let value = match args.first() {
        Some(seq) => opt_atomic(ctx, seq, 1)?,
        None => {
            let mut values = ctx.require_focus()?.atomize();
            if values.len() > 1 {
                return Err(ctx.error(ErrorCode::XPTY0004, "context item atomizes to more than one value"));
            }
            values.pop()
        }
    };
    let n = match value {
        None => f64::NAN,
        Some(v) => match (v.string_like(), v.numeric()) {
            (Some(s), _) => number_from_str(s),
            (_, Some(n)) => n.to_f64(),
            _ => AtomicType::Double
                .cast(&v, &CastContext::default())
                .ok()
                .and_then(|d| d.numeric())
                .map_or(f64::NAN, Numeric::to_f64),
        },
    };
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::double(n)))
}

fn math_unary<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>], f: fn(f64) -> f64) -> FnResult<N> {
    let value = opt_numeric(ctx, &args[0], 1)?;
    Ok(XdmSequenceStream::optional(value.map(|n| XdmAtomicValue::double(f(n.to_f64())))))
}

pub(super) fn pi_fn<N: XdmNode>(_ctx: &CallCtx<'_, N>, _args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::double(core::f64::consts::PI)))
}

pub(super) fn sqrt_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    math_unary(ctx, args, f64::sqrt)
}

pub(super) fn exp_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    math_unary(ctx, args, f64::exp)
}

pub(super) fn exp10_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    math_unary(ctx, args, |x| 10_f64.powf(x))
}

pub(super) fn log_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    math_unary(ctx, args, f64::ln)
}

pub(super) fn log10_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    math_unary(ctx, args, f64::log10)
}

pub(super) fn sin_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    math_unary(ctx, args, f64::sin)
}

pub(super) fn cos_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    math_unary(ctx, args, f64::cos)
}

pub(super) fn tan_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    math_unary(ctx, args, f64::tan)
}

pub(super) fn asin_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    math_unary(ctx, args, f64::asin)
}

pub(super) fn acos_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    math_unary(ctx, args, f64::acos)
}

pub(super) fn atan_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    math_unary(ctx, args, f64::atan)
}

pub(super) fn atan2_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let y = one_double(ctx, &args[0], 1)?;
    let x = one_double(ctx, &args[1], 2)?;
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::double(y.atan2(x))))
}

pub(super) fn pow_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let Some(x) = opt_numeric(ctx, &args[0], 1)? else {
        return Ok(XdmSequenceStream::empty());
    };
    let y = one_double(ctx, &args[1], 2)?;
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::double(x.to_f64().powf(y))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_moves_halves_up_and_half_even_to_even() {
        assert_eq!(round_half(2.5, Rounding::HalfUp), 3.0);
        assert_eq!(round_half(-2.5, Rounding::HalfUp), -2.0);
        assert_eq!(round_half(2.5, Rounding::HalfEven), 2.0);
        assert_eq!(round_half(3.5, Rounding::HalfEven), 4.0);
        assert_eq!(round_f64(2.345, 2, Rounding::HalfEven).ok(), Some(2.34));
        assert_eq!(round_f64(1234.5, -2, Rounding::HalfUp).ok(), Some(1200.0));
    }

    #[test]
    fn decimal_rounding_keeps_negative_precision_in_range() {
        let d = Decimal::new(12_345, 1);
        assert_eq!(round_decimal(d, -2, Rounding::HalfUp).ok(), Some(Decimal::new(1200, 0)));
        assert_eq!(round_decimal(d, -40, Rounding::HalfEven).ok(), Some(Decimal::ZERO));
        assert_eq!(round_numeric(Numeric::Integer(250), -2, Rounding::HalfEven).ok(), Some(Numeric::Integer(200)));
    }
}
