//! Current instant, timezone adjustment and component extraction.
use chrono::FixedOffset;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::common::{FnResult, arg_type_error, integer, opt_atomic};
use crate::engine::registry::CallCtx;
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::temporal::offset_from_minutes;
use crate::xdm::{AtomicType, Duration, Moment, XdmAtomicValue, XdmSequenceStream};

fn opt_moment<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    seq: &XdmSequenceStream<N>,
    pos: usize,
    ty: AtomicType,
) -> Result<Option<Moment>, Error> {
    match opt_atomic(ctx, seq, pos)? {
        None => Ok(None),
        Some(XdmAtomicValue::Moment { ty: actual, value }) if actual == ty => Ok(Some(value)),
        Some(other) => Err(arg_type_error(ctx, pos, &ty.display_name(), &other)),
    }
}

fn offset_duration(tz: FixedOffset) -> XdmAtomicValue {
    XdmAtomicValue::day_time_duration(Decimal::from(tz.local_minus_utc()))
}

/// A `dayTimeDuration` used as a timezone: whole minutes within ±14:00.
fn duration_offset<N: XdmNode>(ctx: &CallCtx<'_, N>, value: &XdmAtomicValue) -> Result<FixedOffset, Error> {
    let seconds = match value {
        XdmAtomicValue::Duration { ty: AtomicType::DayTimeDuration, value } => value.seconds(),
        other => return Err(arg_type_error(ctx, 2, "xs:dayTimeDuration?", other)),
    };
    let invalid = || ctx.error(ErrorCode::FODT0003, format!("{seconds} seconds is not a valid timezone offset"));
    if !(seconds % Decimal::from(60)).is_zero() {
        return Err(invalid());
    }
    let minutes = (seconds / Decimal::from(60)).to_i32().ok_or_else(invalid)?;
    offset_from_minutes(minutes).map_err(|_| invalid())
}

pub(super) fn current_date_time_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, _args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let now = Moment::from_datetime(ctx.dyn_ctx.current_date_time());
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::moment(AtomicType::DateTime, now)))
}

pub(super) fn current_date_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, _args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let now = Moment::from_datetime(ctx.dyn_ctx.current_date_time()).normalized(AtomicType::Date);
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::moment(AtomicType::Date, now)))
}

pub(super) fn current_time_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, _args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let now = Moment::from_datetime(ctx.dyn_ctx.current_date_time()).normalized(AtomicType::Time);
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::moment(AtomicType::Time, now)))
}

pub(super) fn implicit_timezone_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, _args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(XdmSequenceStream::atomic(offset_duration(ctx.dyn_ctx.implicit_timezone())))
}

/// `fn:dateTime($date, $time)`; conflicting timezones are `err:FORG0008`.
pub(super) fn date_time_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let date = opt_moment(ctx, &args[0], 1, AtomicType::Date)?;
    let time = opt_moment(ctx, &args[1], 2, AtomicType::Time)?;
    let (Some(date), Some(time)) = (date, time) else {
        return Ok(XdmSequenceStream::empty());
    };
    let tz = match (date.tz, time.tz) {
        (Some(a), Some(b)) if a != b => {
            return Err(ctx.error(ErrorCode::FORG0008, "date and time carry different timezones"));
        }
        (a, b) => a.or(b),
    };
    let combined = Moment::new(date.date, time.time, tz);
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::moment(AtomicType::DateTime, combined)))
}

/// Shared body of the `adjust-*-to-timezone` functions. Without a second
/// argument the implicit timezone is the target.
pub(super) fn adjust_to_timezone<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>], ty: AtomicType) -> FnResult<N> {
    let Some(value) = opt_moment(ctx, &args[0], 1, ty)? else {
        return Ok(XdmSequenceStream::empty());
    };
    let target = match args.get(1) {
        None => Some(ctx.dyn_ctx.implicit_timezone()),
        Some(seq) => match opt_atomic(ctx, seq, 2)? {
            None => None,
            Some(d) => Some(duration_offset(ctx, &d)?),
        },
    };
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::moment(ty, value.adjust_timezone(ty, target)?)))
}

/// Which part of a moment a `*-from-*` accessor returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Component {
    Year,
    Month,
    Day,
    Hours,
    Minutes,
    Seconds,
    Timezone,
}

fn component_value(m: &Moment, component: Component) -> Option<XdmAtomicValue> {
    Some(match component {
        Component::Year => XdmAtomicValue::integer(i128::from(m.year())),
        Component::Month => XdmAtomicValue::integer(i128::from(m.month())),
        Component::Day => XdmAtomicValue::integer(i128::from(m.day())),
        Component::Hours => XdmAtomicValue::integer(i128::from(m.hour())),
        Component::Minutes => XdmAtomicValue::integer(i128::from(m.minute())),
        Component::Seconds => XdmAtomicValue::decimal(m.second().normalize()),
        Component::Timezone => return m.tz.map(offset_duration),
    })
}

/// Shared body of the `year-from-dateTime` family.
pub(super) fn moment_component<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    args: &[XdmSequenceStream<N>],
    ty: AtomicType,
    component: Component,
) -> FnResult<N> {
    let value = opt_moment(ctx, &args[0], 1, ty)?.and_then(|m| component_value(&m, component));
    Ok(XdmSequenceStream::optional(value))
}

/// Which part of a duration a `*-from-duration` accessor returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DurationPart {
    Years,
    Months,
    Days,
    Hours,
    Minutes,
    Seconds,
}

/// Shared body of `years-from-duration` and friends. Each result carries
/// the sign of the whole duration.
pub(super) fn duration_component<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    args: &[XdmSequenceStream<N>],
    part: DurationPart,
) -> FnResult<N> {
    let d: Duration = match opt_atomic(ctx, &args[0], 1)? {
        None => return Ok(XdmSequenceStream::empty()),
        Some(XdmAtomicValue::Duration { value, .. }) => value,
        Some(other) => return Err(arg_type_error(ctx, 1, "xs:duration?", &other)),
    };
    Ok(match part {
        DurationPart::Years => integer(i128::from(d.years_component())),
        DurationPart::Months => integer(i128::from(d.months_component())),
        DurationPart::Days => integer(i128::from(d.days_component())),
        DurationPart::Hours => integer(i128::from(d.hours_component())),
        DurationPart::Minutes => integer(i128::from(d.minutes_component())),
        DurationPart::Seconds => XdmSequenceStream::atomic(XdmAtomicValue::decimal(d.seconds_component())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn seconds_component_keeps_the_fraction() {
        let time = NaiveTime::from_hms_milli_opt(10, 20, 30, 500).unwrap();
        let m = Moment::new(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(), time, None);
        assert_eq!(component_value(&m, Component::Seconds), Some(XdmAtomicValue::decimal(Decimal::new(305, 1))));
        assert_eq!(component_value(&m, Component::Timezone), None);
        assert_eq!(component_value(&m, Component::Day), Some(XdmAtomicValue::integer(29)));
    }

    #[test]
    fn offset_duration_is_signed_seconds() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(offset_duration(tz), XdmAtomicValue::day_time_duration(Decimal::from(-18_000)));
    }
}
