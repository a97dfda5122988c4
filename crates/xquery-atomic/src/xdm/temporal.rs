//! Date/time moments and durations.
//!
//! A [`Moment`] stores a full date and time plus an optional timezone for every
//! temporal type. Types that carry fewer components keep reference values in the
//! unused fields (year 1972, December 31st, midnight), applied by
//! [`Moment::normalized`]. Ordering and equality then reduce to comparing UTC
//! instants of moments of the same type.
//!
//! A [`Duration`] is split into a signed month count and a signed decimal
//! second count. Both halves share one sign.
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::xdm::AtomicType;
use crate::xdm::lexical::is_xml_whitespace;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemporalError {
    #[error("invalid lexical form for {ty}: '{input}'")]
    Lexical { ty: &'static str, input: String },
    #[error("invalid timezone: {0}")]
    Timezone(String),
    #[error("date/time value out of range")]
    Overflow,
    #[error("duration value out of range")]
    DurationOverflow,
}

fn lexical(ty: AtomicType, input: &str) -> TemporalError {
    TemporalError::Lexical { ty: ty.local_name(), input: input.to_string() }
}

const REFERENCE_YEAR: i32 = 1972;
const SECONDS_PER_DAY: i64 = 86_400;

fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(REFERENCE_YEAR, 12, 31).unwrap_or_default()
}

/// Build a timezone from an offset in minutes. Valid range is -14:00..=+14:00.
pub fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, TemporalError> {
    if minutes.abs() > 14 * 60 {
        return Err(TemporalError::Timezone(format!("{minutes} minutes")));
    }
    FixedOffset::east_opt(minutes * 60).ok_or_else(|| TemporalError::Timezone(format!("{minutes} minutes")))
}

/// Render an offset as `Z` or `+hh:mm`.
pub fn format_offset(tz: FixedOffset) -> String {
    let secs = tz.local_minus_utc();
    if secs == 0 {
        return "Z".to_string();
    }
    let sign = if secs < 0 { '-' } else { '+' };
    let abs = secs.abs();
    format!("{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self { bytes: s.as_bytes(), pos: 0 }
    }
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }
    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
    fn done(&self) -> bool {
        self.pos >= self.bytes.len()
    }
    /// Longest run of ASCII digits at the cursor.
    fn digit_run(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }
    fn fixed(&mut self, n: usize) -> Option<u32> {
        let run = self.bytes.get(self.pos..self.pos + n)?;
        if !run.iter().all(u8::is_ascii_digit) {
            return None;
        }
        self.pos += n;
        Some(run.iter().fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0')))
    }
}

fn digits_value(run: &[u8]) -> Option<i64> {
    if run.is_empty() || run.len() > 18 {
        return None;
    }
    Some(run.iter().fold(0i64, |acc, b| acc * 10 + i64::from(b - b'0')))
}

fn scan_year(sc: &mut Scanner<'_>) -> Option<i32> {
    let negative = sc.eat(b'-');
    let run = sc.digit_run();
    if run.len() < 4 || (run.len() > 4 && run[0] == b'0') {
        return None;
    }
    let value = i32::try_from(digits_value(run)?).ok()?;
    if value == 0 {
        return None;
    }
    Some(if negative { -value } else { value })
}

fn scan_timezone(sc: &mut Scanner<'_>) -> Result<Option<FixedOffset>, ()> {
    if sc.done() {
        return Ok(None);
    }
    if sc.eat(b'Z') {
        return Ok(FixedOffset::east_opt(0));
    }
    let sign = if sc.eat(b'+') {
        1
    } else if sc.eat(b'-') {
        -1
    } else {
        return Err(());
    };
    let hh = sc.fixed(2).ok_or(())?;
    if !sc.eat(b':') {
        return Err(());
    }
    let mm = sc.fixed(2).ok_or(())?;
    if mm > 59 || hh > 14 || (hh == 14 && mm != 0) {
        return Err(());
    }
    let secs = i32::try_from(hh * 3600 + mm * 60).map_err(|_| ())?;
    FixedOffset::east_opt(sign * secs).map(Some).ok_or(())
}

/// Scan `hh:mm:ss(.fff)?`. Returns the time and whether it was `24:00:00`.
fn scan_time(sc: &mut Scanner<'_>) -> Option<(NaiveTime, bool)> {
    let hh = sc.fixed(2)?;
    if !sc.eat(b':') {
        return None;
    }
    let mm = sc.fixed(2)?;
    if !sc.eat(b':') {
        return None;
    }
    let ss = sc.fixed(2)?;
    let mut nanos = 0u32;
    if sc.eat(b'.') {
        let run = sc.digit_run();
        if run.is_empty() {
            return None;
        }
        for i in 0..9 {
            nanos = nanos * 10 + run.get(i).map_or(0, |b| u32::from(b - b'0'));
        }
    }
    if hh == 24 {
        return (mm == 0 && ss == 0 && nanos == 0).then_some((NaiveTime::MIN, true));
    }
    if mm > 59 || ss > 59 {
        return None;
    }
    NaiveTime::from_hms_nano_opt(hh, mm, ss, nanos).map(|t| (t, false))
}

fn scan_month_day(sc: &mut Scanner<'_>) -> Option<(u32, u32)> {
    let month = sc.fixed(2)?;
    if !sc.eat(b'-') {
        return None;
    }
    let day = sc.fixed(2)?;
    Some((month, day))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Moment {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub tz: Option<FixedOffset>,
}

impl Moment {
    pub fn new(date: NaiveDate, time: NaiveTime, tz: Option<FixedOffset>) -> Self {
        Self { date, time, tz }
    }

    pub fn from_datetime(dt: DateTime<FixedOffset>) -> Self {
        let local = dt.naive_local();
        Self { date: local.date(), time: local.time(), tz: Some(*dt.offset()) }
    }

    /// Instant `secs` seconds after 1970-01-01T00:00:00Z, in UTC.
    pub fn from_epoch_seconds(secs: f64) -> Result<Self, TemporalError> {
        if !secs.is_finite() {
            return Err(TemporalError::Overflow);
        }
        let whole = secs.floor();
        let nanos = ((secs - whole) * 1e9).round().clamp(0.0, 999_999_999.0);
        let whole = whole.to_i64().ok_or(TemporalError::Overflow)?;
        let nanos = nanos.to_u32().ok_or(TemporalError::Overflow)?;
        let dt = DateTime::from_timestamp(whole, nanos).ok_or(TemporalError::Overflow)?;
        let utc = FixedOffset::east_opt(0).ok_or(TemporalError::Overflow)?;
        Ok(Self::from_datetime(dt.with_timezone(&utc)))
    }

    /// Apply the reference values for components `ty` does not carry.
    #[must_use]
    pub fn normalized(self, ty: AtomicType) -> Self {
        let (y, m, d) = (self.date.year(), self.date.month(), self.date.day());
        let date = match ty {
            AtomicType::Time => Some(reference_date()),
            AtomicType::GYear => NaiveDate::from_ymd_opt(y, 1, 1),
            AtomicType::GYearMonth => NaiveDate::from_ymd_opt(y, m, 1),
            AtomicType::GMonth => NaiveDate::from_ymd_opt(REFERENCE_YEAR, m, 1),
            AtomicType::GMonthDay => NaiveDate::from_ymd_opt(REFERENCE_YEAR, m, d),
            AtomicType::GDay => NaiveDate::from_ymd_opt(REFERENCE_YEAR, 12, d),
            _ => Some(self.date),
        }
        .unwrap_or(self.date);
        let time = match ty {
            AtomicType::DateTime | AtomicType::Time => self.time,
            _ => NaiveTime::MIN,
        };
        Self { date, time, tz: self.tz }
    }

    pub fn naive(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.date, self.time)
    }

    /// The instant in UTC, using `implicit` when no timezone is attached.
    /// Fails with `Overflow` when the instant leaves chrono's date range.
    pub fn to_naive_utc(&self, implicit: FixedOffset) -> Result<NaiveDateTime, TemporalError> {
        let tz = self.tz.unwrap_or(implicit);
        TimeDelta::try_seconds(i64::from(tz.local_minus_utc()))
            .and_then(|offset| self.naive().checked_sub_signed(offset))
            .ok_or(TemporalError::Overflow)
    }

    /// Seconds since 0001-01-01T00:00:00Z plus the sub-second nanoseconds.
    ///
    /// Unlike [`Moment::to_naive_utc`] this is defined for every moment, so
    /// comparison and hashing never fail near the ends of the year range.
    pub fn utc_instant(&self, implicit: FixedOffset) -> (i64, u32) {
        let tz = self.tz.unwrap_or(implicit);
        let days = i64::from(self.date.num_days_from_ce());
        let local = days * 86_400 + i64::from(self.time.num_seconds_from_midnight());
        (local - i64::from(tz.local_minus_utc()), self.time.nanosecond())
    }

    /// Timezone adjustment as done by the `adjust-*-to-timezone` functions.
    ///
    /// With `target` absent the timezone is dropped and the local value kept.
    /// A value without timezone gets `target` attached. Otherwise the instant
    /// is preserved and re-expressed in `target`.
    pub fn adjust_timezone(self, ty: AtomicType, target: Option<FixedOffset>) -> Result<Self, TemporalError> {
        let adjusted = match (self.tz, target) {
            (_, None) => Self { tz: None, ..self },
            (None, Some(t)) => Self { tz: Some(t), ..self },
            (Some(cur), Some(t)) => {
                let delta = i64::from(t.local_minus_utc() - cur.local_minus_utc());
                let local = TimeDelta::try_seconds(delta)
                    .and_then(|d| self.naive().checked_add_signed(d))
                    .ok_or(TemporalError::Overflow)?;
                Self { date: local.date(), time: local.time(), tz: Some(t) }
            }
        };
        Ok(adjusted.normalized(ty))
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }
    pub fn month(&self) -> u32 {
        self.date.month()
    }
    pub fn day(&self) -> u32 {
        self.date.day()
    }
    pub fn hour(&self) -> u32 {
        self.time.hour()
    }
    pub fn minute(&self) -> u32 {
        self.time.minute()
    }
    /// Seconds including the fractional part.
    pub fn second(&self) -> Decimal {
        Decimal::from(self.time.second()) + Decimal::new(i64::from(self.time.nanosecond()), 9)
    }

    pub fn parse(ty: AtomicType, input: &str) -> Result<Self, TemporalError> {
        let s = input.trim_matches(is_xml_whitespace);
        let err = || lexical(ty, input);
        let mut sc = Scanner::new(s);
        let (date, time, rollover) = match ty {
            AtomicType::DateTime => {
                let year = scan_year(&mut sc).ok_or_else(err)?;
                if !sc.eat(b'-') {
                    return Err(err());
                }
                let (month, day) = scan_month_day(&mut sc).ok_or_else(err)?;
                if !sc.eat(b'T') {
                    return Err(err());
                }
                let (time, rollover) = scan_time(&mut sc).ok_or_else(err)?;
                (NaiveDate::from_ymd_opt(year, month, day).ok_or_else(err)?, time, rollover)
            }
            AtomicType::Date => {
                let year = scan_year(&mut sc).ok_or_else(err)?;
                if !sc.eat(b'-') {
                    return Err(err());
                }
                let (month, day) = scan_month_day(&mut sc).ok_or_else(err)?;
                (NaiveDate::from_ymd_opt(year, month, day).ok_or_else(err)?, NaiveTime::MIN, false)
            }
            AtomicType::Time => {
                let (time, _) = scan_time(&mut sc).ok_or_else(err)?;
                (reference_date(), time, false)
            }
            AtomicType::GYear => {
                let year = scan_year(&mut sc).ok_or_else(err)?;
                (NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(err)?, NaiveTime::MIN, false)
            }
            AtomicType::GYearMonth => {
                let year = scan_year(&mut sc).ok_or_else(err)?;
                if !sc.eat(b'-') {
                    return Err(err());
                }
                let month = sc.fixed(2).ok_or_else(err)?;
                (NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(err)?, NaiveTime::MIN, false)
            }
            AtomicType::GMonth => {
                if !(sc.eat(b'-') && sc.eat(b'-')) {
                    return Err(err());
                }
                let month = sc.fixed(2).ok_or_else(err)?;
                (NaiveDate::from_ymd_opt(REFERENCE_YEAR, month, 1).ok_or_else(err)?, NaiveTime::MIN, false)
            }
            AtomicType::GMonthDay => {
                if !(sc.eat(b'-') && sc.eat(b'-')) {
                    return Err(err());
                }
                let (month, day) = scan_month_day(&mut sc).ok_or_else(err)?;
                (NaiveDate::from_ymd_opt(REFERENCE_YEAR, month, day).ok_or_else(err)?, NaiveTime::MIN, false)
            }
            AtomicType::GDay => {
                if !(sc.eat(b'-') && sc.eat(b'-') && sc.eat(b'-')) {
                    return Err(err());
                }
                let day = sc.fixed(2).ok_or_else(err)?;
                (NaiveDate::from_ymd_opt(REFERENCE_YEAR, 12, day).ok_or_else(err)?, NaiveTime::MIN, false)
            }
            _ => return Err(err()),
        };
        let tz = scan_timezone(&mut sc).map_err(|()| err())?;
        if !sc.done() {
            return Err(err());
        }
        let date = if rollover { date.succ_opt().ok_or(TemporalError::Overflow)? } else { date };
        Ok(Self { date, time, tz }.normalized(ty))
    }

    /// Canonical lexical form for `ty`.
    pub fn format(&self, ty: AtomicType) -> String {
        let year = {
            let y = self.date.year();
            if y < 0 { format!("-{:04}", -y) } else { format!("{y:04}") }
        };
        let (m, d) = (self.date.month(), self.date.day());
        let mut out = match ty {
            AtomicType::DateTime => format!("{year}-{m:02}-{d:02}T{}", format_time(self.time)),
            AtomicType::Date => format!("{year}-{m:02}-{d:02}"),
            AtomicType::Time => format_time(self.time),
            AtomicType::GYear => year,
            AtomicType::GYearMonth => format!("{year}-{m:02}"),
            AtomicType::GMonth => format!("--{m:02}"),
            AtomicType::GMonthDay => format!("--{m:02}-{d:02}"),
            AtomicType::GDay => format!("---{d:02}"),
            _ => self.naive().to_string(),
        };
        if let Some(tz) = self.tz {
            out.push_str(&format_offset(tz));
        }
        out
    }
}

fn format_time(t: NaiveTime) -> String {
    let mut out = format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second());
    let nanos = t.nanosecond();
    if nanos > 0 {
        let frac = format!("{nanos:09}");
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out
}

/// Month and second components of a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Duration {
    months: i64,
    seconds: Decimal,
}

impl Duration {
    /// Fixed conversion factor used when casting between the year-month and
    /// day-time duration subtypes: a 365.25-day year over twelve months.
    pub const SECONDS_PER_MONTH: i64 = 2_629_800;

    pub fn new(months: i64, seconds: Decimal) -> Result<Self, TemporalError> {
        if (months < 0 && seconds.is_sign_positive() && !seconds.is_zero())
            || (months > 0 && seconds.is_sign_negative() && !seconds.is_zero())
        {
            return Err(TemporalError::DurationOverflow);
        }
        Ok(Self { months, seconds: seconds.normalize() })
    }

    pub fn from_months(months: i64) -> Self {
        Self { months, seconds: Decimal::ZERO }
    }

    pub fn from_seconds(seconds: Decimal) -> Self {
        Self { months: 0, seconds: seconds.normalize() }
    }

    pub fn months(&self) -> i64 {
        self.months
    }

    pub fn seconds(&self) -> Decimal {
        self.seconds
    }

    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.seconds.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.months < 0 || (self.seconds.is_sign_negative() && !self.seconds.is_zero())
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self { months: -self.months, seconds: -self.seconds }
    }

    /// Keep only the month component.
    #[must_use]
    pub fn year_month_part(self) -> Self {
        Self::from_months(self.months)
    }

    /// Keep only the second component.
    #[must_use]
    pub fn day_time_part(self) -> Self {
        Self::from_seconds(self.seconds)
    }

    /// Months converted with [`Self::SECONDS_PER_MONTH`], plus the second part.
    pub fn total_seconds(&self) -> Result<Decimal, TemporalError> {
        Decimal::from(self.months)
            .checked_mul(Decimal::from(Self::SECONDS_PER_MONTH))
            .and_then(|m| m.checked_add(self.seconds))
            .ok_or(TemporalError::DurationOverflow)
    }

    /// Whole months derived from the second part, truncated toward zero.
    pub fn months_from_seconds(&self) -> Result<i64, TemporalError> {
        (self.seconds / Decimal::from(Self::SECONDS_PER_MONTH))
            .trunc()
            .to_i64()
            .and_then(|m| m.checked_add(self.months))
            .ok_or(TemporalError::DurationOverflow)
    }

    pub fn checked_add(self, other: Self) -> Result<Self, TemporalError> {
        let months = self.months.checked_add(other.months).ok_or(TemporalError::DurationOverflow)?;
        let seconds = self.seconds.checked_add(other.seconds).ok_or(TemporalError::DurationOverflow)?;
        Self::new(months, seconds)
    }

    /// Divide by a count, rounding months half away from zero.
    pub fn checked_div(self, divisor: i64) -> Result<Self, TemporalError> {
        if divisor == 0 {
            return Err(TemporalError::DurationOverflow);
        }
        let months = (Decimal::from(self.months) / Decimal::from(divisor))
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or(TemporalError::DurationOverflow)?;
        let seconds = self.seconds.checked_div(Decimal::from(divisor)).ok_or(TemporalError::DurationOverflow)?;
        Self::new(months, seconds)
    }

    pub fn years_component(&self) -> i64 {
        self.months / 12
    }
    pub fn months_component(&self) -> i64 {
        self.months % 12
    }
    pub fn days_component(&self) -> i64 {
        (self.seconds / Decimal::from(SECONDS_PER_DAY)).trunc().to_i64().unwrap_or(0)
    }
    pub fn hours_component(&self) -> i64 {
        ((self.seconds % Decimal::from(SECONDS_PER_DAY)) / Decimal::from(3600)).trunc().to_i64().unwrap_or(0)
    }
    pub fn minutes_component(&self) -> i64 {
        ((self.seconds % Decimal::from(3600)) / Decimal::from(60)).trunc().to_i64().unwrap_or(0)
    }
    pub fn seconds_component(&self) -> Decimal {
        (self.seconds % Decimal::from(60)).normalize()
    }

    pub fn to_chrono(&self) -> Option<TimeDelta> {
        let total = self.total_seconds().ok()?;
        let whole = total.trunc().to_i64()?;
        let nanos = ((total - total.trunc()) * Decimal::from(1_000_000_000)).to_i64()?;
        TimeDelta::try_seconds(whole)?.checked_add(&TimeDelta::nanoseconds(nanos))
    }

    pub fn from_chrono(delta: TimeDelta) -> Self {
        let nanos = Decimal::from(delta.subsec_nanos()) / Decimal::from(1_000_000_000);
        Self::from_seconds(Decimal::from(delta.num_seconds()) + nanos)
    }

    pub fn parse(ty: AtomicType, input: &str) -> Result<Self, TemporalError> {
        let err = || lexical(ty, input);
        let s = input.trim_matches(is_xml_whitespace);
        let mut sc = Scanner::new(s);
        let negative = sc.eat(b'-');
        if !sc.eat(b'P') {
            return Err(err());
        }
        // Designator order: Y M D, then after T: H M S.
        let mut stage = 0u8;
        let mut in_time = false;
        let mut any = false;
        let mut time_any = false;
        let mut saw_year_month = false;
        let (mut years, mut months, mut days, mut hours, mut minutes) = (0i64, 0i64, 0i64, 0i64, 0i64);
        let mut secs = Decimal::ZERO;
        while !sc.done() {
            if sc.eat(b'T') {
                if in_time {
                    return Err(err());
                }
                in_time = true;
                stage = stage.max(3);
                continue;
            }
            let int_run = sc.digit_run();
            let frac_run = if sc.eat(b'.') { Some(sc.digit_run()) } else { None };
            if int_run.is_empty() && frac_run.is_none_or(<[u8]>::is_empty) {
                return Err(err());
            }
            let designator = sc.peek().ok_or_else(err)?;
            sc.pos += 1;
            let slot = match (designator, in_time) {
                (b'Y', false) => 0,
                (b'M', false) => 1,
                (b'D', false) => 2,
                (b'H', true) => 3,
                (b'M', true) => 4,
                (b'S', true) => 5,
                _ => return Err(err()),
            };
            if slot < stage || (slot != 5 && frac_run.is_some()) {
                return Err(err());
            }
            stage = slot + 1;
            any = true;
            time_any |= in_time;
            saw_year_month |= slot < 2;
            let whole = if int_run.is_empty() { 0 } else { digits_value(int_run).ok_or(TemporalError::DurationOverflow)? };
            match slot {
                0 => years = whole,
                1 => months = whole,
                2 => days = whole,
                3 => hours = whole,
                4 => minutes = whole,
                _ => {
                    let text = format!(
                        "{}.{}",
                        if int_run.is_empty() { "0" } else { core::str::from_utf8(int_run).unwrap_or("0") },
                        frac_run.map_or("0", |f| core::str::from_utf8(f).unwrap_or("0"))
                    );
                    secs = text.parse::<Decimal>().map_err(|_| TemporalError::DurationOverflow)?;
                }
            }
        }
        if !any || (in_time && !time_any) {
            return Err(err());
        }
        let saw_day_time = in_time || stage > 2;
        match ty {
            AtomicType::YearMonthDuration if saw_day_time => return Err(err()),
            AtomicType::DayTimeDuration if saw_year_month => return Err(err()),
            _ => {}
        }
        let total_months = years
            .checked_mul(12)
            .and_then(|y| y.checked_add(months))
            .ok_or(TemporalError::DurationOverflow)?;
        let whole_secs = days
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|d| d.checked_add(hours.checked_mul(3600)?))
            .and_then(|d| d.checked_add(minutes.checked_mul(60)?))
            .ok_or(TemporalError::DurationOverflow)?;
        let total_secs = Decimal::from(whole_secs).checked_add(secs).ok_or(TemporalError::DurationOverflow)?;
        let d = Self { months: total_months, seconds: total_secs.normalize() };
        Ok(if negative { d.negate() } else { d })
    }

    /// Canonical lexical form for `ty`.
    pub fn format(&self, ty: AtomicType) -> String {
        let mut out = String::new();
        if self.is_negative() {
            out.push('-');
        }
        out.push('P');
        let months = self.months.unsigned_abs();
        let seconds = self.seconds.abs();
        let (years, rem_months) = (months / 12, months % 12);
        let whole = seconds.trunc().to_u64().unwrap_or(0);
        let frac = seconds - seconds.trunc();
        let days = whole / 86_400;
        let hours = (whole % 86_400) / 3600;
        let minutes = (whole % 3600) / 60;
        let secs = (Decimal::from(whole % 60) + frac).normalize();
        let show_ym = ty != AtomicType::DayTimeDuration;
        let show_dt = ty != AtomicType::YearMonthDuration;
        let mut wrote = false;
        if show_ym {
            if years > 0 {
                out.push_str(&format!("{years}Y"));
                wrote = true;
            }
            if rem_months > 0 {
                out.push_str(&format!("{rem_months}M"));
                wrote = true;
            }
        }
        if show_dt {
            if days > 0 {
                out.push_str(&format!("{days}D"));
                wrote = true;
            }
            if hours > 0 || minutes > 0 || !secs.is_zero() {
                out.push('T');
                if hours > 0 {
                    out.push_str(&format!("{hours}H"));
                }
                if minutes > 0 {
                    out.push_str(&format!("{minutes}M"));
                }
                if !secs.is_zero() {
                    out.push_str(&format!("{secs}S"));
                }
                wrote = true;
            }
        }
        if !wrote {
            return if ty == AtomicType::YearMonthDuration { "P0M" } else { "PT0S" }.to_string();
        }
        out
    }
}

impl TryFrom<f64> for Duration {
    type Error = TemporalError;

    /// Seconds as a day-time duration.
    fn try_from(secs: f64) -> Result<Self, Self::Error> {
        Decimal::from_f64(secs).map(Self::from_seconds).ok_or(TemporalError::DurationOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AtomicType::DateTime, "2024-02-29T13:45:10.250+02:00", "2024-02-29T13:45:10.25+02:00")]
    #[case(AtomicType::DateTime, "2024-12-31T24:00:00Z", "2025-01-01T00:00:00Z")]
    #[case(AtomicType::Date, "2001-01-05-05:00", "2001-01-05-05:00")]
    #[case(AtomicType::Time, "23:59:59", "23:59:59")]
    #[case(AtomicType::GYear, "-0044", "-0044")]
    #[case(AtomicType::GYearMonth, "1999-07Z", "1999-07Z")]
    #[case(AtomicType::GMonth, "--11", "--11")]
    #[case(AtomicType::GMonthDay, "--02-29", "--02-29")]
    #[case(AtomicType::GDay, "---31+14:00", "---31+14:00")]
    fn moment_round_trip(#[case] ty: AtomicType, #[case] input: &str, #[case] canonical: &str) {
        let m = Moment::parse(ty, input).unwrap();
        assert_eq!(m.format(ty), canonical);
    }

    #[rstest]
    #[case(AtomicType::Date, "2023-02-29")]
    #[case(AtomicType::Date, "99-01-01")]
    #[case(AtomicType::DateTime, "2023-01-01T25:00:00")]
    #[case(AtomicType::Time, "12:00:00+15:00")]
    #[case(AtomicType::GDay, "--31")]
    #[case(AtomicType::GYear, "0000")]
    fn moment_rejects(#[case] ty: AtomicType, #[case] input: &str) {
        assert!(Moment::parse(ty, input).is_err());
    }

    #[rstest]
    #[case(AtomicType::Duration, "P1Y2M3DT4H5M6.5S", "P1Y2M3DT4H5M6.5S")]
    #[case(AtomicType::Duration, "-P0D", "PT0S")]
    #[case(AtomicType::YearMonthDuration, "P14M", "P1Y2M")]
    #[case(AtomicType::YearMonthDuration, "P0Y", "P0M")]
    #[case(AtomicType::DayTimeDuration, "PT36H", "P1DT12H")]
    #[case(AtomicType::DayTimeDuration, "-PT0.5S", "-PT0.5S")]
    fn duration_round_trip(#[case] ty: AtomicType, #[case] input: &str, #[case] canonical: &str) {
        assert_eq!(Duration::parse(ty, input).unwrap().format(ty), canonical);
    }

    #[rstest]
    #[case(AtomicType::Duration, "P")]
    #[case(AtomicType::Duration, "P1DT")]
    #[case(AtomicType::Duration, "PT1D")]
    #[case(AtomicType::Duration, "P1M1Y")]
    #[case(AtomicType::YearMonthDuration, "P1D")]
    #[case(AtomicType::DayTimeDuration, "P1Y")]
    #[case(AtomicType::Duration, "P1.5Y")]
    fn duration_rejects(#[case] ty: AtomicType, #[case] input: &str) {
        assert!(Duration::parse(ty, input).is_err());
    }

    #[test]
    fn adjust_preserves_instant() {
        let m = Moment::parse(AtomicType::DateTime, "2002-03-07T10:00:00-05:00").unwrap();
        let tz = offset_from_minutes(-600).unwrap();
        let adjusted = m.adjust_timezone(AtomicType::DateTime, Some(tz)).unwrap();
        assert_eq!(adjusted.format(AtomicType::DateTime), "2002-03-07T05:00:00-10:00");
        let utc = offset_from_minutes(0).unwrap();
        assert_eq!(adjusted.to_naive_utc(utc), m.to_naive_utc(utc));
        assert_eq!(adjusted.utc_instant(utc), m.utc_instant(utc));
    }

    #[test]
    fn instants_near_the_year_limit_do_not_overflow() {
        let last = NaiveDate::MAX.year();
        let m = Moment::parse(AtomicType::DateTime, &format!("{last}-12-31T23:00:00-14:00")).unwrap();
        let utc = offset_from_minutes(0).unwrap();
        assert_eq!(m.to_naive_utc(utc), Err(TemporalError::Overflow));
        let (secs, _) = m.utc_instant(utc);
        assert!(secs > Moment::parse(AtomicType::DateTime, &format!("{last}-12-31T23:00:00Z")).unwrap().utc_instant(utc).0);
        let east = offset_from_minutes(14 * 60).unwrap();
        assert_eq!(m.adjust_timezone(AtomicType::DateTime, Some(east)), Err(TemporalError::Overflow));
    }

    #[test]
    fn epoch_seconds() {
        let m = Moment::from_epoch_seconds(86_400.5).unwrap();
        assert_eq!(m.format(AtomicType::DateTime), "1970-01-02T00:00:00.5Z");
    }
}
