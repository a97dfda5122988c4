//! Type-directed casting.
//!
//! [`AtomicType::cast`] switches on the target type and, inside each branch,
//! on the kind of the source value. Each target lists the sources it accepts;
//! every other combination is `XPTY0004`. Lexical failures are `FORG0001`.
use std::collections::HashMap;

use base64::Engine as _;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::engine::runtime::{Error, ErrorCode};
use crate::xdm::lexical::{
    collapse_xml_whitespace, decode_hex, is_name, is_ncname, is_nmtoken, is_valid_language, is_xml_whitespace,
    parse_boolean, parse_decimal, parse_double, parse_float, parse_integer, replace_xml_whitespace, split_qname,
};
use crate::xdm::temporal::{Duration, Moment};
use crate::xdm::value::{Numeric, QNameValue};
use crate::xdm::{AtomicType, TypeFamily, XdmAtomicValue};

/// Settings a cast may consult.
#[derive(Debug, Clone, Copy)]
pub struct CastContext<'a> {
    /// Reject the non-standard duration→numeric and numeric→moment casts.
    pub strict: bool,
    /// Prefix bindings for casts to `xs:QName`. The empty prefix is the
    /// default element namespace.
    pub namespaces: Option<&'a HashMap<String, String>>,
}

impl<'a> CastContext<'a> {
    pub fn new(strict: bool, namespaces: Option<&'a HashMap<String, String>>) -> Self {
        Self { strict, namespaces }
    }

    fn resolve_prefix(&self, prefix: &str) -> Option<&'a str> {
        if prefix == "xml" {
            return Some(crate::consts::XML_URI);
        }
        self.namespaces.and_then(|m| m.get(prefix)).map(String::as_str)
    }
}

impl Default for CastContext<'_> {
    fn default() -> Self {
        Self { strict: true, namespaces: None }
    }
}

fn cannot_cast(value: &XdmAtomicValue, target: AtomicType) -> Error {
    Error::from_code(ErrorCode::XPTY0004, format!("cannot cast {} to {target}", value.atomic_type()))
}

fn invalid_lexical(s: &str, target: AtomicType) -> Error {
    Error::from_code(ErrorCode::FORG0001, format!("invalid lexical form for {target}: '{s}'"))
}

fn non_strict_only(value: &XdmAtomicValue, target: AtomicType) -> Error {
    Error::from_code(
        ErrorCode::XPTY0004,
        format!("cannot cast {} to {target} under strict observance", value.atomic_type()),
    )
}

impl AtomicType {
    /// Cast `value` to this type.
    pub fn cast(self, value: &XdmAtomicValue, ctx: &CastContext<'_>) -> Result<XdmAtomicValue, Error> {
        let source = value.atomic_type();
        if source == self || self == AtomicType::AnyAtomic {
            return Ok(value.clone());
        }
        match self.family() {
            TypeFamily::Any => Ok(value.clone()),
            TypeFamily::Untyped => Ok(XdmAtomicValue::untyped(value.as_string())),
            TypeFamily::String => derived_string(self, &value.as_string()),
            TypeFamily::AnyUri => match value.string_like() {
                Some(s) => Ok(XdmAtomicValue::any_uri(collapse_xml_whitespace(s))),
                None => Err(cannot_cast(value, self)),
            },
            TypeFamily::Boolean => cast_to_boolean(value),
            TypeFamily::Decimal => cast_to_decimal(value, ctx),
            TypeFamily::Integer => cast_to_integer(self, value, ctx),
            TypeFamily::Float | TypeFamily::Double => cast_to_floating(self, value, ctx),
            TypeFamily::Duration => cast_to_duration(self, value),
            TypeFamily::Temporal => cast_to_moment(self, value, ctx),
            TypeFamily::QName => cast_to_qname(value, ctx),
            TypeFamily::Binary => cast_to_binary(self, value),
            TypeFamily::HostObject => Err(cannot_cast(value, self)),
        }
    }

    /// Whether [`AtomicType::cast`] would succeed.
    pub fn castable(self, value: &XdmAtomicValue, ctx: &CastContext<'_>) -> bool {
        self.cast(value, ctx).is_ok()
    }
}

/// Build a value of a string-derived type, applying its whitespace facet and
/// lexical constraint.
pub fn derived_string(ty: AtomicType, s: &str) -> Result<XdmAtomicValue, Error> {
    let (normalized, valid) = match ty {
        AtomicType::String => (s.to_string(), true),
        AtomicType::NormalizedString => (replace_xml_whitespace(s), true),
        AtomicType::Token => (collapse_xml_whitespace(s), true),
        AtomicType::Language => {
            let t = collapse_xml_whitespace(s);
            let ok = is_valid_language(&t);
            (t, ok)
        }
        AtomicType::NmToken => {
            let t = collapse_xml_whitespace(s);
            let ok = is_nmtoken(&t);
            (t, ok)
        }
        AtomicType::Name => {
            let t = collapse_xml_whitespace(s);
            let ok = is_name(&t);
            (t, ok)
        }
        AtomicType::NcName | AtomicType::Id | AtomicType::IdRef | AtomicType::Entity => {
            let t = collapse_xml_whitespace(s);
            let ok = is_ncname(&t);
            (t, ok)
        }
        other => return Err(Error::from_code(ErrorCode::XPTY0004, format!("{other} is not a string type"))),
    };
    if !valid {
        return Err(invalid_lexical(s, ty));
    }
    Ok(XdmAtomicValue::String { ty, value: normalized.into() })
}

fn cast_to_boolean(value: &XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
    if let Some(s) = value.string_like().filter(|_| !matches!(value, XdmAtomicValue::AnyUri(_))) {
        return parse_boolean(s).map(XdmAtomicValue::Boolean).ok_or_else(|| invalid_lexical(s, AtomicType::Boolean));
    }
    match value.numeric() {
        Some(Numeric::Integer(i)) => Ok(XdmAtomicValue::Boolean(i != 0)),
        Some(Numeric::Decimal(d)) => Ok(XdmAtomicValue::Boolean(!d.is_zero())),
        Some(n) => {
            let f = n.to_f64();
            Ok(XdmAtomicValue::Boolean(f != 0.0 && !f.is_nan()))
        }
        None => Err(cannot_cast(value, AtomicType::Boolean)),
    }
}

/// Non-strict duration reading: year-month durations as months, others as
/// total seconds.
fn duration_as_number(ty: AtomicType, d: &Duration) -> Result<Numeric, Error> {
    if ty == AtomicType::YearMonthDuration {
        return Ok(Numeric::Integer(i128::from(d.months())));
    }
    Ok(Numeric::Decimal(d.total_seconds()?))
}

fn cast_to_decimal(value: &XdmAtomicValue, ctx: &CastContext<'_>) -> Result<XdmAtomicValue, Error> {
    let target = AtomicType::Decimal;
    match value {
        XdmAtomicValue::UntypedAtomic(s) | XdmAtomicValue::String { value: s, .. } => {
            parse_decimal(s).map(XdmAtomicValue::decimal).ok_or_else(|| invalid_lexical(s, target))
        }
        XdmAtomicValue::Boolean(b) => Ok(XdmAtomicValue::decimal(Decimal::from(u8::from(*b)))),
        XdmAtomicValue::Duration { ty, value: d } if !ctx.strict => {
            let n = duration_as_number(*ty, d)?;
            Ok(XdmAtomicValue::decimal(n.into_value().as_decimal()?))
        }
        XdmAtomicValue::Duration { .. } => Err(non_strict_only(value, target)),
        _ if value.numeric().is_some() => Ok(XdmAtomicValue::decimal(value.as_decimal()?)),
        _ => Err(cannot_cast(value, target)),
    }
}

fn check_bounds(ty: AtomicType, v: i128) -> Result<XdmAtomicValue, Error> {
    match ty.bounds() {
        Some((min, max)) if !(min..=max).contains(&v) => {
            Err(Error::from_code(ErrorCode::FORG0001, format!("value {v} out of range for {ty}")))
        }
        _ => Ok(XdmAtomicValue::Integer { ty, value: v }),
    }
}

fn cast_to_integer(ty: AtomicType, value: &XdmAtomicValue, ctx: &CastContext<'_>) -> Result<XdmAtomicValue, Error> {
    let v = match value {
        XdmAtomicValue::UntypedAtomic(s) | XdmAtomicValue::String { value: s, .. } => {
            parse_integer(s).ok_or_else(|| invalid_lexical(s, ty))?
        }
        XdmAtomicValue::Boolean(b) => i128::from(*b),
        XdmAtomicValue::Duration { ty: dty, value: d } if !ctx.strict => {
            duration_as_number(*dty, d)?.into_value().as_integer()?
        }
        XdmAtomicValue::Duration { .. } => return Err(non_strict_only(value, ty)),
        _ if value.numeric().is_some() => value.as_integer()?,
        _ => return Err(cannot_cast(value, ty)),
    };
    check_bounds(ty, v)
}

fn cast_to_floating(ty: AtomicType, value: &XdmAtomicValue, ctx: &CastContext<'_>) -> Result<XdmAtomicValue, Error> {
    let double = ty == AtomicType::Double;
    let n = match value {
        XdmAtomicValue::UntypedAtomic(s) | XdmAtomicValue::String { value: s, .. } => {
            return if double {
                parse_double(s).map(XdmAtomicValue::Double).ok_or_else(|| invalid_lexical(s, ty))
            } else {
                parse_float(s).map(XdmAtomicValue::Float).ok_or_else(|| invalid_lexical(s, ty))
            };
        }
        XdmAtomicValue::Boolean(b) => Numeric::Integer(i128::from(*b)),
        XdmAtomicValue::Duration { ty: dty, value: d } if !ctx.strict => duration_as_number(*dty, d)?,
        XdmAtomicValue::Duration { .. } => return Err(non_strict_only(value, ty)),
        _ => value.numeric().ok_or_else(|| cannot_cast(value, ty))?,
    };
    Ok(if double { XdmAtomicValue::Double(n.to_f64()) } else { XdmAtomicValue::Float(n.to_f32()) })
}

fn cast_to_duration(ty: AtomicType, value: &XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
    match value {
        XdmAtomicValue::UntypedAtomic(s) | XdmAtomicValue::String { value: s, .. } => {
            Ok(XdmAtomicValue::duration(ty, Duration::parse(ty, s)?))
        }
        XdmAtomicValue::Duration { ty: source, value: d } => {
            let converted = match (*source, ty) {
                (AtomicType::YearMonthDuration, AtomicType::DayTimeDuration) => {
                    Duration::from_seconds(d.total_seconds()?)
                }
                (AtomicType::DayTimeDuration, AtomicType::YearMonthDuration) => {
                    Duration::from_months(d.months_from_seconds()?)
                }
                _ => *d,
            };
            Ok(XdmAtomicValue::duration(ty, converted))
        }
        _ => Err(cannot_cast(value, ty)),
    }
}

fn moment_source_allowed(source: AtomicType, target: AtomicType) -> bool {
    match target {
        AtomicType::DateTime => matches!(source, AtomicType::Date),
        AtomicType::Date | AtomicType::Time => source == AtomicType::DateTime,
        AtomicType::GYear
        | AtomicType::GYearMonth
        | AtomicType::GMonth
        | AtomicType::GMonthDay
        | AtomicType::GDay => matches!(source, AtomicType::DateTime | AtomicType::Date),
        _ => false,
    }
}

fn cast_to_moment(ty: AtomicType, value: &XdmAtomicValue, ctx: &CastContext<'_>) -> Result<XdmAtomicValue, Error> {
    match value {
        XdmAtomicValue::UntypedAtomic(s) | XdmAtomicValue::String { value: s, .. } => {
            Ok(XdmAtomicValue::moment(ty, Moment::parse(ty, s)?))
        }
        XdmAtomicValue::Moment { ty: source, value: m } if moment_source_allowed(*source, ty) => {
            Ok(XdmAtomicValue::moment(ty, *m))
        }
        _ => match value.numeric() {
            Some(n) if !ctx.strict => Ok(XdmAtomicValue::moment(ty, Moment::from_epoch_seconds(n.to_f64())?)),
            Some(_) => Err(non_strict_only(value, ty)),
            None => Err(cannot_cast(value, ty)),
        },
    }
}

fn cast_to_qname(value: &XdmAtomicValue, ctx: &CastContext<'_>) -> Result<XdmAtomicValue, Error> {
    let XdmAtomicValue::String { value: raw, .. } = value else {
        return Err(cannot_cast(value, AtomicType::QName));
    };
    let s = raw.trim_matches(is_xml_whitespace);
    let (prefix, local) = split_qname(s).ok_or_else(|| invalid_lexical(s, AtomicType::QName))?;
    let ns_uri = match prefix {
        Some(p) => Some(ctx.resolve_prefix(p).ok_or_else(|| {
            Error::from_code(ErrorCode::FONS0004, format!("no namespace binding for prefix '{p}'"))
        })?),
        None => ctx.resolve_prefix(""),
    };
    Ok(XdmAtomicValue::QName(QNameValue::new(prefix, ns_uri, local)))
}

fn cast_to_binary(ty: AtomicType, value: &XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
    match value {
        XdmAtomicValue::UntypedAtomic(s) | XdmAtomicValue::String { value: s, .. } => {
            let bytes = if ty == AtomicType::HexBinary {
                decode_hex(s.trim_matches(is_xml_whitespace))
            } else {
                let compact: String = s.chars().filter(|c| !is_xml_whitespace(*c)).collect();
                base64::engine::general_purpose::STANDARD.decode(compact).ok()
            };
            bytes.map(|b| XdmAtomicValue::binary(ty, b)).ok_or_else(|| invalid_lexical(s, ty))
        }
        XdmAtomicValue::Binary { bytes, .. } => Ok(XdmAtomicValue::Binary { ty, bytes: bytes.clone() }),
        _ => Err(cannot_cast(value, ty)),
    }
}

/// Numeric value of a string, as used by `fn:number` and by untyped operands of
/// arithmetic: a double, NaN when unparsable.
pub fn number_from_str(s: &str) -> f64 {
    parse_double(s).unwrap_or(f64::NAN)
}

/// Decimal view of a double for the decimal accumulator. NaN and infinities have
/// no decimal representation.
pub(crate) fn decimal_from_f64(f: f64) -> Result<Decimal, Error> {
    if !f.is_finite() {
        return Err(Error::from_code(ErrorCode::FOCA0002, format!("{f} has no xs:decimal representation")));
    }
    Decimal::from_f64(f).ok_or_else(|| Error::from_code(ErrorCode::FOCA0001, format!("{f} exceeds xs:decimal range")))
}

/// Exact i64 view of an integer value, for host conversions.
pub(crate) fn integer_to_i64(v: i128) -> Result<i64, Error> {
    v.to_i64().ok_or_else(|| Error::from_code(ErrorCode::FOCA0003, format!("{v} does not fit a 64-bit integer")))
}
