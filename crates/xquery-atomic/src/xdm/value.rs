//! Scalar values.
//!
//! One variant per payload kind. Variants shared by a whole type family
//! (strings, integers, durations, moments, binaries) carry the concrete
//! [`AtomicType`] next to the payload. The `new_*`/named constructors establish
//! the payload invariants: integers within the subtype's bounds, decimals with
//! scale of at least one, moments normalized for their type.
use core::fmt;
use core::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;
use std::sync::Arc;

use base64::Engine as _;
use compact_str::CompactString;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use string_cache::DefaultAtom;

use crate::engine::runtime::{Error, ErrorCode};
use crate::interop::HostObject;
use crate::xdm::lexical::{canonical_decimal, encode_hex_upper, format_decimal, format_double, format_float};
use crate::xdm::temporal::{Duration, Moment};
use crate::xdm::{AtomicType, ExpandedName};

/// Value of an `xs:QName`. Name parts are interned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QNameValue {
    pub prefix: Option<CompactString>,
    pub ns_uri: Option<DefaultAtom>,
    pub local: DefaultAtom,
}

impl QNameValue {
    pub fn new(prefix: Option<&str>, ns_uri: Option<&str>, local: &str) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()).map(CompactString::from),
            ns_uri: ns_uri.filter(|u| !u.is_empty()).map(DefaultAtom::from),
            local: DefaultAtom::from(local),
        }
    }

    /// Equality on the expanded name; the prefix does not take part.
    pub fn same_name(&self, other: &Self) -> bool {
        self.ns_uri == other.ns_uri && self.local == other.local
    }

    pub fn expanded(&self) -> ExpandedName {
        ExpandedName::new(self.ns_uri.as_ref().map(ToString::to_string), &*self.local)
    }

    /// Lexical form `prefix:local` or `local`.
    pub fn lexical(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local),
            None => self.local.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XdmAtomicValue {
    UntypedAtomic(CompactString),
    /// `xs:string` or one of its derived types.
    String { ty: AtomicType, value: CompactString },
    AnyUri(CompactString),
    Boolean(bool),
    /// `xs:integer` or one of its derived types.
    Integer { ty: AtomicType, value: i128 },
    /// Any scale; rendering, equality and hashing all normalize first.
    Decimal(Decimal),
    Float(f32),
    Double(f64),
    Duration { ty: AtomicType, value: Duration },
    Moment { ty: AtomicType, value: Moment },
    QName(QNameValue),
    Binary { ty: AtomicType, bytes: Arc<[u8]> },
    HostObject(HostObject),
}

/// Numeric view of a value, the operand form for promotion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i128),
    Decimal(Decimal),
    Float(f32),
    Double(f64),
}

impl Numeric {
    /// Promotion rank: integer < decimal < float < double.
    pub fn rank(self) -> u8 {
        match self {
            Numeric::Integer(_) => 0,
            Numeric::Decimal(_) => 1,
            Numeric::Float(_) => 2,
            Numeric::Double(_) => 3,
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Numeric::Integer(i) => i.to_f64().unwrap_or(f64::NAN),
            Numeric::Decimal(d) => d.normalize().to_f64().unwrap_or(f64::NAN),
            Numeric::Float(f) => f64::from(f),
            Numeric::Double(d) => d,
        }
    }

    /// Float image, always rounded through [`Numeric::to_f64`] so that two
    /// numbers with the same double image share the same float image.
    pub fn to_f32(self) -> f32 {
        match self {
            Numeric::Float(f) => f,
            #[allow(clippy::cast_possible_truncation)]
            n => n.to_f64() as f32,
        }
    }

    pub fn is_nan(self) -> bool {
        match self {
            Numeric::Float(f) => f.is_nan(),
            Numeric::Double(d) => d.is_nan(),
            _ => false,
        }
    }

    /// Re-express the number at `rank`. Promoting an integer too large for
    /// a decimal yields `None`.
    pub fn promote_to(self, rank: u8) -> Option<Numeric> {
        Some(match (rank, self) {
            (_, n) if n.rank() >= rank => n,
            (1, Numeric::Integer(i)) => Numeric::Decimal(Decimal::from_i128(i)?),
            (2, n) => Numeric::Float(n.to_f32()),
            (_, n) => Numeric::Double(n.to_f64()),
        })
    }

    pub fn into_value(self) -> XdmAtomicValue {
        match self {
            Numeric::Integer(i) => XdmAtomicValue::integer(i),
            Numeric::Decimal(d) => XdmAtomicValue::decimal(d),
            Numeric::Float(f) => XdmAtomicValue::Float(f),
            Numeric::Double(d) => XdmAtomicValue::Double(d),
        }
    }
}

/// Hash a number through its `f64` image so that equal values of different
/// numeric types land in the same bucket. Zero signs and NaN payloads collapse.
pub fn hash_as_double(v: f64) -> u64 {
    let mut h = DefaultHasher::new();
    if v.is_nan() {
        u64::MAX.hash(&mut h);
    } else if v == 0.0 {
        0u64.hash(&mut h);
    } else {
        v.to_bits().hash(&mut h);
    }
    h.finish()
}

fn wrong_accessor(value: &XdmAtomicValue, what: &str) -> Error {
    Error::from_code(ErrorCode::XPTY0004, format!("cannot read {} as {what}", value.atomic_type()))
}

impl XdmAtomicValue {
    pub fn untyped(s: impl Into<CompactString>) -> Self {
        XdmAtomicValue::UntypedAtomic(s.into())
    }

    pub fn string(s: impl Into<CompactString>) -> Self {
        XdmAtomicValue::String { ty: AtomicType::String, value: s.into() }
    }

    pub fn any_uri(s: impl Into<CompactString>) -> Self {
        XdmAtomicValue::AnyUri(s.into())
    }

    pub fn boolean(b: bool) -> Self {
        XdmAtomicValue::Boolean(b)
    }

    pub fn integer(v: i128) -> Self {
        XdmAtomicValue::Integer { ty: AtomicType::Integer, value: v }
    }

    /// Integer of a bounded subtype; fails with `FORG0001` outside its range.
    pub fn typed_integer(ty: AtomicType, value: i128) -> Result<Self, Error> {
        if !ty.is_integer() {
            return Err(Error::from_code(ErrorCode::XPTY0004, format!("{ty} is not an integer type")));
        }
        if let Some((min, max)) = ty.bounds()
            && !(min..=max).contains(&value)
        {
            return Err(Error::from_code(ErrorCode::FORG0001, format!("value {value} out of range for {ty}")));
        }
        Ok(XdmAtomicValue::Integer { ty, value })
    }

    /// Decimal in stored form (scale of at least one).
    pub fn decimal(d: Decimal) -> Self {
        XdmAtomicValue::Decimal(canonical_decimal(d))
    }

    pub fn float(f: f32) -> Self {
        XdmAtomicValue::Float(f)
    }

    pub fn double(d: f64) -> Self {
        XdmAtomicValue::Double(d)
    }

    pub fn moment(ty: AtomicType, m: Moment) -> Self {
        XdmAtomicValue::Moment { ty, value: m.normalized(ty) }
    }

    pub fn duration(ty: AtomicType, d: Duration) -> Self {
        let value = match ty {
            AtomicType::YearMonthDuration => d.year_month_part(),
            AtomicType::DayTimeDuration => d.day_time_part(),
            _ => d,
        };
        XdmAtomicValue::Duration { ty, value }
    }

    pub fn year_month_duration(months: i64) -> Self {
        Self::duration(AtomicType::YearMonthDuration, Duration::from_months(months))
    }

    pub fn day_time_duration(seconds: Decimal) -> Self {
        Self::duration(AtomicType::DayTimeDuration, Duration::from_seconds(seconds))
    }

    pub fn qname(q: QNameValue) -> Self {
        XdmAtomicValue::QName(q)
    }

    pub fn binary(ty: AtomicType, bytes: impl Into<Arc<[u8]>>) -> Self {
        XdmAtomicValue::Binary { ty, bytes: bytes.into() }
    }

    pub fn atomic_type(&self) -> AtomicType {
        match self {
            XdmAtomicValue::UntypedAtomic(_) => AtomicType::UntypedAtomic,
            XdmAtomicValue::String { ty, .. }
            | XdmAtomicValue::Integer { ty, .. }
            | XdmAtomicValue::Duration { ty, .. }
            | XdmAtomicValue::Moment { ty, .. }
            | XdmAtomicValue::Binary { ty, .. } => *ty,
            XdmAtomicValue::AnyUri(_) => AtomicType::AnyUri,
            XdmAtomicValue::Boolean(_) => AtomicType::Boolean,
            XdmAtomicValue::Decimal(_) => AtomicType::Decimal,
            XdmAtomicValue::Float(_) => AtomicType::Float,
            XdmAtomicValue::Double(_) => AtomicType::Double,
            XdmAtomicValue::QName(_) => AtomicType::QName,
            XdmAtomicValue::HostObject(_) => AtomicType::HostObject,
        }
    }

    /// Text of string-like values: untypedAtomic, the string family and anyURI.
    pub fn string_like(&self) -> Option<&str> {
        match self {
            XdmAtomicValue::UntypedAtomic(s) | XdmAtomicValue::AnyUri(s) | XdmAtomicValue::String { value: s, .. } => {
                Some(s.as_str())
            }
            _ => None,
        }
    }

    pub fn numeric(&self) -> Option<Numeric> {
        match self {
            XdmAtomicValue::Integer { value, .. } => Some(Numeric::Integer(*value)),
            XdmAtomicValue::Decimal(d) => Some(Numeric::Decimal(*d)),
            XdmAtomicValue::Float(f) => Some(Numeric::Float(*f)),
            XdmAtomicValue::Double(d) => Some(Numeric::Double(*d)),
            _ => None,
        }
    }

    pub fn is_nan(&self) -> bool {
        self.numeric().is_some_and(Numeric::is_nan)
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self, XdmAtomicValue::UntypedAtomic(_))
    }

    /// Canonical lexical form (the `xs:string` cast of the value).
    pub fn as_string(&self) -> String {
        match self {
            XdmAtomicValue::UntypedAtomic(s) | XdmAtomicValue::AnyUri(s) | XdmAtomicValue::String { value: s, .. } => {
                s.to_string()
            }
            XdmAtomicValue::Boolean(b) => b.to_string(),
            XdmAtomicValue::Integer { value, .. } => value.to_string(),
            XdmAtomicValue::Decimal(d) => format_decimal(d),
            XdmAtomicValue::Float(f) => format_float(*f),
            XdmAtomicValue::Double(d) => format_double(*d),
            XdmAtomicValue::Duration { ty, value } => value.format(*ty),
            XdmAtomicValue::Moment { ty, value } => value.format(*ty),
            XdmAtomicValue::QName(q) => q.lexical(),
            XdmAtomicValue::Binary { ty: AtomicType::HexBinary, bytes } => encode_hex_upper(bytes),
            XdmAtomicValue::Binary { bytes, .. } => base64::engine::general_purpose::STANDARD.encode(bytes),
            XdmAtomicValue::HostObject(o) => o.to_string(),
        }
    }

    /// Integer view. Other numerics truncate toward zero; NaN and infinities
    /// raise `FOCA0002`.
    pub fn as_integer(&self) -> Result<i128, Error> {
        let overflow = || Error::from_code(ErrorCode::FOCA0003, format!("{self} does not fit xs:integer"));
        match self.numeric() {
            Some(Numeric::Integer(i)) => Ok(i),
            Some(Numeric::Decimal(d)) => d.trunc().to_i128().ok_or_else(overflow),
            Some(n) => {
                let f = n.to_f64();
                if !f.is_finite() {
                    return Err(Error::from_code(ErrorCode::FOCA0002, format!("cannot convert {self} to xs:integer")));
                }
                f.trunc().to_i128().ok_or_else(overflow)
            }
            None => Err(wrong_accessor(self, "integer")),
        }
    }

    pub fn as_double(&self) -> Result<f64, Error> {
        self.numeric().map(Numeric::to_f64).ok_or_else(|| wrong_accessor(self, "double"))
    }

    pub fn as_decimal(&self) -> Result<Decimal, Error> {
        match self.numeric() {
            Some(Numeric::Integer(i)) => Decimal::from_i128(i)
                .ok_or_else(|| Error::from_code(ErrorCode::FOCA0001, format!("{i} exceeds xs:decimal precision"))),
            Some(Numeric::Decimal(d)) => Ok(d),
            Some(n) => {
                let f = n.to_f64();
                if !f.is_finite() {
                    return Err(Error::from_code(ErrorCode::FOCA0002, format!("cannot convert {self} to xs:decimal")));
                }
                let converted = match n {
                    Numeric::Float(x) => Decimal::from_f32(x),
                    _ => Decimal::from_f64(f),
                };
                converted.ok_or_else(|| Error::from_code(ErrorCode::FOCA0001, format!("{self} exceeds xs:decimal range")))
            }
            None => Err(wrong_accessor(self, "decimal")),
        }
    }

    pub fn as_boolean(&self) -> Result<bool, Error> {
        match self {
            XdmAtomicValue::Boolean(b) => Ok(*b),
            _ => Err(wrong_accessor(self, "boolean")),
        }
    }

    pub fn as_moment(&self) -> Result<&Moment, Error> {
        match self {
            XdmAtomicValue::Moment { value, .. } => Ok(value),
            _ => Err(wrong_accessor(self, "date/time")),
        }
    }

    pub fn as_duration(&self) -> Result<&Duration, Error> {
        match self {
            XdmAtomicValue::Duration { value, .. } => Ok(value),
            _ => Err(wrong_accessor(self, "duration")),
        }
    }

    pub fn as_qname(&self) -> Result<&QNameValue, Error> {
        match self {
            XdmAtomicValue::QName(q) => Ok(q),
            _ => Err(wrong_accessor(self, "QName")),
        }
    }

    pub fn as_host_object(&self) -> Result<&HostObject, Error> {
        match self {
            XdmAtomicValue::HostObject(o) => Ok(o),
            _ => Err(wrong_accessor(self, "host object")),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], Error> {
        match self {
            XdmAtomicValue::Binary { bytes, .. } => Ok(bytes),
            _ => Err(wrong_accessor(self, "binary")),
        }
    }
}

impl fmt::Display for XdmAtomicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<bool> for XdmAtomicValue {
    fn from(b: bool) -> Self {
        XdmAtomicValue::Boolean(b)
    }
}

impl From<i64> for XdmAtomicValue {
    fn from(v: i64) -> Self {
        XdmAtomicValue::integer(i128::from(v))
    }
}

impl From<f64> for XdmAtomicValue {
    fn from(v: f64) -> Self {
        XdmAtomicValue::Double(v)
    }
}

impl From<&str> for XdmAtomicValue {
    fn from(s: &str) -> Self {
        XdmAtomicValue::string(s)
    }
}

impl From<String> for XdmAtomicValue {
    fn from(s: String) -> Self {
        XdmAtomicValue::string(s)
    }
}

impl From<Decimal> for XdmAtomicValue {
    fn from(d: Decimal) -> Self {
        XdmAtomicValue::decimal(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xdm::compare::{CompareContext, hash_atomic};

    #[test]
    fn decimal_constructor_rescales() {
        assert_eq!(XdmAtomicValue::decimal(Decimal::from(5)).as_string(), "5.0");
    }

    #[test]
    fn decimal_scale_is_not_observable() {
        let raw = XdmAtomicValue::Decimal(Decimal::new(100, 2));
        let built = XdmAtomicValue::decimal(Decimal::ONE);
        assert_eq!(raw, built);
        assert_eq!(raw.as_string(), "1.0");
        let ctx = CompareContext::default();
        assert_eq!(hash_atomic(&raw, &ctx), hash_atomic(&built, &ctx));
    }

    #[test]
    fn numeric_hash_is_type_independent() {
        assert_eq!(hash_as_double(1.0), hash_as_double(Numeric::Integer(1).to_f64()));
        assert_eq!(hash_as_double(0.0), hash_as_double(-0.0));
        assert_eq!(hash_as_double(f64::NAN), hash_as_double(-f64::NAN));
    }

    #[test]
    fn accessors_reject_foreign_domains() {
        let q = XdmAtomicValue::qname(QNameValue::new(None, None, "a"));
        let err = q.as_integer().unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
        assert!(XdmAtomicValue::Boolean(true).as_duration().is_err());
    }

    #[test]
    fn integer_accessor_truncates_and_guards_specials() {
        assert_eq!(XdmAtomicValue::Double(-2.7).as_integer().unwrap(), -2);
        assert_eq!(XdmAtomicValue::Double(f64::NAN).as_integer().unwrap_err().code_enum(), ErrorCode::FOCA0002);
    }

    #[test]
    fn bounded_integer_construction() {
        assert!(XdmAtomicValue::typed_integer(AtomicType::Byte, 127).is_ok());
        assert!(XdmAtomicValue::typed_integer(AtomicType::Byte, 128).is_err());
        assert!(XdmAtomicValue::typed_integer(AtomicType::Date, 1).is_err());
    }
}
