//! Conversions between host values and atomic values.
use chrono::NaiveTime;

use crate::engine::runtime::{DynamicContext, Error, ErrorCode};
use crate::interop::{HostArray, HostObject, HostValue};
use crate::model::XdmNode;
use crate::xdm::array::{ObjectArray, Primitive, PrimitiveArray};
use crate::xdm::cast::{CastContext, integer_to_i64};
use crate::xdm::temporal::{Duration, Moment};
use crate::xdm::{AtomicType, TypeFamily, XdmAtomicValue, XdmItem, XdmSequenceStream};

fn not_single(value: &HostValue) -> Error {
    Error::from_code(ErrorCode::XPTY0004, format!("expected a single host value, found {:?}", value.class()))
}

/// The atomic value a host value maps to without a target type. `None` for
/// null.
pub fn natural_atomic(value: &HostValue) -> Result<Option<XdmAtomicValue>, Error> {
    let typed = |ty, v: i128| XdmAtomicValue::Integer { ty, value: v };
    Ok(Some(match value {
        HostValue::Null => return Ok(None),
        HostValue::Bool(b) => XdmAtomicValue::Boolean(*b),
        HostValue::I8(v) => typed(AtomicType::Byte, i128::from(*v)),
        HostValue::I16(v) => typed(AtomicType::Short, i128::from(*v)),
        HostValue::I32(v) => typed(AtomicType::Int, i128::from(*v)),
        HostValue::I64(v) => typed(AtomicType::Long, i128::from(*v)),
        HostValue::F32(v) => XdmAtomicValue::Float(*v),
        HostValue::F64(v) => XdmAtomicValue::Double(*v),
        HostValue::Char(c) => XdmAtomicValue::string(c.to_string()),
        HostValue::Str(s) => XdmAtomicValue::string(s.as_str()),
        HostValue::Decimal(d) => XdmAtomicValue::decimal(*d),
        HostValue::Bytes(b) => XdmAtomicValue::binary(AtomicType::Base64Binary, b.as_slice()),
        HostValue::Date(d) => XdmAtomicValue::moment(AtomicType::Date, Moment::new(*d, NaiveTime::MIN, None)),
        HostValue::Time(t) => XdmAtomicValue::moment(AtomicType::Time, Moment::new(Default::default(), *t, None)),
        HostValue::DateTime(dt) => XdmAtomicValue::moment(AtomicType::DateTime, Moment::from_datetime(*dt)),
        HostValue::Duration(d) => XdmAtomicValue::duration(duration_subtype(d), *d),
        HostValue::QName(q) => XdmAtomicValue::QName(q.clone()),
        HostValue::Object(o) => XdmAtomicValue::HostObject(o.clone()),
        HostValue::Array(_) | HostValue::List(_) | HostValue::Set(_) | HostValue::Iterator(_) => {
            return Err(not_single(value));
        }
    }))
}

fn duration_subtype(d: &Duration) -> AtomicType {
    match (d.months() != 0, !d.seconds().is_zero()) {
        (true, false) => AtomicType::YearMonthDuration,
        (false, _) => AtomicType::DayTimeDuration,
        (true, true) => AtomicType::Duration,
    }
}

fn primitive_stream<T: Primitive, N: XdmNode>(
    target: AtomicType,
    values: &[T],
) -> Option<XdmSequenceStream<N>> {
    let direct = target == AtomicType::AnyAtomic || T::ITEM_TYPE.is_subtype_of(target);
    direct.then(|| PrimitiveArray::new(values.to_vec()).into_stream())
}

impl AtomicType {
    /// Convert one host value to a value of this type.
    pub fn convert_from_host_object(self, value: &HostValue) -> Result<XdmAtomicValue, Error> {
        if self == AtomicType::HostObject {
            return Ok(XdmAtomicValue::HostObject(match value {
                HostValue::Object(o) => o.clone(),
                other => HostObject::new(other.clone()),
            }));
        }
        let natural = natural_atomic(value)?.ok_or_else(|| {
            Error::from_code(ErrorCode::XPTY0004, format!("null host value where {self} is required"))
        })?;
        if self == AtomicType::AnyAtomic || natural.atomic_type().is_subtype_of(self) {
            return Ok(natural);
        }
        self.cast(&natural, &CastContext::default())
    }

    /// Convert a host array, collection or scalar to a sequence of this type.
    /// Homogeneous arrays whose element type already fits are wrapped without
    /// per-item conversion.
    pub fn convert_from_host_array<N: XdmNode>(self, value: &HostValue) -> Result<XdmSequenceStream<N>, Error> {
        if let HostValue::Array(array) = value {
            let fast = match array {
                HostArray::Bool(v) => primitive_stream(self, v),
                HostArray::I8(v) => primitive_stream(self, v),
                HostArray::I16(v) => primitive_stream(self, v),
                HostArray::I32(v) => primitive_stream(self, v),
                HostArray::I64(v) => primitive_stream(self, v),
                HostArray::F32(v) => primitive_stream(self, v),
                HostArray::F64(v) => primitive_stream(self, v),
                HostArray::Char(v) => primitive_stream(self, v),
                HostArray::Str(v) => primitive_stream(self, v),
                HostArray::Object(_) => None,
            };
            if let Some(stream) = fast {
                return Ok(stream);
            }
        }
        match value.elements() {
            Some(elements) => Ok(ObjectArray::new(elements, self).into_stream()),
            None if matches!(value, HostValue::Null) => Ok(XdmSequenceStream::empty()),
            None => Ok(XdmSequenceStream::atomic(self.convert_from_host_object(value)?)),
        }
    }

    /// Marshal a sequence out to a host value of this item type: null for the
    /// empty sequence, a scalar for one item, a list otherwise.
    pub fn convert_to_host_object<N: XdmNode>(
        self,
        value: &XdmSequenceStream<N>,
        ctx: &DynamicContext<N>,
    ) -> Result<HostValue, Error> {
        let mut out = Vec::new();
        for item in value.clone() {
            match item? {
                XdmItem::Node(n) if self == AtomicType::HostObject => {
                    out.push(HostValue::Object(HostObject::new(n)));
                }
                item => {
                    for atomic in item.atomize() {
                        out.push(self.atomic_to_host(&atomic, ctx)?);
                    }
                }
            }
        }
        Ok(match out.len() {
            0 => HostValue::Null,
            1 => out.pop().unwrap_or(HostValue::Null),
            _ => HostValue::List(out),
        })
    }

    fn atomic_to_host<N: XdmNode>(self, value: &XdmAtomicValue, ctx: &DynamicContext<N>) -> Result<HostValue, Error> {
        let value = if self == AtomicType::AnyAtomic || value.atomic_type().is_subtype_of(self) {
            value.clone()
        } else {
            self.cast(value, &CastContext::new(ctx.strict_observance, None))?
        };
        let ty = value.atomic_type();
        Ok(match (&value, ty.family()) {
            (XdmAtomicValue::Boolean(b), _) => HostValue::Bool(*b),
            (XdmAtomicValue::Integer { value: v, .. }, _) => {
                let narrow = |e| Error::from_code(ErrorCode::FOCA0003, format!("{v} does not fit the host type: {e}"));
                match ty {
                    AtomicType::Byte => HostValue::I8(i8::try_from(*v).map_err(narrow)?),
                    AtomicType::Short => HostValue::I16(i16::try_from(*v).map_err(narrow)?),
                    AtomicType::Int => HostValue::I32(i32::try_from(*v).map_err(narrow)?),
                    _ => HostValue::I64(integer_to_i64(*v)?),
                }
            }
            (XdmAtomicValue::Decimal(d), _) => HostValue::Decimal(*d),
            (XdmAtomicValue::Float(f), _) => HostValue::F32(*f),
            (XdmAtomicValue::Double(d), _) => HostValue::F64(*d),
            (XdmAtomicValue::Moment { ty: AtomicType::DateTime, value: m }, _) => {
                let tz = m.tz.unwrap_or_else(|| ctx.implicit_timezone());
                let dt = m.naive().and_local_timezone(tz).single().ok_or_else(|| {
                    Error::from_code(ErrorCode::FODT0001, format!("{value} has no instant in {tz}"))
                })?;
                HostValue::DateTime(dt)
            }
            (XdmAtomicValue::Moment { ty: AtomicType::Date, value: m }, _) => HostValue::Date(m.date),
            (XdmAtomicValue::Moment { ty: AtomicType::Time, value: m }, _) => HostValue::Time(m.time),
            (XdmAtomicValue::Duration { value: d, .. }, _) => HostValue::Duration(*d),
            (XdmAtomicValue::QName(q), _) => HostValue::QName(q.clone()),
            (XdmAtomicValue::Binary { bytes, .. }, _) => HostValue::Bytes(bytes.to_vec()),
            (XdmAtomicValue::HostObject(o), _) => HostValue::Object(o.clone()),
            (_, TypeFamily::Temporal | TypeFamily::String | TypeFamily::Untyped | TypeFamily::AnyUri) => {
                HostValue::Str(value.as_string())
            }
            _ => return Err(Error::from_code(ErrorCode::XPTY0004, format!("{ty} has no host representation"))),
        })
    }
}
