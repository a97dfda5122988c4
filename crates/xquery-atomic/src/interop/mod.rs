//! Host-value boundary.
//!
//! [`HostValue`] is what a host function binding hands in or expects back.
//! [`HostClass`] is the stable identifier the [`mapping`] table is keyed by,
//! and the [`convert`] module implements the per-type conversions in both
//! directions.
use core::any::Any;
use core::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use rust_decimal::Decimal;

use crate::xdm::{Duration, QNameValue};

pub mod convert;
pub mod mapping;

pub use mapping::{AbstractClass, TypeMappingTable, type_for_declared_class, type_for_runtime_value, type_mapping};

/// Opaque host object carried through queries as `host:object`.
///
/// Equality is identity: two handles are equal when they point at the same
/// allocation.
#[derive(Clone)]
pub struct HostObject {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl HostObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self { type_name: core::any::type_name::<T>(), value: Arc::new(value) }
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self { type_name: core::any::type_name::<T>(), value }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Address of the shared allocation.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.value).cast::<()>().addr()
    }
}

impl PartialEq for HostObject {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for HostObject {}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject").field("type_name", &self.type_name).field("identity", &self.identity()).finish()
    }
}

impl fmt::Display for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:x}", self.type_name, self.identity())
    }
}

/// Homogeneous host array.
#[derive(Debug, Clone, PartialEq)]
pub enum HostArray {
    Bool(Vec<bool>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Char(Vec<char>),
    Str(Vec<String>),
    /// Heterogeneous elements.
    Object(Vec<HostValue>),
}

impl HostArray {
    pub fn len(&self) -> usize {
        match self {
            HostArray::Bool(v) => v.len(),
            HostArray::I8(v) => v.len(),
            HostArray::I16(v) => v.len(),
            HostArray::I32(v) => v.len(),
            HostArray::I64(v) => v.len(),
            HostArray::F32(v) => v.len(),
            HostArray::F64(v) => v.len(),
            HostArray::Char(v) => v.len(),
            HostArray::Str(v) => v.len(),
            HostArray::Object(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn class(&self) -> HostClass {
        match self {
            HostArray::Bool(_) => HostClass::BoolArray,
            HostArray::I8(_) => HostClass::I8Array,
            HostArray::I16(_) => HostClass::I16Array,
            HostArray::I32(_) => HostClass::I32Array,
            HostArray::I64(_) => HostClass::I64Array,
            HostArray::F32(_) => HostClass::F32Array,
            HostArray::F64(_) => HostClass::F64Array,
            HostArray::Char(_) => HostClass::CharArray,
            HostArray::Str(_) => HostClass::StrArray,
            HostArray::Object(_) => HostClass::ObjectArray,
        }
    }
}

/// A value on the host side of a function binding.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Char(char),
    Str(String),
    Decimal(Decimal),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<FixedOffset>),
    Duration(Duration),
    QName(QNameValue),
    Array(HostArray),
    List(Vec<HostValue>),
    Set(Vec<HostValue>),
    /// A one-shot iterator, already drained into its elements.
    Iterator(Vec<HostValue>),
    Object(HostObject),
}

impl HostValue {
    /// Runtime class of the value.
    pub fn class(&self) -> HostClass {
        match self {
            HostValue::Null => HostClass::Null,
            HostValue::Bool(_) => HostClass::Bool,
            HostValue::I8(_) => HostClass::I8,
            HostValue::I16(_) => HostClass::I16,
            HostValue::I32(_) => HostClass::I32,
            HostValue::I64(_) => HostClass::I64,
            HostValue::F32(_) => HostClass::F32,
            HostValue::F64(_) => HostClass::F64,
            HostValue::Char(_) => HostClass::Char,
            HostValue::Str(_) => HostClass::Str,
            HostValue::Decimal(_) => HostClass::Decimal,
            HostValue::Bytes(_) => HostClass::Bytes,
            HostValue::Date(_) => HostClass::Date,
            HostValue::Time(_) => HostClass::Time,
            HostValue::DateTime(_) => HostClass::DateTime,
            HostValue::Duration(_) => HostClass::Duration,
            HostValue::QName(_) => HostClass::QName,
            HostValue::Array(a) => a.class(),
            HostValue::List(_) => HostClass::List,
            HostValue::Set(_) => HostClass::Set,
            HostValue::Iterator(_) => HostClass::Iterator,
            HostValue::Object(o) => HostClass::Object(o.type_name()),
        }
    }

    /// Elements of array and collection values.
    pub fn elements(&self) -> Option<Vec<HostValue>> {
        Some(match self {
            HostValue::Array(a) => match a {
                HostArray::Bool(v) => v.iter().copied().map(HostValue::Bool).collect(),
                HostArray::I8(v) => v.iter().copied().map(HostValue::I8).collect(),
                HostArray::I16(v) => v.iter().copied().map(HostValue::I16).collect(),
                HostArray::I32(v) => v.iter().copied().map(HostValue::I32).collect(),
                HostArray::I64(v) => v.iter().copied().map(HostValue::I64).collect(),
                HostArray::F32(v) => v.iter().copied().map(HostValue::F32).collect(),
                HostArray::F64(v) => v.iter().copied().map(HostValue::F64).collect(),
                HostArray::Char(v) => v.iter().copied().map(HostValue::Char).collect(),
                HostArray::Str(v) => v.iter().cloned().map(HostValue::Str).collect(),
                HostArray::Object(v) => v.clone(),
            },
            HostValue::List(v) | HostValue::Set(v) | HostValue::Iterator(v) => v.clone(),
            _ => return None,
        })
    }
}

/// Stable identifier of a host type.
///
/// Besides the concrete classes a [`HostValue`] can have, the abstract
/// classes (`Number`, `Temporal`, ...) may appear as *declared* parameter or
/// result types of a binding. They never occur at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostClass {
    Null,
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Char,
    Str,
    Decimal,
    Bytes,
    Date,
    Time,
    DateTime,
    Duration,
    QName,
    BoolArray,
    I8Array,
    I16Array,
    I32Array,
    I64Array,
    F32Array,
    F64Array,
    CharArray,
    StrArray,
    ObjectArray,
    List,
    Set,
    Iterator,
    /// A named opaque host type.
    Object(&'static str),
    Number,
    Temporal,
    Collection,
    Iterable,
    Array,
    AnyObject,
}

impl HostClass {
    pub fn is_array(self) -> bool {
        matches!(
            self,
            HostClass::BoolArray
                | HostClass::I8Array
                | HostClass::I16Array
                | HostClass::I32Array
                | HostClass::I64Array
                | HostClass::F32Array
                | HostClass::F64Array
                | HostClass::CharArray
                | HostClass::StrArray
                | HostClass::ObjectArray
                | HostClass::Array
        )
    }
}
