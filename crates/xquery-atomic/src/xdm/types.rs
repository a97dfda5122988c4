//! The atomic type lattice.
//!
//! Every atomic type is one variant of [`AtomicType`]. The discriminant is the
//! type's quick code, and a static table indexed by that code holds the local
//! name, parent and (for the integer family) the closed value range. Subtype
//! tests walk the parent chain, so the hierarchy is a tree rooted at
//! `xs:anyAtomicType`.
use core::fmt;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::consts::{HOST_NS, XS};
use crate::model::{NodeKind, XdmNode};
use crate::xdm::{ExpandedName, XdmAtomicValue, XdmItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AtomicType {
    AnyAtomic = 0,
    UntypedAtomic,
    String,
    NormalizedString,
    Token,
    Language,
    NmToken,
    Name,
    NcName,
    Id,
    IdRef,
    Entity,
    AnyUri,
    Boolean,
    Decimal,
    Integer,
    NonPositiveInteger,
    NegativeInteger,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    PositiveInteger,
    Float,
    Double,
    Duration,
    YearMonthDuration,
    DayTimeDuration,
    DateTime,
    Date,
    Time,
    GYearMonth,
    GYear,
    GMonthDay,
    GDay,
    GMonth,
    QName,
    HexBinary,
    Base64Binary,
    HostObject,
}

/// Coarse grouping used by the cast and comparison switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    Any,
    Untyped,
    String,
    AnyUri,
    Boolean,
    Integer,
    Decimal,
    Float,
    Double,
    Duration,
    Temporal,
    QName,
    Binary,
    HostObject,
}

struct TypeInfo {
    local: &'static str,
    parent: Option<AtomicType>,
    family: TypeFamily,
    bounds: Option<(i128, i128)>,
}

const fn info(
    local: &'static str,
    parent: Option<AtomicType>,
    family: TypeFamily,
    bounds: Option<(i128, i128)>,
) -> TypeInfo {
    TypeInfo { local, parent, family, bounds }
}

use AtomicType as T;
use TypeFamily as F;

const I64_MIN: i128 = i64::MIN as i128;
const I64_MAX: i128 = i64::MAX as i128;
const U64_MAX: i128 = u64::MAX as i128;

// Indexed by quick code; order must match the enum declaration.
static TYPE_TABLE: [TypeInfo; AtomicType::COUNT] = [
    info("anyAtomicType", None, F::Any, None),
    info("untypedAtomic", Some(T::AnyAtomic), F::Untyped, None),
    info("string", Some(T::AnyAtomic), F::String, None),
    info("normalizedString", Some(T::String), F::String, None),
    info("token", Some(T::NormalizedString), F::String, None),
    info("language", Some(T::Token), F::String, None),
    info("NMTOKEN", Some(T::Token), F::String, None),
    info("Name", Some(T::Token), F::String, None),
    info("NCName", Some(T::Name), F::String, None),
    info("ID", Some(T::NcName), F::String, None),
    info("IDREF", Some(T::NcName), F::String, None),
    info("ENTITY", Some(T::NcName), F::String, None),
    info("anyURI", Some(T::AnyAtomic), F::AnyUri, None),
    info("boolean", Some(T::AnyAtomic), F::Boolean, None),
    info("decimal", Some(T::AnyAtomic), F::Decimal, None),
    info("integer", Some(T::Decimal), F::Integer, None),
    info("nonPositiveInteger", Some(T::Integer), F::Integer, Some((i128::MIN, 0))),
    info("negativeInteger", Some(T::NonPositiveInteger), F::Integer, Some((i128::MIN, -1))),
    info("long", Some(T::Integer), F::Integer, Some((I64_MIN, I64_MAX))),
    info("int", Some(T::Long), F::Integer, Some((i32::MIN as i128, i32::MAX as i128))),
    info("short", Some(T::Int), F::Integer, Some((i16::MIN as i128, i16::MAX as i128))),
    info("byte", Some(T::Short), F::Integer, Some((i8::MIN as i128, i8::MAX as i128))),
    info("nonNegativeInteger", Some(T::Integer), F::Integer, Some((0, i128::MAX))),
    info("unsignedLong", Some(T::NonNegativeInteger), F::Integer, Some((0, U64_MAX))),
    info("unsignedInt", Some(T::UnsignedLong), F::Integer, Some((0, u32::MAX as i128))),
    info("unsignedShort", Some(T::UnsignedInt), F::Integer, Some((0, u16::MAX as i128))),
    info("unsignedByte", Some(T::UnsignedShort), F::Integer, Some((0, u8::MAX as i128))),
    info("positiveInteger", Some(T::NonNegativeInteger), F::Integer, Some((1, i128::MAX))),
    info("float", Some(T::AnyAtomic), F::Float, None),
    info("double", Some(T::AnyAtomic), F::Double, None),
    info("duration", Some(T::AnyAtomic), F::Duration, None),
    info("yearMonthDuration", Some(T::Duration), F::Duration, None),
    info("dayTimeDuration", Some(T::Duration), F::Duration, None),
    info("dateTime", Some(T::AnyAtomic), F::Temporal, None),
    info("date", Some(T::AnyAtomic), F::Temporal, None),
    info("time", Some(T::AnyAtomic), F::Temporal, None),
    info("gYearMonth", Some(T::AnyAtomic), F::Temporal, None),
    info("gYear", Some(T::AnyAtomic), F::Temporal, None),
    info("gMonthDay", Some(T::AnyAtomic), F::Temporal, None),
    info("gDay", Some(T::AnyAtomic), F::Temporal, None),
    info("gMonth", Some(T::AnyAtomic), F::Temporal, None),
    info("QName", Some(T::AnyAtomic), F::QName, None),
    info("hexBinary", Some(T::AnyAtomic), F::Binary, None),
    info("base64Binary", Some(T::AnyAtomic), F::Binary, None),
    info("object", Some(T::AnyAtomic), F::HostObject, None),
];

impl AtomicType {
    pub const COUNT: usize = 45;

    /// All types in quick-code order.
    pub const ALL: [AtomicType; Self::COUNT] = [
        T::AnyAtomic,
        T::UntypedAtomic,
        T::String,
        T::NormalizedString,
        T::Token,
        T::Language,
        T::NmToken,
        T::Name,
        T::NcName,
        T::Id,
        T::IdRef,
        T::Entity,
        T::AnyUri,
        T::Boolean,
        T::Decimal,
        T::Integer,
        T::NonPositiveInteger,
        T::NegativeInteger,
        T::Long,
        T::Int,
        T::Short,
        T::Byte,
        T::NonNegativeInteger,
        T::UnsignedLong,
        T::UnsignedInt,
        T::UnsignedShort,
        T::UnsignedByte,
        T::PositiveInteger,
        T::Float,
        T::Double,
        T::Duration,
        T::YearMonthDuration,
        T::DayTimeDuration,
        T::DateTime,
        T::Date,
        T::Time,
        T::GYearMonth,
        T::GYear,
        T::GMonthDay,
        T::GDay,
        T::GMonth,
        T::QName,
        T::HexBinary,
        T::Base64Binary,
        T::HostObject,
    ];

    #[inline]
    pub const fn quick_code(self) -> u8 {
        self as u8
    }

    pub fn from_quick_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    #[inline]
    fn info(self) -> &'static TypeInfo {
        &TYPE_TABLE[self as usize]
    }

    /// Local part of the type name, e.g. `"int"`.
    pub fn local_name(self) -> &'static str {
        self.info().local
    }

    pub fn namespace(self) -> &'static str {
        if self == T::HostObject { HOST_NS } else { XS }
    }

    /// Conventional prefixed name, e.g. `"xs:int"`.
    pub fn display_name(self) -> String {
        if self == T::HostObject {
            format!("host:{}", self.local_name())
        } else {
            format!("xs:{}", self.local_name())
        }
    }

    pub fn expanded_name(self) -> ExpandedName {
        ExpandedName::new(Some(self.namespace().to_string()), self.local_name())
    }

    /// Look up a type by its expanded name.
    pub fn from_expanded(ns_uri: Option<&str>, local: &str) -> Option<Self> {
        static BY_NAME: OnceLock<HashMap<&'static str, AtomicType>> = OnceLock::new();
        let map = BY_NAME.get_or_init(|| {
            AtomicType::ALL
                .iter()
                .filter(|t| **t != T::HostObject)
                .map(|t| (t.local_name(), *t))
                .collect()
        });
        match ns_uri {
            Some(XS) => map.get(local).copied(),
            Some(HOST_NS) if local == T::HostObject.local_name() => Some(T::HostObject),
            _ => None,
        }
    }

    pub fn parent(self) -> Option<Self> {
        self.info().parent
    }

    pub fn family(self) -> TypeFamily {
        self.info().family
    }

    /// Closed value range for the bounded integer subtypes.
    pub fn bounds(self) -> Option<(i128, i128)> {
        self.info().bounds
    }

    pub fn is_abstract(self) -> bool {
        self == T::AnyAtomic
    }

    /// Reflexive, transitive subtype test over the parent chain.
    pub fn is_subtype_of(self, other: Self) -> bool {
        let mut cur = Some(self);
        while let Some(t) = cur {
            if t == other {
                return true;
            }
            cur = t.parent();
        }
        false
    }

    /// Number of parent steps from `self` up to `ancestor`, if it is one.
    pub fn derivation_depth(self, ancestor: Self) -> Option<u32> {
        let mut depth = 0;
        let mut cur = Some(self);
        while let Some(t) = cur {
            if t == ancestor {
                return Some(depth);
            }
            depth += 1;
            cur = t.parent();
        }
        None
    }

    pub fn is_numeric(self) -> bool {
        matches!(self.family(), F::Integer | F::Decimal | F::Float | F::Double)
    }

    pub fn is_integer(self) -> bool {
        self.family() == F::Integer
    }

    /// `xs:string` and everything derived from it.
    pub fn is_string(self) -> bool {
        self.family() == F::String
    }

    pub fn is_duration(self) -> bool {
        self.family() == F::Duration
    }

    pub fn is_temporal(self) -> bool {
        self.family() == F::Temporal
    }

    /// Whether a value of type `from` is implicitly promotable to `self`
    /// during comparison and arithmetic: subtype substitution, numeric
    /// promotion (decimal to float to double) and anyURI to string.
    pub fn accepts_promotion_from(self, from: Self) -> bool {
        if from.is_subtype_of(self) {
            return true;
        }
        match self {
            T::Double => from.is_subtype_of(T::Decimal) || from == T::Float,
            T::Float => from.is_subtype_of(T::Decimal),
            T::String => from == T::AnyUri,
            _ => false,
        }
    }

    /// Numeric promotion rank (integer < decimal < float < double).
    pub(crate) fn numeric_rank(self) -> Option<u8> {
        match self.family() {
            F::Integer => Some(0),
            F::Decimal => Some(1),
            F::Float => Some(2),
            F::Double => Some(3),
            _ => None,
        }
    }
}

impl fmt::Display for AtomicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Item type of a sequence type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// `item()`
    AnyItem,
    /// `node()` or a specific node kind test.
    Node(Option<NodeKind>),
    Atomic(AtomicType),
    /// The `numeric` union (integer, decimal, float, double).
    Numeric,
    /// `empty-sequence()`
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    ExactlyOne,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Occurrence {
    pub fn allows_empty(self) -> bool {
        matches!(self, Occurrence::ZeroOrOne | Occurrence::ZeroOrMore)
    }
    pub fn allows_many(self) -> bool {
        matches!(self, Occurrence::ZeroOrMore | Occurrence::OneOrMore)
    }
    pub fn admits(self, count: usize) -> bool {
        match count {
            0 => self.allows_empty(),
            1 => true,
            _ => self.allows_many(),
        }
    }
    fn suffix(self) -> &'static str {
        match self {
            Occurrence::ExactlyOne => "",
            Occurrence::ZeroOrOne => "?",
            Occurrence::ZeroOrMore => "*",
            Occurrence::OneOrMore => "+",
        }
    }
}

/// Item type plus cardinality, e.g. `xs:integer?` or `item()*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceType {
    pub item: ItemType,
    pub occurrence: Occurrence,
}

impl SequenceType {
    pub const EMPTY: SequenceType =
        SequenceType { item: ItemType::Empty, occurrence: Occurrence::ZeroOrOne };

    pub const fn new(item: ItemType, occurrence: Occurrence) -> Self {
        Self { item, occurrence }
    }
    pub const fn atomic(ty: AtomicType, occurrence: Occurrence) -> Self {
        Self { item: ItemType::Atomic(ty), occurrence }
    }
    pub const fn one(ty: AtomicType) -> Self {
        Self::atomic(ty, Occurrence::ExactlyOne)
    }
    pub const fn opt(ty: AtomicType) -> Self {
        Self::atomic(ty, Occurrence::ZeroOrOne)
    }
    pub const fn star(ty: AtomicType) -> Self {
        Self::atomic(ty, Occurrence::ZeroOrMore)
    }
    pub const fn any_items() -> Self {
        Self::new(ItemType::AnyItem, Occurrence::ZeroOrMore)
    }
    pub const fn numeric(occurrence: Occurrence) -> Self {
        Self::new(ItemType::Numeric, occurrence)
    }

    pub fn is_empty_sequence(&self) -> bool {
        self.item == ItemType::Empty
    }

    /// Runtime check of a single item against the item type.
    pub fn matches_item<N: XdmNode>(&self, item: &XdmItem<N>) -> bool {
        match (self.item, item) {
            (ItemType::AnyItem, _) => true,
            (ItemType::Node(None), XdmItem::Node(_)) => true,
            (ItemType::Node(Some(kind)), XdmItem::Node(n)) => n.kind() == kind,
            (ItemType::Atomic(t), XdmItem::Atomic(a)) => a.atomic_type().is_subtype_of(t),
            (ItemType::Numeric, XdmItem::Atomic(a)) => a.atomic_type().is_numeric(),
            _ => false,
        }
    }

    /// Runtime check of a whole materialized sequence.
    pub fn matches<N: XdmNode>(&self, items: &[XdmItem<N>]) -> bool {
        if self.is_empty_sequence() {
            return items.is_empty();
        }
        self.occurrence.admits(items.len()) && items.iter().all(|i| self.matches_item(i))
    }

    pub fn matches_atomic(&self, value: &XdmAtomicValue) -> bool {
        match self.item {
            ItemType::AnyItem => true,
            ItemType::Atomic(t) => value.atomic_type().is_subtype_of(t),
            ItemType::Numeric => value.atomic_type().is_numeric(),
            ItemType::Node(_) | ItemType::Empty => false,
        }
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let item = match self.item {
            ItemType::Empty => return f.write_str("empty-sequence()"),
            ItemType::AnyItem => "item()".to_string(),
            ItemType::Node(None) => "node()".to_string(),
            ItemType::Node(Some(kind)) => format!("{kind:?}()").to_lowercase(),
            ItemType::Atomic(t) => t.display_name(),
            ItemType::Numeric => "numeric".to_string(),
        };
        write!(f, "{item}{}", self.occurrence.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_matches_quick_codes() {
        for (i, t) in AtomicType::ALL.iter().enumerate() {
            assert_eq!(usize::from(t.quick_code()), i, "{t:?}");
            assert_eq!(AtomicType::from_quick_code(t.quick_code()), Some(*t));
        }
        assert_eq!(AtomicType::from_quick_code(AtomicType::COUNT as u8), None);
    }

    #[test]
    fn every_type_reaches_the_root() {
        for t in AtomicType::ALL {
            assert!(t.is_subtype_of(AtomicType::AnyAtomic), "{t:?}");
        }
    }

    #[test]
    fn subtype_is_antisymmetric() {
        for a in AtomicType::ALL {
            for b in AtomicType::ALL {
                if a != b && a.is_subtype_of(b) {
                    assert!(!b.is_subtype_of(a), "{a:?} <-> {b:?}");
                }
            }
        }
    }

    #[test]
    fn names_resolve_back() {
        for t in AtomicType::ALL {
            assert_eq!(AtomicType::from_expanded(Some(t.namespace()), t.local_name()), Some(t));
        }
    }
}
