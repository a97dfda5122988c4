//! Host class to sequence type table.
//!
//! Lookups try the exact-class map first. On a miss the abstract entries are
//! scanned in registration order and the first whose predicate covers the
//! class wins, so `Collection` must be registered ahead of the wider
//! `Iterable`.
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::interop::{HostClass, HostValue};
use crate::xdm::{AtomicType, ItemType, Occurrence, SequenceType};

/// Predicate over host classes used by the fallback scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbstractClass {
    Number,
    Temporal,
    Collection,
    Iterable,
    Array,
    AnyObject,
}

impl AbstractClass {
    pub fn covers(self, class: HostClass) -> bool {
        use HostClass as C;
        match self {
            AbstractClass::Number => matches!(
                class,
                C::Number | C::I8 | C::I16 | C::I32 | C::I64 | C::F32 | C::F64 | C::Decimal
            ),
            AbstractClass::Temporal => {
                matches!(class, C::Temporal | C::Date | C::Time | C::DateTime | C::Duration)
            }
            AbstractClass::Collection => matches!(class, C::Collection | C::List | C::Set),
            AbstractClass::Iterable => {
                matches!(class, C::Iterable | C::Collection | C::List | C::Set | C::Iterator)
            }
            AbstractClass::Array => class.is_array(),
            AbstractClass::AnyObject => class != C::Null,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeMappingTable {
    exact: HashMap<HostClass, SequenceType>,
    abstracts: Vec<(AbstractClass, SequenceType)>,
}

impl TypeMappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table.
    pub fn standard() -> Self {
        use AtomicType as T;
        use HostClass as C;
        let mut table = Self::new();
        let one = SequenceType::one;
        let opt = SequenceType::opt;
        let star = SequenceType::star;
        for (class, ty) in [
            (C::Bool, one(T::Boolean)),
            (C::I8, one(T::Byte)),
            (C::I16, one(T::Short)),
            (C::I32, one(T::Int)),
            (C::I64, one(T::Long)),
            (C::F32, one(T::Float)),
            (C::F64, one(T::Double)),
            (C::Char, one(T::String)),
            (C::Str, opt(T::String)),
            (C::Decimal, opt(T::Decimal)),
            (C::Bytes, opt(T::Base64Binary)),
            (C::Date, opt(T::Date)),
            (C::Time, opt(T::Time)),
            (C::DateTime, opt(T::DateTime)),
            (C::Duration, opt(T::Duration)),
            (C::QName, opt(T::QName)),
            (C::BoolArray, star(T::Boolean)),
            (C::I8Array, star(T::Byte)),
            (C::I16Array, star(T::Short)),
            (C::I32Array, star(T::Int)),
            (C::I64Array, star(T::Long)),
            (C::F32Array, star(T::Float)),
            (C::F64Array, star(T::Double)),
            (C::CharArray, star(T::String)),
            (C::StrArray, star(T::String)),
            (C::Null, SequenceType::EMPTY),
        ] {
            table.register_exact(class, ty);
        }
        let any_items = SequenceType::any_items();
        table.register_abstract(AbstractClass::Array, any_items);
        table.register_abstract(AbstractClass::Collection, any_items);
        table.register_abstract(AbstractClass::Iterable, any_items);
        table.register_abstract(AbstractClass::Number, SequenceType::numeric(Occurrence::ZeroOrOne));
        table.register_abstract(AbstractClass::Temporal, opt(T::AnyAtomic));
        table.register_abstract(AbstractClass::AnyObject, opt(T::HostObject));
        table
    }

    pub fn register_exact(&mut self, class: HostClass, ty: SequenceType) {
        self.exact.insert(class, ty);
    }

    /// Append an abstract entry. Entries registered earlier take precedence.
    pub fn register_abstract(&mut self, class: AbstractClass, ty: SequenceType) {
        self.abstracts.push((class, ty));
    }

    /// Declared type of a binding parameter or result of host class `class`.
    pub fn type_for_declared_class(&self, class: HostClass) -> Option<SequenceType> {
        if let Some(ty) = self.exact.get(&class) {
            return Some(*ty);
        }
        let found = self.abstracts.iter().find(|(a, _)| a.covers(class)).map(|(_, ty)| *ty);
        tracing::trace!(?class, ?found, "host class resolved through abstract mapping");
        found
    }

    /// Type of an actual host value. A present scalar is exactly one item,
    /// even where the declared class admits absence.
    pub fn type_for_runtime_value(&self, value: &HostValue) -> Option<SequenceType> {
        let declared = self.type_for_declared_class(value.class())?;
        Some(match (declared.item, declared.occurrence) {
            (ItemType::Empty, _) => declared,
            (item, Occurrence::ZeroOrOne) => SequenceType::new(item, Occurrence::ExactlyOne),
            (item, Occurrence::ZeroOrMore) if value.elements().is_some_and(|e| !e.is_empty()) => {
                SequenceType::new(item, Occurrence::OneOrMore)
            }
            _ => declared,
        })
    }
}

static STANDARD: LazyLock<TypeMappingTable> = LazyLock::new(TypeMappingTable::standard);

/// Process-wide built-in table.
pub fn type_mapping() -> &'static TypeMappingTable {
    &STANDARD
}

pub fn type_for_declared_class(class: HostClass) -> Option<SequenceType> {
    type_mapping().type_for_declared_class(class)
}

pub fn type_for_runtime_value(value: &HostValue) -> Option<SequenceType> {
    type_mapping().type_for_runtime_value(value)
}
