//! Array-backed sequences.
//!
//! [`ItemArray`] accumulates items with amortized O(1) append. Its buffer
//! doubles from a small initial capacity up to a block size; once a block is
//! full it is moved to an overflow list and a fresh block is started, so no
//! single reallocation exceeds one block. [`ItemArray::pack`] folds the
//! overflow blocks back into one buffer and must run before any flat view is
//! taken. [`PrimitiveArray`] and [`ObjectArray`] wrap host arrays that are
//! already complete.
use std::sync::Arc;

use crate::engine::runtime::{Error, ErrorCode};
use crate::interop::HostValue;
use crate::model::XdmNode;
use crate::xdm::sequence::{SequenceCursor, VecCursor};
use crate::xdm::{AtomicType, XdmAtomicValue, XdmItem, XdmItemResult, XdmSequenceStream};

pub const DEFAULT_BLOCK_SIZE: usize = 65_536;
const INITIAL_CAPACITY: usize = 8;

pub struct ItemArray<N> {
    current: Vec<XdmItem<N>>,
    blocks: Vec<Vec<XdmItem<N>>>,
    block_size: usize,
    len: usize,
}

impl<N: XdmNode> Default for ItemArray<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: XdmNode> ItemArray<N> {
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// Array whose single buffer never grows past `block_size` items.
    pub fn with_block_size(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self { current: Vec::with_capacity(INITIAL_CAPACITY.min(block_size)), blocks: Vec::new(), block_size, len: 0 }
    }

    pub fn push(&mut self, item: XdmItem<N>) {
        if self.current.len() == self.current.capacity() {
            let cap = self.current.capacity();
            if cap < self.block_size {
                let target = (cap * 2).clamp(INITIAL_CAPACITY.min(self.block_size), self.block_size);
                self.current.reserve_exact(target - self.current.len());
            } else {
                let full = core::mem::replace(&mut self.current, Vec::with_capacity(self.block_size));
                self.blocks.push(full);
            }
        }
        self.current.push(item);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of full blocks waiting in the overflow list.
    pub fn overflow_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_packed(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Fold the overflow blocks and the partial buffer into one buffer.
    /// A no-op when nothing has overflowed.
    pub fn pack(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        tracing::trace!(blocks = self.blocks.len(), len = self.len, "packing item array");
        let mut flat = Vec::with_capacity(self.len);
        for block in self.blocks.drain(..) {
            flat.extend(block);
        }
        flat.append(&mut self.current);
        self.current = flat;
    }

    /// Item at 1-based `pos`. Packs first.
    pub fn get(&mut self, pos: usize) -> Option<&XdmItem<N>> {
        self.pack();
        pos.checked_sub(1).and_then(|i| self.current.get(i))
    }

    /// Flat view of all items. Packs first.
    pub fn as_slice(&mut self) -> &[XdmItem<N>] {
        self.pack();
        &self.current
    }

    /// Streaming view in insertion order; works packed or not.
    pub fn iter(&self) -> impl Iterator<Item = &XdmItem<N>> {
        self.blocks.iter().flatten().chain(self.current.iter())
    }

    pub fn into_stream(mut self) -> XdmSequenceStream<N> {
        self.pack();
        if self.current.is_empty() {
            return XdmSequenceStream::empty();
        }
        XdmSequenceStream::new(Box::new(VecCursor::new(self.current.into())))
    }
}

impl<N: XdmNode> Extend<XdmItem<N>> for ItemArray<N> {
    fn extend<I: IntoIterator<Item = XdmItem<N>>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

impl<N: XdmNode> FromIterator<XdmItem<N>> for ItemArray<N> {
    fn from_iter<I: IntoIterator<Item = XdmItem<N>>>(iter: I) -> Self {
        let mut array = Self::new();
        array.extend(iter);
        array
    }
}

/// Element type of a homogeneous host array.
pub trait Primitive: Clone + Send + Sync + 'static {
    const ITEM_TYPE: AtomicType;
    fn to_atomic(&self) -> XdmAtomicValue;
}

macro_rules! integer_primitive {
    ($($t:ty => $ty:ident),* $(,)?) => {$(
        impl Primitive for $t {
            const ITEM_TYPE: AtomicType = AtomicType::$ty;
            fn to_atomic(&self) -> XdmAtomicValue {
                XdmAtomicValue::Integer { ty: AtomicType::$ty, value: i128::from(*self) }
            }
        }
    )*};
}

integer_primitive!(i8 => Byte, i16 => Short, i32 => Int, i64 => Long);

impl Primitive for bool {
    const ITEM_TYPE: AtomicType = AtomicType::Boolean;
    fn to_atomic(&self) -> XdmAtomicValue {
        XdmAtomicValue::Boolean(*self)
    }
}

impl Primitive for f32 {
    const ITEM_TYPE: AtomicType = AtomicType::Float;
    fn to_atomic(&self) -> XdmAtomicValue {
        XdmAtomicValue::Float(*self)
    }
}

impl Primitive for f64 {
    const ITEM_TYPE: AtomicType = AtomicType::Double;
    fn to_atomic(&self) -> XdmAtomicValue {
        XdmAtomicValue::Double(*self)
    }
}

impl Primitive for char {
    const ITEM_TYPE: AtomicType = AtomicType::String;
    fn to_atomic(&self) -> XdmAtomicValue {
        XdmAtomicValue::string(self.to_string())
    }
}

impl Primitive for String {
    const ITEM_TYPE: AtomicType = AtomicType::String;
    fn to_atomic(&self) -> XdmAtomicValue {
        XdmAtomicValue::string(self.as_str())
    }
}

/// Sequence over a homogeneous host array.
pub struct PrimitiveArray<T> {
    values: Arc<[T]>,
    pos: usize,
}

impl<T: Primitive> PrimitiveArray<T> {
    pub fn new(values: impl Into<Arc<[T]>>) -> Self {
        Self { values: values.into(), pos: 0 }
    }

    pub fn into_stream<N: XdmNode>(self) -> XdmSequenceStream<N> {
        XdmSequenceStream::new(Box::new(self))
    }
}

impl<T: Primitive, N: XdmNode> SequenceCursor<N> for PrimitiveArray<T> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        let v = self.values.get(self.pos)?;
        self.pos += 1;
        Some(Ok(XdmItem::Atomic(v.to_atomic())))
    }
    fn born_again(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(PrimitiveArray { values: Arc::clone(&self.values), pos: 0 })
    }
    fn quick_count(&self) -> Option<usize> {
        Some(self.values.len())
    }
    fn quick_index(&self, pos: usize) -> Option<XdmItemResult<N>> {
        let v = self.values.get(pos.checked_sub(1)?)?;
        Some(Ok(XdmItem::Atomic(v.to_atomic())))
    }
}

/// Sequence over heterogeneous host values, each converted to the declared
/// item type as it is pulled. Null elements contribute nothing.
pub struct ObjectArray {
    values: Arc<[HostValue]>,
    item_type: AtomicType,
    has_nulls: bool,
    pos: usize,
}

impl ObjectArray {
    pub fn new(values: impl Into<Arc<[HostValue]>>, item_type: AtomicType) -> Self {
        let values = values.into();
        let has_nulls = values.iter().any(|v| matches!(v, HostValue::Null));
        Self { values, item_type, has_nulls, pos: 0 }
    }

    pub fn into_stream<N: XdmNode>(self) -> XdmSequenceStream<N> {
        XdmSequenceStream::new(Box::new(self))
    }

    fn convert<N>(&self, value: &HostValue) -> XdmItemResult<N> {
        self.item_type.convert_from_host_object(value).map(XdmItem::Atomic).map_err(|e| {
            Error::from_code(
                ErrorCode::XPTY0004,
                format!("array element does not convert to {}: {}", self.item_type, e.message),
            )
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
        })
    }
}

impl<N: XdmNode> SequenceCursor<N> for ObjectArray {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        loop {
            let v = self.values.get(self.pos)?;
            self.pos += 1;
            if !matches!(v, HostValue::Null) {
                return Some(self.convert(v));
            }
        }
    }
    fn born_again(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(ObjectArray {
            values: Arc::clone(&self.values),
            item_type: self.item_type,
            has_nulls: self.has_nulls,
            pos: 0,
        })
    }
    fn quick_count(&self) -> Option<usize> {
        (!self.has_nulls).then_some(self.values.len())
    }
    fn quick_index(&self, pos: usize) -> Option<XdmItemResult<N>> {
        if self.has_nulls {
            return None;
        }
        let v = self.values.get(pos.checked_sub(1)?)?;
        Some(self.convert(v))
    }
}
