//! Lazy item sequences.
//!
//! A [`SequenceCursor`] yields items one at a time and can be *born again*:
//! [`SequenceCursor::born_again`] returns an independent cursor positioned at
//! the start, sharing the immutable backing data but none of the cursor state.
//! A sequence consumed twice (a count and then an iteration, nested loops) is
//! therefore never re-evaluated and never shares a position.
//!
//! Cursors backed by a flat buffer also answer [`SequenceCursor::quick_count`]
//! and [`SequenceCursor::quick_index`]. Everything else answers `None` and the
//! caller falls back to iterating a born-again copy.
use core::fmt;
use std::sync::Arc;

use crate::engine::runtime::Error;
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmItemResult, XdmSequence};

pub trait SequenceCursor<N>: Send {
    /// Next item, `None` once exhausted. An `Err` is reported where it
    /// occurred; the cursor should not be polled afterwards.
    fn next_item(&mut self) -> Option<XdmItemResult<N>>;

    /// Fresh cursor over the same items, positioned at the start.
    fn born_again(&self) -> Box<dyn SequenceCursor<N>>;

    /// Item count without iteration, when the backing store knows it.
    fn quick_count(&self) -> Option<usize> {
        None
    }

    /// Item at 1-based `pos` without iteration. `Some(Err)` when the item
    /// exists but could not be produced.
    fn quick_index(&self, _pos: usize) -> Option<XdmItemResult<N>> {
        None
    }
}

/// Cursor over nothing.
pub struct EmptyCursor;

impl<N: XdmNode> SequenceCursor<N> for EmptyCursor {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        None
    }
    fn born_again(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(EmptyCursor)
    }
    fn quick_count(&self) -> Option<usize> {
        Some(0)
    }
    fn quick_index(&self, _pos: usize) -> Option<XdmItemResult<N>> {
        None
    }
}

/// A one-item sequence: a zero-or-one element iterator over the item, kept
/// separate from the value itself so restarting never touches the value.
pub struct SingleItemCursor<N> {
    item: XdmItem<N>,
    remaining: Option<XdmItem<N>>,
}

impl<N: XdmNode> SingleItemCursor<N> {
    pub fn new(item: XdmItem<N>) -> Self {
        Self { remaining: Some(item.clone()), item }
    }
}

impl<N: XdmNode> SequenceCursor<N> for SingleItemCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        self.remaining.take().map(Ok)
    }
    fn born_again(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(SingleItemCursor::new(self.item.clone()))
    }
    fn quick_count(&self) -> Option<usize> {
        Some(1)
    }
    fn quick_index(&self, pos: usize) -> Option<XdmItemResult<N>> {
        (pos == 1).then(|| Ok(self.item.clone()))
    }
}

/// Cursor over a shared, fully materialized buffer.
pub struct VecCursor<N> {
    items: Arc<[XdmItem<N>]>,
    pos: usize,
}

impl<N> VecCursor<N> {
    pub fn new(items: Arc<[XdmItem<N>]>) -> Self {
        Self { items, pos: 0 }
    }
}

impl<N: XdmNode> SequenceCursor<N> for VecCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        let item = self.items.get(self.pos)?.clone();
        self.pos += 1;
        Some(Ok(item))
    }
    fn born_again(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(VecCursor::new(Arc::clone(&self.items)))
    }
    fn quick_count(&self) -> Option<usize> {
        Some(self.items.len())
    }
    fn quick_index(&self, pos: usize) -> Option<XdmItemResult<N>> {
        pos.checked_sub(1).and_then(|i| self.items.get(i)).cloned().map(Ok)
    }
}

/// Owning handle on a lazy sequence.
///
/// Cloning is cheap and yields an independent cursor (see
/// [`SequenceCursor::born_again`]). As an [`Iterator`] the stream consumes its
/// own cursor.
pub struct XdmSequenceStream<N> {
    cursor: Box<dyn SequenceCursor<N>>,
}

impl<N: XdmNode> XdmSequenceStream<N> {
    pub fn new(cursor: Box<dyn SequenceCursor<N>>) -> Self {
        Self { cursor }
    }

    pub fn empty() -> Self {
        Self::new(Box::new(EmptyCursor))
    }

    pub fn single(item: XdmItem<N>) -> Self {
        Self::new(Box::new(SingleItemCursor::new(item)))
    }

    pub fn atomic(value: XdmAtomicValue) -> Self {
        Self::single(XdmItem::Atomic(value))
    }

    /// Zero or one atomic value.
    pub fn optional(value: Option<XdmAtomicValue>) -> Self {
        value.map_or_else(Self::empty, Self::atomic)
    }

    pub fn from_vec(items: XdmSequence<N>) -> Self {
        match items.len() {
            0 => Self::empty(),
            _ => Self::new(Box::new(VecCursor::new(items.into()))),
        }
    }

    pub fn from_atomics(values: impl IntoIterator<Item = XdmAtomicValue>) -> Self {
        Self::from_vec(values.into_iter().map(XdmItem::Atomic).collect())
    }

    /// Independent cursor positioned at the start.
    pub fn cursor(&self) -> Box<dyn SequenceCursor<N>> {
        self.cursor.born_again()
    }

    pub fn into_cursor(self) -> Box<dyn SequenceCursor<N>> {
        self.cursor
    }

    /// Pull all remaining items into a vector.
    pub fn materialize(self) -> Result<XdmSequence<N>, Error> {
        let mut out = Vec::with_capacity(self.cursor.quick_count().unwrap_or(0));
        for item in self {
            out.push(item?);
        }
        Ok(out)
    }

    /// Item count, iterating a born-again copy when the count is not known.
    pub fn item_count(&self) -> Result<usize, Error> {
        if let Some(n) = self.cursor.quick_count() {
            return Ok(n);
        }
        let mut cursor = self.cursor();
        let mut n = 0;
        while let Some(item) = cursor.next_item() {
            item?;
            n += 1;
        }
        Ok(n)
    }

    /// Item at 1-based `pos`.
    pub fn item_at(&self, pos: usize) -> Result<Option<XdmItem<N>>, Error> {
        if self.cursor.quick_count().is_some() {
            return self.cursor.quick_index(pos).transpose();
        }
        if pos == 0 {
            return Ok(None);
        }
        let mut cursor = self.cursor();
        let mut seen = 0;
        while let Some(item) = cursor.next_item() {
            let item = item?;
            seen += 1;
            if seen == pos {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    /// First item of a born-again copy.
    pub fn first(&self) -> Result<Option<XdmItem<N>>, Error> {
        self.cursor().next_item().transpose()
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        match self.cursor.quick_count() {
            Some(n) => Ok(n == 0),
            None => Ok(self.first()?.is_none()),
        }
    }
}

impl<N: XdmNode> Iterator for XdmSequenceStream<N> {
    type Item = XdmItemResult<N>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_item()
    }
}

impl<N: XdmNode> Clone for XdmSequenceStream<N> {
    fn clone(&self) -> Self {
        Self::new(self.cursor.born_again())
    }
}

impl<N: XdmNode> From<XdmSequence<N>> for XdmSequenceStream<N> {
    fn from(items: XdmSequence<N>) -> Self {
        Self::from_vec(items)
    }
}

impl<N: XdmNode> From<XdmAtomicValue> for XdmSequenceStream<N> {
    fn from(value: XdmAtomicValue) -> Self {
        Self::atomic(value)
    }
}

impl<N> fmt::Debug for XdmSequenceStream<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XdmSequenceStream").field("quick_count", &self.cursor.quick_count()).finish()
    }
}
