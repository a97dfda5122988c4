//! Sequences computed lazily from one or more source sequences.
//!
//! None of these answer `quick_count`/`quick_index`; callers fall back to
//! iteration. `born_again` restarts every source independently, together with
//! the cursor's own positional state.
use std::collections::{HashMap, VecDeque};

use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::compare::{CompareContext, distinct_equal, hash_atomic};
use crate::xdm::sequence::SequenceCursor;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmItemResult, XdmSequenceStream};

/// Atomized source with duplicates removed, in first-occurrence order.
///
/// Two values are duplicates when they compare equal, or when both are NaN.
pub struct DistinctCursor<N> {
    source: Box<dyn SequenceCursor<N>>,
    ctx: CompareContext,
    seen: HashMap<u64, Vec<XdmAtomicValue>>,
    pending: VecDeque<XdmAtomicValue>,
}

impl<N: XdmNode> DistinctCursor<N> {
    pub fn new(source: Box<dyn SequenceCursor<N>>, ctx: CompareContext) -> Self {
        Self { source, ctx, seen: HashMap::new(), pending: VecDeque::new() }
    }

    /// Record `value`; false when an equal value was seen before.
    fn admit(&mut self, value: &XdmAtomicValue) -> bool {
        let bucket = self.seen.entry(hash_atomic(value, &self.ctx)).or_default();
        if bucket.iter().any(|v| distinct_equal(v, value, &self.ctx)) {
            return false;
        }
        bucket.push(value.clone());
        true
    }
}

impl<N: XdmNode> SequenceCursor<N> for DistinctCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        loop {
            if let Some(v) = self.pending.pop_front() {
                if self.admit(&v) {
                    return Some(Ok(XdmItem::Atomic(v)));
                }
                continue;
            }
            match self.source.next_item()? {
                Ok(item) => self.pending.extend(item.atomize()),
                Err(e) => return Some(Err(e)),
            }
        }
    }
    fn born_again(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(DistinctCursor::new(self.source.born_again(), self.ctx.clone()))
    }
}

/// `insert-before`: `inserts` placed before the item at `position`.
pub struct InsertBeforeCursor<N> {
    source: Box<dyn SequenceCursor<N>>,
    inserts: Box<dyn SequenceCursor<N>>,
    position: usize,
    emitted: usize,
    inserted: bool,
}

impl<N: XdmNode> InsertBeforeCursor<N> {
    /// Positions below 1 are treated as 1. A position past the end of the
    /// source appends.
    pub fn new(source: Box<dyn SequenceCursor<N>>, position: i64, inserts: Box<dyn SequenceCursor<N>>) -> Self {
        let position = usize::try_from(position.max(1)).unwrap_or(usize::MAX);
        Self { source, inserts, position, emitted: 0, inserted: false }
    }
}

impl<N: XdmNode> SequenceCursor<N> for InsertBeforeCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        loop {
            if !self.inserted && self.emitted + 1 >= self.position {
                match self.inserts.next_item() {
                    Some(item) => return Some(item),
                    None => self.inserted = true,
                }
            }
            match self.source.next_item() {
                Some(item) => {
                    self.emitted += 1;
                    return Some(item);
                }
                // A position past the end appends.
                None if !self.inserted => {
                    let item = self.inserts.next_item();
                    self.inserted = item.is_none();
                    return item;
                }
                None => return None,
            }
        }
    }
    fn born_again(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(InsertBeforeCursor {
            source: self.source.born_again(),
            inserts: self.inserts.born_again(),
            position: self.position,
            emitted: 0,
            inserted: false,
        })
    }
}

/// `remove`: the source without the item at `position`.
pub struct RemoveCursor<N> {
    source: Box<dyn SequenceCursor<N>>,
    position: Option<usize>,
    seen: usize,
}

impl<N: XdmNode> RemoveCursor<N> {
    /// A position outside the source leaves it unchanged.
    pub fn new(source: Box<dyn SequenceCursor<N>>, position: i64) -> Self {
        let position = usize::try_from(position).ok().filter(|p| *p >= 1);
        Self { source, position, seen: 0 }
    }
}

impl<N: XdmNode> SequenceCursor<N> for RemoveCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        loop {
            let item = self.source.next_item()?;
            self.seen += 1;
            if Some(self.seen) != self.position {
                return Some(item);
            }
        }
    }
    fn born_again(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(RemoveCursor { source: self.source.born_again(), position: self.position, seen: 0 })
    }
}

/// Several sources one after another.
pub struct ConcatCursor<N> {
    parts: Vec<Box<dyn SequenceCursor<N>>>,
    current: usize,
}

impl<N: XdmNode> ConcatCursor<N> {
    pub fn new(parts: Vec<Box<dyn SequenceCursor<N>>>) -> Self {
        Self { parts, current: 0 }
    }
}

impl<N: XdmNode> SequenceCursor<N> for ConcatCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        while let Some(part) = self.parts.get_mut(self.current) {
            if let Some(item) = part.next_item() {
                return Some(item);
            }
            self.current += 1;
        }
        None
    }
    fn born_again(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(ConcatCursor::new(self.parts.iter().map(|p| p.born_again()).collect()))
    }
}

/// Node union of two sources already in document order: a merge that emits
/// each node once.
pub struct UnionCursor<N> {
    left: Box<dyn SequenceCursor<N>>,
    right: Box<dyn SequenceCursor<N>>,
    left_head: Option<N>,
    right_head: Option<N>,
    primed: bool,
    last: Option<N>,
}

impl<N: XdmNode> UnionCursor<N> {
    pub fn new(left: Box<dyn SequenceCursor<N>>, right: Box<dyn SequenceCursor<N>>) -> Self {
        Self { left, right, left_head: None, right_head: None, primed: false, last: None }
    }
}

fn pull_node<N: XdmNode>(cursor: &mut dyn SequenceCursor<N>) -> Result<Option<N>, Error> {
    match cursor.next_item().transpose()? {
        None => Ok(None),
        Some(XdmItem::Node(n)) => Ok(Some(n)),
        Some(XdmItem::Atomic(a)) => Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!("union operand contains atomic value {a}"),
        )),
    }
}

impl<N: XdmNode> UnionCursor<N> {
    fn step(&mut self) -> Result<Option<N>, Error> {
        if !self.primed {
            self.left_head = pull_node(self.left.as_mut())?;
            self.right_head = pull_node(self.right.as_mut())?;
            self.primed = true;
        }
        loop {
            let next = match (self.left_head.take(), self.right_head.take()) {
                (None, None) => return Ok(None),
                (Some(l), None) => {
                    self.left_head = pull_node(self.left.as_mut())?;
                    l
                }
                (None, Some(r)) => {
                    self.right_head = pull_node(self.right.as_mut())?;
                    r
                }
                (Some(l), Some(r)) => match l.compare_document_order(&r)? {
                    core::cmp::Ordering::Greater => {
                        self.left_head = Some(l);
                        self.right_head = pull_node(self.right.as_mut())?;
                        r
                    }
                    core::cmp::Ordering::Less => {
                        self.right_head = Some(r);
                        self.left_head = pull_node(self.left.as_mut())?;
                        l
                    }
                    core::cmp::Ordering::Equal => {
                        self.left_head = pull_node(self.left.as_mut())?;
                        self.right_head = pull_node(self.right.as_mut())?;
                        l
                    }
                },
            };
            if self.last.as_ref() != Some(&next) {
                self.last = Some(next.clone());
                return Ok(Some(next));
            }
        }
    }
}

impl<N: XdmNode> SequenceCursor<N> for UnionCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        self.step().map(|n| n.map(XdmItem::Node)).transpose()
    }
    fn born_again(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(UnionCursor::new(self.left.born_again(), self.right.born_again()))
    }
}

/// Atomization of every item of the source.
pub struct AtomizingCursor<N> {
    source: Box<dyn SequenceCursor<N>>,
    pending: VecDeque<XdmAtomicValue>,
}

impl<N: XdmNode> AtomizingCursor<N> {
    pub fn new(source: Box<dyn SequenceCursor<N>>) -> Self {
        Self { source, pending: VecDeque::new() }
    }
}

impl<N: XdmNode> SequenceCursor<N> for AtomizingCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        loop {
            if let Some(v) = self.pending.pop_front() {
                return Some(Ok(XdmItem::Atomic(v)));
            }
            match self.source.next_item()? {
                Ok(XdmItem::Atomic(a)) => return Some(Ok(XdmItem::Atomic(a))),
                Ok(item) => self.pending.extend(item.atomize()),
                Err(e) => return Some(Err(e)),
            }
        }
    }
    fn born_again(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(AtomizingCursor::new(self.source.born_again()))
    }
}

/// `subsequence`: items at positions `p` with `round(start) <= p` and
/// `p < round(start) + round(length)`, rounding half up.
pub struct SubsequenceCursor<N> {
    source: Box<dyn SequenceCursor<N>>,
    first: f64,
    end: f64,
    position: f64,
}

fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

impl<N: XdmNode> SubsequenceCursor<N> {
    pub fn new(source: Box<dyn SequenceCursor<N>>, start: f64, length: Option<f64>) -> Self {
        let first = round_half_up(start);
        let end = length.map_or(f64::INFINITY, |l| first + round_half_up(l));
        Self { source, first, end, position: 0.0 }
    }
}

impl<N: XdmNode> SequenceCursor<N> for SubsequenceCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        // NaN bounds never admit a position.
        if self.first.is_nan() || self.end.is_nan() {
            return None;
        }
        loop {
            if self.position + 1.0 >= self.end {
                return None;
            }
            let item = self.source.next_item()?;
            self.position += 1.0;
            if item.is_err() || self.position >= self.first {
                return Some(item);
            }
        }
    }
    fn born_again(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(SubsequenceCursor { source: self.source.born_again(), first: self.first, end: self.end, position: 0.0 })
    }
}

pub fn distinct_values<N: XdmNode>(source: &XdmSequenceStream<N>, ctx: CompareContext) -> XdmSequenceStream<N> {
    XdmSequenceStream::new(Box::new(DistinctCursor::new(source.cursor(), ctx)))
}

pub fn insert_before<N: XdmNode>(
    source: &XdmSequenceStream<N>,
    position: i64,
    inserts: &XdmSequenceStream<N>,
) -> XdmSequenceStream<N> {
    XdmSequenceStream::new(Box::new(InsertBeforeCursor::new(source.cursor(), position, inserts.cursor())))
}

pub fn remove<N: XdmNode>(source: &XdmSequenceStream<N>, position: i64) -> XdmSequenceStream<N> {
    XdmSequenceStream::new(Box::new(RemoveCursor::new(source.cursor(), position)))
}

pub fn concat<N: XdmNode>(parts: &[XdmSequenceStream<N>]) -> XdmSequenceStream<N> {
    XdmSequenceStream::new(Box::new(ConcatCursor::new(parts.iter().map(XdmSequenceStream::cursor).collect())))
}

pub fn union<N: XdmNode>(left: &XdmSequenceStream<N>, right: &XdmSequenceStream<N>) -> XdmSequenceStream<N> {
    XdmSequenceStream::new(Box::new(UnionCursor::new(left.cursor(), right.cursor())))
}

pub fn atomize<N: XdmNode>(source: &XdmSequenceStream<N>) -> XdmSequenceStream<N> {
    XdmSequenceStream::new(Box::new(AtomizingCursor::new(source.cursor())))
}

pub fn subsequence<N: XdmNode>(source: &XdmSequenceStream<N>, start: f64, length: Option<f64>) -> XdmSequenceStream<N> {
    XdmSequenceStream::new(Box::new(SubsequenceCursor::new(source.cursor(), start, length)))
}
