//! Time-versioned list backed by an immutable order-statistics AA tree.

use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

use smallvec::SmallVec;

use super::aa::{AaNode, Lifespan, skew, split};
use super::view::ListView;
use crate::{DurableError, DurableResult, Timestamp, Value};

/// Deletion time of a slot that has never been deleted.
pub const MAX_TIME: Timestamp = Timestamp::MAX;

/// One slot of a [`VersionedList`] together with its subtree.
#[derive(Debug)]
pub(crate) struct ListNode {
    pub level: u32,
    /// Slots in this subtree, tombstones included.
    pub size: usize,
    pub created: Timestamp,
    pub deleted: Timestamp,
    pub value: Value,
    pub left: Option<Arc<ListNode>>,
    pub right: Option<Arc<ListNode>>,
    span: Lifespan,
}

fn size_of(node: Option<&Arc<ListNode>>) -> usize {
    node.map_or(0, |n| n.size)
}

fn span_of(node: Option<&Arc<ListNode>>) -> Lifespan {
    node.map_or(Lifespan::EMPTY, |n| n.span)
}

impl ListNode {
    pub(crate) fn new(
        level: u32,
        created: Timestamp,
        deleted: Timestamp,
        value: Value,
        left: Option<Arc<Self>>,
        right: Option<Arc<Self>>,
    ) -> Arc<Self> {
        let size = 1 + size_of(left.as_ref()) + size_of(right.as_ref());
        let span = Lifespan::slot(created, deleted)
            .merge(span_of(left.as_ref()))
            .merge(span_of(right.as_ref()));
        Arc::new(Self {
            level,
            size,
            created,
            deleted,
            value,
            left,
            right,
            span,
        })
    }

    pub(crate) const fn is_present(&self, time: Timestamp) -> bool {
        self.created <= time && time < self.deleted
    }

    fn left_size(&self) -> usize {
        size_of(self.left.as_ref())
    }

    fn with_children(&self, left: Option<Arc<Self>>, right: Option<Arc<Self>>) -> Arc<Self> {
        self.relink(self.level, left, right)
    }

    fn with_deleted(&self, deleted: Timestamp) -> Arc<Self> {
        Self::new(
            self.level,
            self.created,
            deleted,
            self.value.clone(),
            self.left.clone(),
            self.right.clone(),
        )
    }
}

impl AaNode for ListNode {
    fn level(&self) -> u32 {
        self.level
    }

    fn left(&self) -> Option<&Arc<Self>> {
        self.left.as_ref()
    }

    fn right(&self) -> Option<&Arc<Self>> {
        self.right.as_ref()
    }

    fn relink(&self, level: u32, left: Option<Arc<Self>>, right: Option<Arc<Self>>) -> Arc<Self> {
        Self::new(
            level,
            self.created,
            self.deleted,
            self.value.clone(),
            left,
            right,
        )
    }
}

/// A slot waiting to be placed by [`VersionedList::insert`].
struct NewSlot {
    value: Value,
    created: Timestamp,
    deleted: Timestamp,
}

fn insert_at(node: Option<&Arc<ListNode>>, index: usize, slot: NewSlot) -> Arc<ListNode> {
    let Some(n) = node else {
        return ListNode::new(1, slot.created, slot.deleted, slot.value, None, None);
    };

    let left_size = n.left_size();
    let rebuilt = if index <= left_size {
        n.with_children(Some(insert_at(n.left.as_ref(), index, slot)), n.right.clone())
    } else {
        n.with_children(
            n.left.clone(),
            Some(insert_at(n.right.as_ref(), index - left_size - 1, slot)),
        )
    };
    split(skew(rebuilt))
}

fn mark_at(n: &Arc<ListNode>, index: usize, at: Timestamp) -> Arc<ListNode> {
    let left_size = n.left_size();
    match index.cmp(&left_size) {
        Ordering::Equal => n.with_deleted(at),
        Ordering::Less => match &n.left {
            Some(left) => n.with_children(Some(mark_at(left, index, at)), n.right.clone()),
            None => Arc::clone(n),
        },
        Ordering::Greater => match &n.right {
            Some(right) => n.with_children(
                n.left.clone(),
                Some(mark_at(right, index - left_size - 1, at)),
            ),
            None => Arc::clone(n),
        },
    }
}

fn same_link(a: Option<&Arc<ListNode>>, b: Option<&Arc<ListNode>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn clear_node(n: &Arc<ListNode>, at: Timestamp) -> Arc<ListNode> {
    if !n.span.may_contain(at) {
        return Arc::clone(n);
    }

    let left = n.left.as_ref().map(|l| clear_node(l, at));
    let right = n.right.as_ref().map(|r| clear_node(r, at));
    let deleted = if n.is_present(at) { at } else { n.deleted };

    if deleted == n.deleted
        && same_link(left.as_ref(), n.left.as_ref())
        && same_link(right.as_ref(), n.right.as_ref())
    {
        return Arc::clone(n);
    }
    ListNode::new(n.level, n.created, deleted, n.value.clone(), left, right)
}

/// Smallest index `>= from` present at `time`. `offset` is the index of the
/// subtree's first slot.
fn lowest_from(
    node: Option<&Arc<ListNode>>,
    offset: usize,
    from: usize,
    time: Timestamp,
) -> Option<usize> {
    let n = node?;
    if !n.span.may_contain(time) || offset + n.size <= from {
        return None;
    }

    let here = offset + n.left_size();
    if from < here {
        if let Some(found) = lowest_from(n.left.as_ref(), offset, from, time) {
            return Some(found);
        }
    }
    if here >= from && n.is_present(time) {
        return Some(here);
    }
    lowest_from(n.right.as_ref(), here + 1, from, time)
}

/// Largest index `<= upto` present at `time`.
fn highest_upto(
    node: Option<&Arc<ListNode>>,
    offset: usize,
    upto: usize,
    time: Timestamp,
) -> Option<usize> {
    let n = node?;
    if !n.span.may_contain(time) || offset > upto {
        return None;
    }

    let here = offset + n.left_size();
    if here < upto {
        if let Some(found) = highest_upto(n.right.as_ref(), here + 1, upto, time) {
            return Some(found);
        }
    }
    if here <= upto && n.is_present(time) {
        return Some(here);
    }
    highest_upto(n.left.as_ref(), offset, upto, time)
}

fn count_visible(node: Option<&Arc<ListNode>>, time: Timestamp) -> usize {
    match node {
        Some(n) if n.span.may_contain(time) => {
            usize::from(n.is_present(time))
                + count_visible(n.left.as_ref(), time)
                + count_visible(n.right.as_ref(), time)
        }
        _ => 0,
    }
}

/// In-order walk yielding `(index, node)`, optionally restricted to slots
/// present at one time.
#[derive(Clone)]
pub(crate) struct InOrder<'a> {
    /// Nodes whose left subtree is done, with the index of their subtree's
    /// first slot.
    stack: SmallVec<[(&'a ListNode, usize); 32]>,
    time: Option<Timestamp>,
}

impl<'a> InOrder<'a> {
    pub(crate) fn new(root: Option<&'a Arc<ListNode>>, time: Option<Timestamp>) -> Self {
        let mut walk = Self {
            stack: SmallVec::new(),
            time,
        };
        walk.descend(root, 0);
        walk
    }

    fn descend(&mut self, mut node: Option<&'a Arc<ListNode>>, offset: usize) {
        while let Some(n) = node {
            if self.time.is_some_and(|t| !n.span.may_contain(t)) {
                break;
            }
            self.stack.push((&**n, offset));
            node = n.left.as_ref();
        }
    }
}

impl<'a> Iterator for InOrder<'a> {
    type Item = (usize, &'a ListNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((n, offset)) = self.stack.pop() {
            let index = offset + n.left_size();
            self.descend(n.right.as_ref(), index + 1);
            if self.time.is_none_or(|t| n.is_present(t)) {
                return Some((index, n));
            }
        }
        None
    }
}

impl FusedIterator for InOrder<'_> {}

/// The values of a list present at one time, in index order.
///
/// Lazy and finite. Clone it, or ask the list again, to restart.
#[derive(Clone)]
pub struct Snapshot<'a> {
    walk: InOrder<'a>,
}

impl<'a> Iterator for Snapshot<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        self.walk.next().map(|(_, n)| &n.value)
    }
}

impl FusedIterator for Snapshot<'_> {}

impl fmt::Debug for Snapshot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

/// An immutable list of timestamped value slots.
///
/// Slots are addressed by their position among *all* slots ever inserted,
/// so tombstoning a slot never shifts another slot's index. A slot is
/// present at time `t` iff `created <= t < deleted`.
///
/// Every update returns a new list; the receiver is left untouched and
/// shares all unchanged subtrees with the result.
///
/// ```
/// use vcow_immutable::{Value, VersionedList};
///
/// let list = VersionedList::new().append(Value::Int(1), 1).append(Value::Int(2), 2);
/// let list = list.mark_deleted(0, 3).unwrap();
///
/// assert_eq!(list.snapshot_at(2).count(), 2);
/// assert_eq!(list.snapshot_at(3).collect::<Vec<_>>(), [&Value::Int(2)]);
/// assert_eq!(list.total_count(), 2);
/// ```
#[derive(Clone, Default)]
pub struct VersionedList {
    root: Option<Arc<ListNode>>,
}

impl VersionedList {
    /// The empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None }
    }

    pub(crate) const fn from_root(root: Option<Arc<ListNode>>) -> Self {
        Self { root }
    }

    pub(crate) fn root(&self) -> Option<&Arc<ListNode>> {
        self.root.as_ref()
    }

    pub(crate) fn span(&self) -> Lifespan {
        span_of(self.root.as_ref())
    }

    /// Whether no slot was ever inserted.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        self.root.is_none()
    }

    /// Number of slots ever inserted, tombstones included.
    #[must_use]
    pub fn total_count(&self) -> usize {
        size_of(self.root.as_ref())
    }

    /// Insert a slot at `index` among all slots, `0..=total_count()`.
    pub fn insert(
        &self,
        index: usize,
        value: Value,
        created: Timestamp,
        deleted: Timestamp,
    ) -> DurableResult<Self> {
        if deleted < created {
            return Err(DurableError::InvalidLifespan { created, deleted });
        }
        let total = self.total_count();
        if index > total {
            return Err(DurableError::IndexOutOfRange { index, total });
        }

        let slot = NewSlot {
            value,
            created,
            deleted,
        };
        Ok(Self::from_root(Some(insert_at(
            self.root.as_ref(),
            index,
            slot,
        ))))
    }

    /// Insert a never-deleted slot after every existing slot.
    #[must_use]
    pub fn append(&self, value: Value, created: Timestamp) -> Self {
        let slot = NewSlot {
            value,
            created,
            deleted: MAX_TIME,
        };
        Self::from_root(Some(insert_at(
            self.root.as_ref(),
            self.total_count(),
            slot,
        )))
    }

    /// Tombstone the slot at `index` as of `at`.
    ///
    /// A slot that is not present at `at` is left as it is.
    pub fn mark_deleted(&self, index: usize, at: Timestamp) -> DurableResult<Self> {
        let total = self.total_count();
        let Some(root) = self.root.as_ref().filter(|_| index < total) else {
            return Err(DurableError::IndexOutOfRange { index, total });
        };

        match self.node_at(index) {
            Some(node) if node.is_present(at) => Ok(Self::from_root(Some(mark_at(root, index, at)))),
            _ => Ok(self.clone()),
        }
    }

    /// Tombstone every slot present at `at`.
    #[must_use]
    pub fn clear(&self, at: Timestamp) -> Self {
        Self::from_root(self.root.as_ref().map(|r| clear_node(r, at)))
    }

    fn node_at(&self, mut index: usize) -> Option<&ListNode> {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            let left_size = n.left_size();
            match index.cmp(&left_size) {
                Ordering::Less => node = n.left.as_deref(),
                Ordering::Equal => return Some(n),
                Ordering::Greater => {
                    index -= left_size + 1;
                    node = n.right.as_deref();
                }
            }
        }
        None
    }

    /// The value at `index` if that slot is present at `time`.
    #[must_use]
    pub fn value_at(&self, index: usize, time: Timestamp) -> Option<&Value> {
        self.node_at(index)
            .filter(|n| n.is_present(time))
            .map(|n| &n.value)
    }

    /// Creation and deletion time of the slot at `index`.
    #[must_use]
    pub fn lifespan_of(&self, index: usize) -> Option<(Timestamp, Timestamp)> {
        self.node_at(index).map(|n| (n.created, n.deleted))
    }

    /// Smallest index `> index` present at `time`.
    #[must_use]
    pub fn higher_index(&self, index: usize, time: Timestamp) -> Option<usize> {
        lowest_from(self.root.as_ref(), 0, index.checked_add(1)?, time)
    }

    /// Smallest index `>= index` present at `time`.
    #[must_use]
    pub fn ceiling_index(&self, index: usize, time: Timestamp) -> Option<usize> {
        lowest_from(self.root.as_ref(), 0, index, time)
    }

    /// Largest index `< index` present at `time`.
    #[must_use]
    pub fn lower_index(&self, index: usize, time: Timestamp) -> Option<usize> {
        highest_upto(self.root.as_ref(), 0, index.checked_sub(1)?, time)
    }

    /// Largest index `<= index` present at `time`.
    #[must_use]
    pub fn floor_index(&self, index: usize, time: Timestamp) -> Option<usize> {
        highest_upto(self.root.as_ref(), 0, index, time)
    }

    #[must_use]
    pub fn first_index(&self, time: Timestamp) -> Option<usize> {
        self.ceiling_index(0, time)
    }

    #[must_use]
    pub fn last_index(&self, time: Timestamp) -> Option<usize> {
        self.floor_index(usize::MAX, time)
    }

    /// Number of slots present at `time`.
    #[must_use]
    pub fn count_visible(&self, time: Timestamp) -> usize {
        count_visible(self.root.as_ref(), time)
    }

    #[must_use]
    pub fn is_empty_at(&self, time: Timestamp) -> bool {
        self.first_index(time).is_none()
    }

    /// Values present at `time`, in index order.
    #[must_use]
    pub fn snapshot_at(&self, time: Timestamp) -> Snapshot<'_> {
        Snapshot {
            walk: InOrder::new(self.root.as_ref(), Some(time)),
        }
    }

    /// `(index, value)` pairs present at `time`.
    pub fn entries_at(&self, time: Timestamp) -> impl Iterator<Item = (usize, &Value)> + Clone {
        InOrder::new(self.root.as_ref(), Some(time)).map(|(i, n)| (i, &n.value))
    }

    /// First index present at `time` holding `value`.
    #[must_use]
    pub fn find_index(&self, value: &Value, time: Timestamp) -> Option<usize> {
        self.entries_at(time)
            .find(|(_, v)| *v == value)
            .map(|(i, _)| i)
    }

    /// Last index present at `time` holding `value`.
    #[must_use]
    pub fn find_index_right(&self, value: &Value, time: Timestamp) -> Option<usize> {
        let mut index = self.last_index(time);
        while let Some(i) = index {
            if self.value_at(i, time) == Some(value) {
                return Some(i);
            }
            index = self.lower_index(i, time);
        }
        None
    }

    /// Read accessor bound to `time`.
    #[must_use]
    pub const fn view(&self, time: Timestamp) -> ListView<'_> {
        ListView::new(self, time)
    }

    /// Every slot as `(created, deleted, value)`, tombstones included.
    pub fn history(&self) -> impl Iterator<Item = (Timestamp, Timestamp, &Value)> {
        InOrder::new(self.root.as_ref(), None).map(|(_, n)| (n.created, n.deleted, &n.value))
    }
}

impl PartialEq for VersionedList {
    fn eq(&self, other: &Self) -> bool {
        if same_link(self.root.as_ref(), other.root.as_ref()) {
            return true;
        }
        self.total_count() == other.total_count() && self.history().eq(other.history())
    }
}

impl fmt::Debug for VersionedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.history()).finish()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::collections::aa::check_balanced;

    fn ints(values: &[i32]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    fn snapshot(list: &VersionedList, time: Timestamp) -> Vec<Value> {
        list.snapshot_at(time).cloned().collect()
    }

    #[test]
    fn test_insert_positions() {
        let list = VersionedList::new()
            .insert(0, Value::Int(2), 1, MAX_TIME)
            .unwrap()
            .insert(0, Value::Int(1), 1, MAX_TIME)
            .unwrap()
            .insert(2, Value::Int(4), 1, MAX_TIME)
            .unwrap()
            .insert(2, Value::Int(3), 1, MAX_TIME)
            .unwrap();

        assert_eq!(snapshot(&list, 1), ints(&[1, 2, 3, 4]));
        assert_eq!(list.total_count(), 4);
    }

    #[test]
    fn test_insert_out_of_range() {
        let list = VersionedList::new().append(Value::Int(1), 0);
        let err = list.insert(2, Value::Int(2), 0, MAX_TIME).unwrap_err();
        assert!(matches!(err, DurableError::IndexOutOfRange { index: 2, total: 1 }));
    }

    #[test]
    fn test_insert_rejects_inverted_lifespan() {
        let err = VersionedList::new()
            .insert(0, Value::Int(1), 5, 4)
            .unwrap_err();
        assert!(matches!(
            err,
            DurableError::InvalidLifespan {
                created: 5,
                deleted: 4
            }
        ));
    }

    #[test]
    fn test_presence_boundaries() {
        let list = VersionedList::new()
            .insert(0, Value::Int(7), 5, 10)
            .unwrap();

        assert_eq!(list.value_at(0, 4), None);
        assert_eq!(list.value_at(0, 5), Some(&Value::Int(7)));
        assert_eq!(list.value_at(0, 9), Some(&Value::Int(7)));
        assert_eq!(list.value_at(0, 10), None);
        assert_eq!(list.value_at(1, 5), None);
    }

    #[test]
    fn test_mark_deleted_keeps_indices() {
        let list = VersionedList::new()
            .append(Value::Int(0), 1)
            .append(Value::Int(1), 1)
            .append(Value::Int(2), 1);
        let deleted = list.mark_deleted(1, 3).unwrap();

        assert_eq!(deleted.total_count(), 3);
        assert_eq!(deleted.value_at(2, 3), Some(&Value::Int(2)));
        assert_eq!(deleted.value_at(1, 2), Some(&Value::Int(1)));
        assert_eq!(deleted.value_at(1, 3), None);
        assert_eq!(snapshot(&deleted, 3), ints(&[0, 2]));

        // The original is untouched.
        assert_eq!(snapshot(&list, 3), ints(&[0, 1, 2]));
    }

    #[test]
    fn test_mark_deleted_of_absent_slot_is_noop() {
        let list = VersionedList::new().insert(0, Value::Int(1), 5, 8).unwrap();

        let before = list.mark_deleted(0, 4).unwrap();
        let after = list.mark_deleted(0, 9).unwrap();
        assert_eq!(before.lifespan_of(0), Some((5, 8)));
        assert_eq!(after.lifespan_of(0), Some((5, 8)));

        let err = list.mark_deleted(1, 6).unwrap_err();
        assert!(matches!(err, DurableError::IndexOutOfRange { index: 1, total: 1 }));
    }

    #[test]
    fn test_clear_tombstones_visible_slots_only() {
        let list = VersionedList::new()
            .insert(0, Value::Int(1), 1, 2)
            .unwrap()
            .append(Value::Int(2), 1)
            .append(Value::Int(3), 6);
        let cleared = list.clear(4);

        assert_eq!(cleared.lifespan_of(0), Some((1, 2)));
        assert_eq!(cleared.lifespan_of(1), Some((1, 4)));
        assert_eq!(cleared.lifespan_of(2), Some((6, MAX_TIME)));
        assert!(cleared.is_empty_at(4));
        assert_eq!(snapshot(&cleared, 6), ints(&[3]));
        assert_eq!(snapshot(&cleared, 3), ints(&[2]));
    }

    #[test]
    fn test_clear_without_visible_slots_shares_root() {
        let list = VersionedList::new().insert(0, Value::Int(1), 5, 8).unwrap();
        let cleared = list.clear(9);
        assert!(same_link(list.root(), cleared.root()));
    }

    #[test]
    fn test_navigation() {
        // Present at t=5: indices 1, 3, 4.
        let list = VersionedList::new()
            .insert(0, Value::Int(0), 1, 3)
            .unwrap()
            .append(Value::Int(1), 1)
            .insert(2, Value::Int(2), 6, MAX_TIME)
            .unwrap()
            .append(Value::Int(3), 2)
            .append(Value::Int(4), 5);

        assert_eq!(list.first_index(5), Some(1));
        assert_eq!(list.last_index(5), Some(4));
        assert_eq!(list.higher_index(1, 5), Some(3));
        assert_eq!(list.higher_index(4, 5), None);
        assert_eq!(list.ceiling_index(2, 5), Some(3));
        assert_eq!(list.ceiling_index(3, 5), Some(3));
        assert_eq!(list.lower_index(3, 5), Some(1));
        assert_eq!(list.lower_index(1, 5), None);
        assert_eq!(list.lower_index(0, 5), None);
        assert_eq!(list.floor_index(2, 5), Some(1));
        assert_eq!(list.floor_index(100, 5), Some(4));
        assert_eq!(list.count_visible(5), 3);
        assert_eq!(list.count_visible(0), 0);
        assert!(list.is_empty_at(0));
    }

    #[test]
    fn test_find_index() {
        let list = VersionedList::new()
            .append(Value::from("a"), 1)
            .append(Value::from("b"), 1)
            .append(Value::from("a"), 1)
            .append(Value::from("a"), 3);

        let a = Value::from("a");
        assert_eq!(list.find_index(&a, 1), Some(0));
        assert_eq!(list.find_index_right(&a, 1), Some(2));
        assert_eq!(list.find_index_right(&a, 3), Some(3));
        assert_eq!(list.find_index(&Value::from("c"), 3), None);

        let list = list.mark_deleted(0, 2).unwrap();
        assert_eq!(list.find_index(&a, 2), Some(2));
    }

    #[test]
    fn test_snapshot_is_restartable() {
        let list = VersionedList::new()
            .append(Value::Int(1), 1)
            .append(Value::Int(2), 2);
        let snap = list.snapshot_at(2);

        assert_eq!(snap.clone().count(), 2);
        assert_eq!(snap.cloned().collect::<Vec<_>>(), ints(&[1, 2]));
    }

    #[test]
    fn test_equality_ignores_shape() {
        let appended = VersionedList::new()
            .append(Value::Int(1), 1)
            .append(Value::Int(2), 1)
            .append(Value::Int(3), 1);
        let prepended = VersionedList::new()
            .insert(0, Value::Int(3), 1, MAX_TIME)
            .unwrap()
            .insert(0, Value::Int(2), 1, MAX_TIME)
            .unwrap()
            .insert(0, Value::Int(1), 1, MAX_TIME)
            .unwrap();

        assert_eq!(appended, prepended);
        assert_ne!(appended, appended.clear(2));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert { at: usize, created: i64, lifetime: Option<i64> },
        Delete { at: usize, time: i64 },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<usize>(), 0i64..50, proptest::option::of(0i64..20)).prop_map(
                |(at, created, lifetime)| Op::Insert {
                    at,
                    created,
                    lifetime
                }
            ),
            (any::<usize>(), 0i64..70).prop_map(|(at, time)| Op::Delete { at, time }),
        ]
    }

    /// Flat model: `(created, deleted, value)` per slot.
    fn apply(ops: &[Op]) -> (VersionedList, Vec<(i64, i64, i32)>) {
        let mut list = VersionedList::new();
        let mut model = Vec::new();
        for (n, op) in ops.iter().enumerate() {
            let value = i32::try_from(n).unwrap();
            match *op {
                Op::Insert {
                    at,
                    created,
                    lifetime,
                } => {
                    let index = at % (model.len() + 1);
                    let deleted = lifetime.map_or(MAX_TIME, |l| created + l);
                    list = list
                        .insert(index, Value::Int(value), created, deleted)
                        .unwrap();
                    model.insert(index, (created, deleted, value));
                }
                Op::Delete { at, time } => {
                    if model.is_empty() {
                        continue;
                    }
                    let index = at % model.len();
                    list = list.mark_deleted(index, time).unwrap();
                    let slot = &mut model[index];
                    if slot.0 <= time && time < slot.1 {
                        slot.1 = time;
                    }
                }
            }
        }
        (list, model)
    }

    proptest! {
        #[test]
        fn prop_stays_balanced(ops in proptest::collection::vec(op(), 0..200)) {
            let (list, model) = apply(&ops);
            prop_assert_eq!(list.total_count(), model.len());
            if let Err(violation) = check_balanced(list.root()) {
                return Err(TestCaseError::fail(violation));
            }
        }

        #[test]
        fn prop_matches_model_at_every_time(ops in proptest::collection::vec(op(), 0..80)) {
            let (list, model) = apply(&ops);
            for time in 0..75 {
                let expected: Vec<Value> = model
                    .iter()
                    .filter(|(c, d, _)| *c <= time && time < *d)
                    .map(|(_, _, v)| Value::Int(*v))
                    .collect();
                prop_assert_eq!(snapshot(&list, time), expected.clone());
                prop_assert_eq!(list.count_visible(time), expected.len());

                for (index, (c, d, v)) in model.iter().enumerate() {
                    let present = *c <= time && time < *d;
                    let value = Value::Int(*v);
                    prop_assert_eq!(list.value_at(index, time), present.then_some(&value));
                }
            }
        }

        #[test]
        fn prop_navigation_matches_scan(ops in proptest::collection::vec(op(), 0..60), time in 0i64..70) {
            let (list, model) = apply(&ops);
            let present: Vec<usize> = model
                .iter()
                .enumerate()
                .filter(|(_, (c, d, _))| *c <= time && time < *d)
                .map(|(i, _)| i)
                .collect();

            for index in 0..=model.len() {
                prop_assert_eq!(list.ceiling_index(index, time), present.iter().copied().find(|&i| i >= index));
                prop_assert_eq!(list.higher_index(index, time), present.iter().copied().find(|&i| i > index));
                prop_assert_eq!(list.floor_index(index, time), present.iter().copied().rev().find(|&i| i <= index));
                prop_assert_eq!(list.lower_index(index, time), present.iter().copied().rev().find(|&i| i < index));
            }
        }

        #[test]
        fn prop_updates_leave_original_intact(ops in proptest::collection::vec(op(), 1..60), time in 0i64..70) {
            let (list, _) = apply(&ops);
            let before: Vec<_> = list.history().map(|(c, d, v)| (c, d, v.clone())).collect();

            let _ = list.append(Value::Null, time);
            let _ = list.clear(time);
            let _ = list.mark_deleted(0, time).unwrap();

            let after: Vec<_> = list.history().map(|(c, d, v)| (c, d, v.clone())).collect();
            prop_assert_eq!(before, after);
        }
    }
}
