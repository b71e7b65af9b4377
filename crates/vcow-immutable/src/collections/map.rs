//! Time-versioned map: an immutable AA tree ordered by key whose entries
//! each hold the [`VersionedList`] history of one key.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::iter::FusedIterator;
use std::ops::Bound;
use std::sync::Arc;

use smallvec::SmallVec;

use super::aa::{AaNode, Lifespan, skew, split};
use super::list::MAX_TIME;
use super::view::{ListView, MapView};
use crate::{DurableError, DurableResult, Timestamp, Value, VersionedList};

#[derive(Debug)]
pub(crate) struct MapNode {
    pub level: u32,
    pub key: Arc<str>,
    pub list: VersionedList,
    pub left: Option<Arc<MapNode>>,
    pub right: Option<Arc<MapNode>>,
    /// Keys in this subtree.
    count: usize,
    /// Union of the lifespans of every list in this subtree.
    span: Lifespan,
}

fn count_of(node: Option<&Arc<MapNode>>) -> usize {
    node.map_or(0, |n| n.count)
}

fn span_of(node: Option<&Arc<MapNode>>) -> Lifespan {
    node.map_or(Lifespan::EMPTY, |n| n.span)
}

impl MapNode {
    pub(crate) fn new(
        level: u32,
        key: Arc<str>,
        list: VersionedList,
        left: Option<Arc<Self>>,
        right: Option<Arc<Self>>,
    ) -> Arc<Self> {
        let count = 1 + count_of(left.as_ref()) + count_of(right.as_ref());
        let span = list
            .span()
            .merge(span_of(left.as_ref()))
            .merge(span_of(right.as_ref()));
        Arc::new(Self {
            level,
            key,
            list,
            left,
            right,
            count,
            span,
        })
    }

    fn with_list(&self, list: VersionedList) -> Arc<Self> {
        Self::new(
            self.level,
            Arc::clone(&self.key),
            list,
            self.left.clone(),
            self.right.clone(),
        )
    }

    fn is_visible(&self, time: Timestamp) -> bool {
        !self.list.is_empty_at(time)
    }
}

impl AaNode for MapNode {
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
        Self::new(level, Arc::clone(&self.key), self.list.clone(), left, right)
    }
}

/// Replace the list under `key`, creating the entry when it is missing.
fn update_at<F>(node: Option<&Arc<MapNode>>, key: &str, update: F) -> DurableResult<Arc<MapNode>>
where
    F: FnOnce(&VersionedList) -> DurableResult<VersionedList>,
{
    let Some(n) = node else {
        let list = update(&VersionedList::new())?;
        return Ok(MapNode::new(1, Arc::from(key), list, None, None));
    };

    let rebuilt = match key.cmp(&*n.key) {
        Ordering::Equal => return Ok(n.with_list(update(&n.list)?)),
        Ordering::Less => n.relink(
            n.level,
            Some(update_at(n.left.as_ref(), key, update)?),
            n.right.clone(),
        ),
        Ordering::Greater => n.relink(
            n.level,
            n.left.clone(),
            Some(update_at(n.right.as_ref(), key, update)?),
        ),
    };
    Ok(split(skew(rebuilt)))
}

fn clear_all(n: &Arc<MapNode>, at: Timestamp) -> Arc<MapNode> {
    if !n.span.may_contain(at) {
        return Arc::clone(n);
    }
    let left = n.left.as_ref().map(|l| clear_all(l, at));
    let right = n.right.as_ref().map(|r| clear_all(r, at));
    MapNode::new(n.level, Arc::clone(&n.key), n.list.clear(at), left, right)
}

/// Rebuild the path to an existing `key` around a new list. Returns `None`
/// when the key is missing. The tree shape does not change.
fn replace_at<F>(n: &Arc<MapNode>, key: &str, update: F) -> Option<Arc<MapNode>>
where
    F: FnOnce(&VersionedList) -> VersionedList,
{
    match key.cmp(&*n.key) {
        Ordering::Equal => Some(n.with_list(update(&n.list))),
        Ordering::Less => {
            let left = replace_at(n.left.as_ref()?, key, update)?;
            Some(n.relink(n.level, Some(left), n.right.clone()))
        }
        Ordering::Greater => {
            let right = replace_at(n.right.as_ref()?, key, update)?;
            Some(n.relink(n.level, n.left.clone(), Some(right)))
        }
    }
}

fn find<'a>(mut node: Option<&'a Arc<MapNode>>, key: &str) -> Option<&'a Arc<MapNode>> {
    while let Some(n) = node {
        node = match key.cmp(&*n.key) {
            Ordering::Less => n.left.as_ref(),
            Ordering::Equal => return Some(n),
            Ordering::Greater => n.right.as_ref(),
        };
    }
    None
}

fn above(key: &str, bound: Bound<&str>) -> bool {
    match bound {
        Bound::Unbounded => true,
        Bound::Included(k) => key >= k,
        Bound::Excluded(k) => key > k,
    }
}

fn below(key: &str, bound: Bound<&str>) -> bool {
    match bound {
        Bound::Unbounded => true,
        Bound::Included(k) => key <= k,
        Bound::Excluded(k) => key < k,
    }
}

/// Smallest key within `bound` that is visible at `time`.
fn lowest<'a>(
    node: Option<&'a Arc<MapNode>>,
    bound: Bound<&str>,
    time: Timestamp,
) -> Option<&'a Arc<MapNode>> {
    let n = node?;
    if !n.span.may_contain(time) {
        return None;
    }
    if above(&n.key, bound) {
        if let Some(found) = lowest(n.left.as_ref(), bound, time) {
            return Some(found);
        }
        if n.is_visible(time) {
            return Some(n);
        }
    }
    lowest(n.right.as_ref(), bound, time)
}

/// Largest key within `bound` that is visible at `time`.
fn highest<'a>(
    node: Option<&'a Arc<MapNode>>,
    bound: Bound<&str>,
    time: Timestamp,
) -> Option<&'a Arc<MapNode>> {
    let n = node?;
    if !n.span.may_contain(time) {
        return None;
    }
    if below(&n.key, bound) {
        if let Some(found) = highest(n.right.as_ref(), bound, time) {
            return Some(found);
        }
        if n.is_visible(time) {
            return Some(n);
        }
    }
    highest(n.left.as_ref(), bound, time)
}

fn visible_keys(node: Option<&Arc<MapNode>>, time: Timestamp) -> usize {
    match node {
        Some(n) if n.span.may_contain(time) => {
            usize::from(n.is_visible(time))
                + visible_keys(n.left.as_ref(), time)
                + visible_keys(n.right.as_ref(), time)
        }
        _ => 0,
    }
}

/// In-order walk over every entry, tombstoned or not.
struct Entries<'a> {
    stack: SmallVec<[&'a MapNode; 32]>,
    time: Option<Timestamp>,
}

impl<'a> Entries<'a> {
    fn new(root: Option<&'a Arc<MapNode>>, time: Option<Timestamp>) -> Self {
        let mut walk = Self {
            stack: SmallVec::new(),
            time,
        };
        walk.descend(root);
        walk
    }

    fn descend(&mut self, mut node: Option<&'a Arc<MapNode>>) {
        while let Some(n) = node {
            if self.time.is_some_and(|t| !n.span.may_contain(t)) {
                break;
            }
            self.stack.push(&**n);
            node = n.left.as_ref();
        }
    }
}

impl<'a> Iterator for Entries<'a> {
    type Item = &'a MapNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(n) = self.stack.pop() {
            self.descend(n.right.as_ref());
            if self.time.is_none_or(|t| n.is_visible(t)) {
                return Some(n);
            }
        }
        None
    }
}

/// Visible `(key, list)` pairs of a map at one time, in key order.
///
/// Each step is one `higher_key` descent.
#[derive(Clone)]
pub struct MapIter<'a> {
    map: &'a VersionedMap,
    time: Timestamp,
    next: Option<&'a Arc<MapNode>>,
}

impl<'a> Iterator for MapIter<'a> {
    type Item = (&'a str, ListView<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = lowest(
            self.map.root.as_ref(),
            Bound::Excluded(&*current.key),
            self.time,
        );
        Some((&*current.key, current.list.view(self.time)))
    }
}

impl FusedIterator for MapIter<'_> {}

impl fmt::Debug for MapIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapIter")
            .field("time", &self.time)
            .field("next", &self.next.map(|n| &*n.key))
            .finish()
    }
}

/// An immutable map from string keys to [`VersionedList`] histories.
///
/// A key is never physically removed: removing or clearing tombstones slots
/// in its list, so earlier-time queries still see it. A key counts as
/// present at time `t` when its list has a slot present at `t`.
///
/// ```
/// use vcow_immutable::{Value, VersionedMap};
///
/// let map = VersionedMap::new()
///     .add("x", Value::Int(1), 1)
///     .unwrap()
///     .add("x", Value::Int(2), 2)
///     .unwrap();
///
/// let at = |t| map.list("x").unwrap().snapshot_at(t).cloned().collect::<Vec<_>>();
/// assert_eq!(at(1), [Value::Int(1)]);
/// assert_eq!(at(2), [Value::Int(1), Value::Int(2)]);
/// ```
#[derive(Clone, Default)]
pub struct VersionedMap {
    root: Option<Arc<MapNode>>,
}

impl VersionedMap {
    /// The empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None }
    }

    pub(crate) const fn from_root(root: Option<Arc<MapNode>>) -> Self {
        Self { root }
    }

    pub(crate) fn root(&self) -> Option<&Arc<MapNode>> {
        self.root.as_ref()
    }

    /// Whether no key was ever inserted.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        self.root.is_none()
    }

    fn update<F>(&self, key: &str, update: F) -> DurableResult<Self>
    where
        F: FnOnce(&VersionedList) -> DurableResult<VersionedList>,
    {
        Ok(Self::from_root(Some(update_at(self.root.as_ref(), key, update)?)))
    }

    /// Insert a slot into the list under `key`, creating the key if needed.
    ///
    /// A null value is only accepted for a slot that is already deleted
    /// (`deleted < MAX_TIME`).
    pub fn insert(
        &self,
        key: &str,
        index: usize,
        value: Value,
        created: Timestamp,
        deleted: Timestamp,
    ) -> DurableResult<Self> {
        if value.is_null() && deleted == MAX_TIME {
            return Err(DurableError::NullValue);
        }
        self.update(key, |list| list.insert(index, value, created, deleted))
    }

    /// Append a live slot to the list under `key`.
    pub fn add(&self, key: &str, value: Value, created: Timestamp) -> DurableResult<Self> {
        let index = self.total_count(key);
        self.insert(key, index, value, created, MAX_TIME)
    }

    /// Replace everything visible under `key` at `time` with one value.
    pub fn set(&self, key: &str, value: Value, time: Timestamp) -> DurableResult<Self> {
        if value.is_null() {
            return Err(DurableError::NullValue);
        }
        self.update(key, |list| Ok(list.clear(time).append(value, time)))
    }

    /// Tombstone slot `index` of the list under `key` as of `at`.
    ///
    /// A missing key is left alone.
    pub fn remove(&self, key: &str, index: usize, at: Timestamp) -> DurableResult<Self> {
        if find(self.root.as_ref(), key).is_none() {
            return Ok(self.clone());
        }
        self.update(key, |list| list.mark_deleted(index, at))
    }

    /// Tombstone every slot under `key` visible at `at`.
    #[must_use]
    pub fn clear_list(&self, key: &str, at: Timestamp) -> Self {
        self.root
            .as_ref()
            .and_then(|root| replace_at(root, key, |list| list.clear(at)))
            .map_or_else(|| self.clone(), |root| Self::from_root(Some(root)))
    }

    /// Tombstone every slot of every key visible at `at`.
    #[must_use]
    pub fn clear_map(&self, at: Timestamp) -> Self {
        Self::from_root(self.root.as_ref().map(|r| clear_all(r, at)))
    }

    /// Full history of the list under `key`.
    #[must_use]
    pub fn list(&self, key: &str) -> Option<&VersionedList> {
        find(self.root.as_ref(), key).map(|n| &n.list)
    }

    #[must_use]
    pub fn value_at(&self, key: &str, index: usize, time: Timestamp) -> Option<&Value> {
        self.list(key)?.value_at(index, time)
    }

    /// Slots ever inserted under `key`; zero for a missing key.
    #[must_use]
    pub fn total_count(&self, key: &str) -> usize {
        self.list(key).map_or(0, VersionedList::total_count)
    }

    /// Keys ever inserted, visible or not.
    #[must_use]
    pub fn total_size(&self) -> usize {
        count_of(self.root.as_ref())
    }

    /// Keys visible at `time`.
    #[must_use]
    pub fn size(&self, time: Timestamp) -> usize {
        visible_keys(self.root.as_ref(), time)
    }

    /// Keys visible at `time`, in order.
    #[must_use]
    pub fn flat_keys(&self, time: Timestamp) -> Vec<&str> {
        Entries::new(self.root.as_ref(), Some(time))
            .map(|n| &*n.key)
            .collect()
    }

    fn lowest(&self, bound: Bound<&str>, time: Timestamp) -> Option<&str> {
        lowest(self.root.as_ref(), bound, time).map(|n| &*n.key)
    }

    fn highest(&self, bound: Bound<&str>, time: Timestamp) -> Option<&str> {
        highest(self.root.as_ref(), bound, time).map(|n| &*n.key)
    }

    #[must_use]
    pub fn first_key(&self, time: Timestamp) -> Option<&str> {
        self.lowest(Bound::Unbounded, time)
    }

    #[must_use]
    pub fn last_key(&self, time: Timestamp) -> Option<&str> {
        self.highest(Bound::Unbounded, time)
    }

    #[must_use]
    pub fn higher_key(&self, key: &str, time: Timestamp) -> Option<&str> {
        self.lowest(Bound::Excluded(key), time)
    }

    #[must_use]
    pub fn ceiling_key(&self, key: &str, time: Timestamp) -> Option<&str> {
        self.lowest(Bound::Included(key), time)
    }

    #[must_use]
    pub fn lower_key(&self, key: &str, time: Timestamp) -> Option<&str> {
        self.highest(Bound::Excluded(key), time)
    }

    #[must_use]
    pub fn floor_key(&self, key: &str, time: Timestamp) -> Option<&str> {
        self.highest(Bound::Included(key), time)
    }

    /// Visible contents at `time`.
    #[must_use]
    pub fn snapshot_at(&self, time: Timestamp) -> BTreeMap<String, Vec<Value>> {
        Entries::new(self.root.as_ref(), Some(time))
            .map(|n| (n.key.to_string(), n.list.snapshot_at(time).cloned().collect()))
            .collect()
    }

    /// Lazily walk the visible keys at `time`.
    #[must_use]
    pub fn iter(&self, time: Timestamp) -> MapIter<'_> {
        MapIter {
            map: self,
            time,
            next: lowest(self.root.as_ref(), Bound::Unbounded, time),
        }
    }

    /// Read accessor bound to `time`.
    #[must_use]
    pub const fn view(&self, time: Timestamp) -> MapView<'_> {
        MapView::new(self, time)
    }

    /// Smallest and largest stored key, visible or not.
    pub(crate) fn key_range(&self) -> Option<(&str, &str)> {
        let mut first = self.root.as_ref()?;
        while let Some(left) = &first.left {
            first = left;
        }
        let mut last = self.root.as_ref()?;
        while let Some(right) = &last.right {
            last = right;
        }
        Some((&*first.key, &*last.key))
    }

    fn entries(&self) -> impl Iterator<Item = (&str, &VersionedList)> {
        Entries::new(self.root.as_ref(), None).map(|n| (&*n.key, &n.list))
    }
}

impl PartialEq for VersionedMap {
    fn eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) if Arc::ptr_eq(a, b) => true,
            _ => self.total_size() == other.total_size() && self.entries().eq(other.entries()),
        }
    }
}

impl fmt::Debug for VersionedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}
