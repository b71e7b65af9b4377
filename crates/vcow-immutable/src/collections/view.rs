//! Read accessors bound to a single point in time.

use super::list::Snapshot;
use super::map::MapIter;
use crate::{Timestamp, Value, VersionedList, VersionedMap};

/// A [`VersionedList`] as it stood at one time.
///
/// Indices are the list's stable slot indices, so they may have gaps.
#[derive(Debug, Clone, Copy)]
pub struct ListView<'a> {
    list: &'a VersionedList,
    time: Timestamp,
}

impl<'a> ListView<'a> {
    pub(crate) const fn new(list: &'a VersionedList, time: Timestamp) -> Self {
        Self { list, time }
    }

    #[must_use]
    pub const fn time(&self) -> Timestamp {
        self.time
    }

    /// The underlying list, with its full history.
    #[must_use]
    pub const fn list(&self) -> &'a VersionedList {
        self.list
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&'a Value> {
        self.list.value_at(index, self.time)
    }

    #[must_use]
    pub fn first(&self) -> Option<&'a Value> {
        self.first_index().and_then(|i| self.get(i))
    }

    #[must_use]
    pub fn last(&self) -> Option<&'a Value> {
        self.last_index().and_then(|i| self.get(i))
    }

    #[must_use]
    pub fn first_index(&self) -> Option<usize> {
        self.list.first_index(self.time)
    }

    #[must_use]
    pub fn last_index(&self) -> Option<usize> {
        self.list.last_index(self.time)
    }

    #[must_use]
    pub fn higher_index(&self, index: usize) -> Option<usize> {
        self.list.higher_index(index, self.time)
    }

    #[must_use]
    pub fn ceiling_index(&self, index: usize) -> Option<usize> {
        self.list.ceiling_index(index, self.time)
    }

    #[must_use]
    pub fn lower_index(&self, index: usize) -> Option<usize> {
        self.list.lower_index(index, self.time)
    }

    #[must_use]
    pub fn floor_index(&self, index: usize) -> Option<usize> {
        self.list.floor_index(index, self.time)
    }

    #[must_use]
    pub fn find_index(&self, value: &Value) -> Option<usize> {
        self.list.find_index(value, self.time)
    }

    #[must_use]
    pub fn find_index_right(&self, value: &Value) -> Option<usize> {
        self.list.find_index_right(value, self.time)
    }

    /// Number of visible slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.count_visible(self.time)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty_at(self.time)
    }

    #[must_use]
    pub fn iter(&self) -> Snapshot<'a> {
        self.list.snapshot_at(self.time)
    }

    /// Visible values collected into a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for ListView<'a> {
    type Item = &'a Value;
    type IntoIter = Snapshot<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A [`VersionedMap`] as it stood at one time.
///
/// Keys whose list has no visible slot are hidden.
#[derive(Debug, Clone, Copy)]
pub struct MapView<'a> {
    map: &'a VersionedMap,
    time: Timestamp,
}

impl<'a> MapView<'a> {
    pub(crate) const fn new(map: &'a VersionedMap, time: Timestamp) -> Self {
        Self { map, time }
    }

    #[must_use]
    pub const fn time(&self) -> Timestamp {
        self.time
    }

    #[must_use]
    pub const fn map(&self) -> &'a VersionedMap {
        self.map
    }

    /// The list under `key`, if any of its slots is visible.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ListView<'a>> {
        self.map
            .list(key)
            .map(|list| list.view(self.time))
            .filter(|view| !view.is_empty())
    }

    /// First visible value under `key`.
    #[must_use]
    pub fn first_value(&self, key: &str) -> Option<&'a Value> {
        self.get(key).and_then(|view| view.first())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[must_use]
    pub fn first_key(&self) -> Option<&'a str> {
        self.map.first_key(self.time)
    }

    #[must_use]
    pub fn last_key(&self) -> Option<&'a str> {
        self.map.last_key(self.time)
    }

    #[must_use]
    pub fn higher_key(&self, key: &str) -> Option<&'a str> {
        self.map.higher_key(key, self.time)
    }

    #[must_use]
    pub fn ceiling_key(&self, key: &str) -> Option<&'a str> {
        self.map.ceiling_key(key, self.time)
    }

    #[must_use]
    pub fn lower_key(&self, key: &str) -> Option<&'a str> {
        self.map.lower_key(key, self.time)
    }

    #[must_use]
    pub fn floor_key(&self, key: &str) -> Option<&'a str> {
        self.map.floor_key(key, self.time)
    }

    /// Number of visible keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.size(self.time)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_key().is_none()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<&'a str> {
        self.map.flat_keys(self.time)
    }

    #[must_use]
    pub fn iter(&self) -> MapIter<'a> {
        self.map.iter(self.time)
    }
}

impl<'a> IntoIterator for MapView<'a> {
    type Item = (&'a str, ListView<'a>);
    type IntoIter = MapIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
