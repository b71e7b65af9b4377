//! The closed set of durable values.

use std::sync::Arc;

use crate::{Cs256, VersionedList, VersionedMap};

/// Discriminates values for codec dispatch.
///
/// `True`, `False`, `NilList` and `NilMap` are separate kinds so that each
/// gets its own zero-payload codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Null,
    True,
    False,
    Int,
    Long,
    Double,
    Str,
    Bytes,
    Checksum,
    NilList,
    List,
    NilMap,
    Map,
}

/// A durable value.
///
/// Cloning is cheap: strings, byte arrays and collections are reference
/// counted, and collections share structure between versions.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    Checksum(Cs256),
    List(VersionedList),
    Map(VersionedMap),
}

impl Value {
    /// The codec kind for this value's runtime variant.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(true) => ValueKind::True,
            Self::Bool(false) => ValueKind::False,
            Self::Int(_) => ValueKind::Int,
            Self::Long(_) => ValueKind::Long,
            Self::Double(_) => ValueKind::Double,
            Self::Str(_) => ValueKind::Str,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Checksum(_) => ValueKind::Checksum,
            Self::List(list) if list.is_nil() => ValueKind::NilList,
            Self::List(_) => ValueKind::List,
            Self::Map(map) if map.is_nil() => ValueKind::NilMap,
            Self::Map(_) => ValueKind::Map,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_list(&self) -> Option<&VersionedList> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_map(&self) -> Option<&VersionedMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(Arc::from(v))
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Arc::from(v))
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(Arc::from(v))
    }
}

impl From<Cs256> for Value {
    fn from(v: Cs256) -> Self {
        Self::Checksum(v)
    }
}

impl From<VersionedList> for Value {
    fn from(v: VersionedList) -> Self {
        Self::List(v)
    }
}

impl From<VersionedMap> for Value {
    fn from(v: VersionedMap) -> Self {
        Self::Map(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_distinguishes_empty_collections() {
        assert_eq!(Value::List(VersionedList::new()).kind(), ValueKind::NilList);
        assert_eq!(Value::Map(VersionedMap::new()).kind(), ValueKind::NilMap);

        let list = VersionedList::new().append(Value::Int(1), 0);
        assert_eq!(Value::List(list).kind(), ValueKind::List);
    }

    #[test]
    fn test_kind_distinguishes_booleans() {
        assert_eq!(Value::from(true).kind(), ValueKind::True);
        assert_eq!(Value::from(false).kind(), ValueKind::False);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from("abc").as_str(), Some("abc"));
        assert_eq!(Value::from(7).as_int(), Some(7));
        assert_eq!(Value::from(7i64).as_long(), Some(7));
        assert_eq!(Value::Null.as_int(), None);
        assert!(Value::Null.is_null());
    }
}
