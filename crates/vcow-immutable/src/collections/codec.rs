//! Codecs for versioned lists and maps.
//!
//! Nodes are written in pre-order with tagged children, so an empty child
//! costs 2 bytes:
//!
//! ```text
//! list: [level:4][size:4][created:8][deleted:8][left][value][right]
//! map:  [level:4][key][list][left][right]
//! ```
//!
//! Derived aggregates (key counts, lifespans) are rebuilt while decoding.
//! Decoding checks what the rebuilt tree relies on: AA levels, list subtree
//! sizes, slot lifespans and map key order.

use std::sync::Arc;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::BufMut;

use super::aa::locally_balanced;
use super::list::ListNode;
use super::map::MapNode;
use crate::durable::kind_mismatch;
use crate::durable::{Codec, Reader, Registry};
use crate::{DurableError, DurableResult, Value, ValueKind, VersionedList, VersionedMap};

/// Fixed part of a list node payload.
const LIST_HEADER_LEN: usize = 4 + 4 + 8 + 8;

fn read_list(reader: &mut Reader<'_>, registry: &Registry) -> DurableResult<VersionedList> {
    match registry.read(reader)? {
        Value::List(list) => Ok(list),
        other => Err(DurableError::malformed(format!(
            "expected a list, found {:?}",
            other.kind()
        ))),
    }
}

fn read_map(reader: &mut Reader<'_>, registry: &Registry) -> DurableResult<VersionedMap> {
    match registry.read(reader)? {
        Value::Map(map) => Ok(map),
        other => Err(DurableError::malformed(format!(
            "expected a map, found {:?}",
            other.kind()
        ))),
    }
}

fn list_child(node: Option<&Arc<ListNode>>) -> Value {
    Value::List(VersionedList::from_root(node.cloned()))
}

fn map_child(node: Option<&Arc<MapNode>>) -> Value {
    Value::Map(VersionedMap::from_root(node.cloned()))
}

/// The empty list: tag only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilListCodec;

impl Codec for NilListCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::NilList
    }

    fn name(&self) -> &'static str {
        "nil-list"
    }

    fn payload_len(&self, _value: &Value, _registry: &Registry) -> DurableResult<usize> {
        Ok(0)
    }

    fn write_payload(
        &self,
        _value: &Value,
        _out: &mut Vec<u8>,
        _registry: &Registry,
    ) -> DurableResult<()> {
        Ok(())
    }

    fn read_payload(&self, _reader: &mut Reader<'_>, _registry: &Registry) -> DurableResult<Value> {
        Ok(Value::List(VersionedList::new()))
    }
}

/// A populated list node and, recursively, its subtrees.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListCodec;

impl ListCodec {
    fn node(value: &Value) -> DurableResult<&Arc<ListNode>> {
        value
            .as_list()
            .and_then(VersionedList::root)
            .ok_or_else(|| kind_mismatch(ValueKind::List, value))
    }
}

impl Codec for ListCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::List
    }

    fn name(&self) -> &'static str {
        "list"
    }

    fn payload_len(&self, value: &Value, registry: &Registry) -> DurableResult<usize> {
        let node = Self::node(value)?;
        Ok(LIST_HEADER_LEN
            + registry.durable_length(&list_child(node.left.as_ref()))?
            + registry.durable_length(&node.value)?
            + registry.durable_length(&list_child(node.right.as_ref()))?)
    }

    fn write_payload(
        &self,
        value: &Value,
        out: &mut Vec<u8>,
        registry: &Registry,
    ) -> DurableResult<()> {
        let node = Self::node(value)?;
        let size = u32::try_from(node.size).map_err(|_| DurableError::TooLong(node.size))?;

        out.put_u32(node.level);
        out.put_u32(size);
        out.put_i64(node.created);
        out.put_i64(node.deleted);
        registry.write(&list_child(node.left.as_ref()), out)?;
        registry.write(&node.value, out)?;
        registry.write(&list_child(node.right.as_ref()), out)
    }

    fn read_payload(&self, reader: &mut Reader<'_>, registry: &Registry) -> DurableResult<Value> {
        let level = reader.read_u32::<BigEndian>()?;
        let size = reader.read_u32::<BigEndian>()? as usize;
        let created = reader.read_i64::<BigEndian>()?;
        let deleted = reader.read_i64::<BigEndian>()?;
        let left = read_list(reader, registry)?;
        let value = registry.read(reader)?;
        let right = read_list(reader, registry)?;

        if deleted < created {
            return Err(DurableError::malformed(format!(
                "list slot deleted at {deleted} before creation at {created}"
            )));
        }

        let node = ListNode::new(
            level,
            created,
            deleted,
            value,
            left.root().cloned(),
            right.root().cloned(),
        );
        if node.size != size {
            return Err(DurableError::malformed(format!(
                "list node declares {size} slots but its children hold {}",
                node.size
            )));
        }
        if !locally_balanced(node.as_ref()) {
            return Err(DurableError::malformed(format!(
                "unbalanced list node at level {level}"
            )));
        }
        Ok(Value::List(VersionedList::from_root(Some(node))))
    }
}

/// The empty map: tag only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilMapCodec;

impl Codec for NilMapCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::NilMap
    }

    fn name(&self) -> &'static str {
        "nil-map"
    }

    fn payload_len(&self, _value: &Value, _registry: &Registry) -> DurableResult<usize> {
        Ok(0)
    }

    fn write_payload(
        &self,
        _value: &Value,
        _out: &mut Vec<u8>,
        _registry: &Registry,
    ) -> DurableResult<()> {
        Ok(())
    }

    fn read_payload(&self, _reader: &mut Reader<'_>, _registry: &Registry) -> DurableResult<Value> {
        Ok(Value::Map(VersionedMap::new()))
    }
}

/// A populated map node and, recursively, its subtrees.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapCodec;

impl MapCodec {
    fn node(value: &Value) -> DurableResult<&Arc<MapNode>> {
        value
            .as_map()
            .and_then(VersionedMap::root)
            .ok_or_else(|| kind_mismatch(ValueKind::Map, value))
    }
}

impl Codec for MapCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Map
    }

    fn name(&self) -> &'static str {
        "map"
    }

    fn payload_len(&self, value: &Value, registry: &Registry) -> DurableResult<usize> {
        let node = Self::node(value)?;
        Ok(4 + registry.durable_length(&Value::Str(Arc::clone(&node.key)))?
            + registry.durable_length(&Value::List(node.list.clone()))?
            + registry.durable_length(&map_child(node.left.as_ref()))?
            + registry.durable_length(&map_child(node.right.as_ref()))?)
    }

    fn write_payload(
        &self,
        value: &Value,
        out: &mut Vec<u8>,
        registry: &Registry,
    ) -> DurableResult<()> {
        let node = Self::node(value)?;

        out.put_u32(node.level);
        registry.write(&Value::Str(Arc::clone(&node.key)), out)?;
        registry.write(&Value::List(node.list.clone()), out)?;
        registry.write(&map_child(node.left.as_ref()), out)?;
        registry.write(&map_child(node.right.as_ref()), out)
    }

    fn read_payload(&self, reader: &mut Reader<'_>, registry: &Registry) -> DurableResult<Value> {
        let level = reader.read_u32::<BigEndian>()?;
        let key = match registry.read(reader)? {
            Value::Str(key) => key,
            other => {
                return Err(DurableError::malformed(format!(
                    "map key must be a string, found {:?}",
                    other.kind()
                )));
            }
        };
        let list = read_list(reader, registry)?;
        let left = read_map(reader, registry)?;
        let right = read_map(reader, registry)?;

        let left_sorted = left.key_range().is_none_or(|(_, last)| last < &*key);
        let right_sorted = right.key_range().is_none_or(|(first, _)| first > &*key);
        if !(left_sorted && right_sorted) {
            return Err(DurableError::malformed(format!(
                "map key {key:?} is out of order with its subtrees"
            )));
        }

        let node = MapNode::new(
            level,
            key,
            list,
            left.root().cloned(),
            right.root().cloned(),
        );
        if !locally_balanced(node.as_ref()) {
            return Err(DurableError::malformed(format!(
                "unbalanced map node at level {level}"
            )));
        }
        Ok(Value::Map(VersionedMap::from_root(Some(node))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::tags;
    use crate::{MAX_NESTING_DEPTH, MAX_TIME, TAG_LEN};

    fn sample_map() -> VersionedMap {
        VersionedMap::new()
            .add("b", Value::Int(2), 1)
            .unwrap()
            .add("a", Value::from("one"), 1)
            .unwrap()
            .add("c", Value::Double(3.0), 2)
            .unwrap()
            .remove("b", 0, 3)
            .unwrap()
    }

    #[test]
    fn test_single_slot_layout() {
        let registry = Registry::standard();
        let list = VersionedList::new()
            .insert(0, Value::Bool(true), 1, MAX_TIME)
            .unwrap();
        let bytes = registry.to_bytes(&Value::List(list)).unwrap();

        let mut expected = vec![0x00, 0x21];
        expected.extend_from_slice(&1u32.to_be_bytes());
        expected.extend_from_slice(&1u32.to_be_bytes());
        expected.extend_from_slice(&1i64.to_be_bytes());
        expected.extend_from_slice(&i64::MAX.to_be_bytes());
        expected.extend_from_slice(&[0x00, 0x20, 0x00, 0x02, 0x00, 0x20]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_decoded_map_keeps_history() {
        let registry = Registry::standard();
        let map = sample_map();
        let bytes = registry.to_bytes(&Value::Map(map.clone())).unwrap();
        assert_eq!(bytes[..TAG_LEN], tags::MAP.to_be_bytes());

        let decoded = registry.from_bytes(&bytes).unwrap();
        let decoded = decoded.as_map().unwrap();
        assert_eq!(decoded, &map);
        assert_eq!(decoded.flat_keys(3), vec!["a", "c"]);
        assert_eq!(decoded.value_at("b", 0, 2), Some(&Value::Int(2)));
        assert_eq!(decoded.first_key(0), None);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let registry = Registry::standard();
        let list = VersionedList::new().append(Value::Int(1), 0);
        let mut bytes = registry.to_bytes(&Value::List(list)).unwrap();
        // Size field follows the tag and level.
        bytes[TAG_LEN + 7] = 2;

        let err = registry.from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, DurableError::Malformed(_)));
    }

    #[test]
    fn test_unbalanced_level_rejected() {
        let registry = Registry::standard();
        let list = VersionedList::new().append(Value::Int(1), 0);
        let mut bytes = registry.to_bytes(&Value::List(list)).unwrap();
        bytes[TAG_LEN + 3] = 0;

        let err = registry.from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, DurableError::Malformed(_)));
    }

    #[test]
    fn test_map_child_of_wrong_kind_rejected() {
        let registry = Registry::standard();
        let mut bytes = vec![0x00, 0x23];
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&registry.to_bytes(&Value::from("k")).unwrap());
        bytes.extend_from_slice(&tags::NIL_LIST.to_be_bytes());
        // Left child is an int instead of a map.
        bytes.extend_from_slice(&registry.to_bytes(&Value::Int(0)).unwrap());
        bytes.extend_from_slice(&tags::NIL_MAP.to_be_bytes());

        let err = registry.from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, DurableError::Malformed(_)));
    }

    /// A map node with a nil list and pre-encoded children.
    fn map_node(registry: &Registry, level: u32, key: &str, left: &[u8], right: &[u8]) -> Vec<u8> {
        let mut bytes = tags::MAP.to_be_bytes().to_vec();
        bytes.extend_from_slice(&level.to_be_bytes());
        bytes.extend_from_slice(&registry.to_bytes(&Value::from(key)).unwrap());
        bytes.extend_from_slice(&tags::NIL_LIST.to_be_bytes());
        bytes.extend_from_slice(left);
        bytes.extend_from_slice(right);
        bytes
    }

    #[test]
    fn test_map_keys_out_of_order_rejected() {
        let registry = Registry::standard();
        let nil = tags::NIL_MAP.to_be_bytes();

        let a = map_node(&registry, 1, "a", &nil, &nil);
        let c = map_node(&registry, 1, "c", &nil, &nil);
        let ordered = map_node(&registry, 2, "b", &a, &c);
        let decoded = registry.from_bytes(&ordered).unwrap();
        assert_eq!(decoded.as_map().unwrap().total_size(), 3);

        for bytes in [
            map_node(&registry, 1, "b", &nil, &a),
            map_node(&registry, 2, "b", &c, &a),
            map_node(&registry, 1, "b", &nil, &map_node(&registry, 1, "b", &nil, &nil)),
        ] {
            let err = registry.from_bytes(&bytes).unwrap_err();
            assert!(matches!(err, DurableError::Malformed(_)), "{err}");
        }
    }

    #[test]
    fn test_map_order_checked_against_whole_subtree() {
        let registry = Registry::standard();
        let nil = tags::NIL_MAP.to_be_bytes();

        // "d" sits in the left subtree of "c" by way of "a".
        let d = map_node(&registry, 1, "d", &nil, &nil);
        let a = map_node(&registry, 1, "a", &nil, &d);
        let bytes = map_node(&registry, 2, "c", &a, &nil);

        let err = registry.from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, DurableError::Malformed(_)));
    }

    /// List headers whose value slot is always another list, never closed.
    fn unterminated_list_headers(levels: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(levels * 28);
        for _ in 0..levels {
            bytes.extend_from_slice(&tags::LIST.to_be_bytes());
            bytes.extend_from_slice(&1u32.to_be_bytes());
            bytes.extend_from_slice(&1u32.to_be_bytes());
            bytes.extend_from_slice(&0i64.to_be_bytes());
            bytes.extend_from_slice(&MAX_TIME.to_be_bytes());
            bytes.extend_from_slice(&tags::NIL_LIST.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn test_deeply_nested_input_is_malformed() {
        let registry = Registry::standard();
        for levels in [MAX_NESTING_DEPTH + 1, 30_000] {
            let err = registry.from_bytes(&unterminated_list_headers(levels)).unwrap_err();
            assert!(matches!(err, DurableError::Malformed(_)), "{levels} levels: {err}");
        }
    }

    #[test]
    fn test_nesting_within_limit_round_trips() {
        let registry = Registry::standard();
        let mut value = Value::Int(0);
        for depth in 0..40 {
            let list = VersionedList::new().append(value, depth);
            value = Value::Map(VersionedMap::new().add("k", Value::List(list), depth).unwrap());
        }

        let bytes = registry.to_bytes(&value).unwrap();
        assert_eq!(registry.from_bytes(&bytes).unwrap(), value);
    }

    #[test]
    fn test_every_truncation_fails_cleanly() {
        let registry = Registry::standard();
        let bytes = registry.to_bytes(&Value::Map(sample_map())).unwrap();
        for len in 0..bytes.len() {
            assert!(registry.from_bytes(&bytes[..len]).is_err(), "prefix {len}");
        }
    }
}
