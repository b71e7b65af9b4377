//! Durable codecs and time-versioned persistent collections.
//!
//! Every value in this crate has a self-describing binary form: a 2-byte
//! big-endian type tag followed by a type-specific payload. A [`Registry`]
//! maps tags to codecs, so a byte stream can be decoded without any external
//! schema.
//!
//! On top of the codecs sit two immutable AA trees:
//!
//! - [`VersionedList`]: an order-statistics tree of timestamped value slots.
//!   Each slot is present at time `t` iff `created <= t < deleted`.
//! - [`VersionedMap`]: a key-ordered tree whose entries each hold the full
//!   [`VersionedList`] history of one key.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  VersionedMap                                                       │
//! │    - AA tree ordered by key                                         │
//! │    - each entry: key -> VersionedList                               │
//! └─────────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  VersionedList                                                      │
//! │    - AA tree addressed by index (subtree sizes)                     │
//! │    - each slot: (created, deleted, value)                           │
//! └─────────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Registry                                                           │
//! │    - tag -> codec, value kind -> tag                                │
//! │    - [tag:2][payload] for every durable value                       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every update returns a new root and leaves the old one untouched; only
//! the nodes on the path to the change are rebuilt.
//!
//! # Usage
//!
//! ```
//! use vcow_immutable::{Registry, Value, VersionedMap};
//!
//! let registry = Registry::standard();
//!
//! let empty = VersionedMap::new();
//! let map = empty.add("k", Value::Int(10), 5).unwrap();
//!
//! assert_eq!(map.value_at("k", 0, 4), None);
//! assert_eq!(map.value_at("k", 0, 5), Some(&Value::Int(10)));
//! assert_eq!(empty.first_key(5), None);
//!
//! let bytes = registry.to_bytes(&Value::Map(map.clone())).unwrap();
//! assert_eq!(registry.from_bytes(&bytes).unwrap(), Value::Map(map));
//! ```

mod collections;
mod durable;
mod error;

pub use collections::{
    ListCodec, ListView, MAX_TIME, MapCodec, MapIter, MapView, NilListCodec, NilMapCodec,
    Snapshot, VersionedList, VersionedMap,
};
pub use durable::{
    BoundCodec, BytesCodec, CS256_LEN, ChecksumCodec, Codec, Cs256, DoubleCodec, FalseCodec,
    IntCodec, LongCodec, MAX_NESTING_DEPTH, NullCodec, Reader, Registry, StrCodec, TAG_LEN, Tag,
    TrueCodec, Value, ValueKind, tags,
};
pub use error::{DurableError, DurableResult};

/// A point in time, as used for slot creation and deletion.
///
/// Timestamps are opaque ordered integers; the database layer hands out one
/// per transaction.
pub type Timestamp = i64;
