//! Crash-safe persistence for time-versioned maps.
//!
//! A database file holds two fixed-size root block slots. Each write
//! encodes the whole root map into the slot that is *not* live, and only
//! then adopts it. On open, both slots are validated and the newest valid
//! one wins, so a torn write costs at most the write in progress.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Db                                                                 │
//! │    - Closed / Open / Error lifecycle                                │
//! │    - runs transactions: (root, timestamp, payload) -> root          │
//! │    - one monotonic timestamp per write                              │
//! └─────────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Root block                                                         │
//! │    - [max][size][sha-256][timestamp][tagged root map]               │
//! │    - slot 0 at offset 0, slot 1 at offset max                       │
//! └─────────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  vcow-immutable                                                     │
//! │    - VersionedMap / VersionedList                                   │
//! │    - codec registry                                                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use vcow_db::{Db, DbConfig};
//! use vcow_immutable::{Registry, Timestamp, Value, VersionedMap};
//!
//! let config = DbConfig::new("app.vcow").with_max_root_block_size(64 * 1024);
//! let mut db = Db::new(Registry::standard(), config);
//! db.create_new()?;
//!
//! let put = |root: &VersionedMap, t: Timestamp, _: &VersionedMap| {
//!     root.add("greeting", Value::from("hello"), t)
//! };
//! db.apply(&put, &VersionedMap::new())?;
//! db.close();
//!
//! db.open_existing()?;
//! let root = db.root()?;
//! assert_eq!(root.first_key(db.timestamp()?), Some("greeting"));
//! # Ok::<(), vcow_db::DbError>(())
//! ```

mod block;
mod clock;
mod config;
mod db;
mod error;
mod transaction;

pub use block::{
    BLOCK_HEADER_LEN, BlockRejection, CHECKSUM_LEN, MIN_BLOCK_SIZE, RootBlock, TIMESTAMP_LEN,
    decode as decode_block, encode as encode_block,
};
pub use clock::{Clock, wall_clock_millis};
pub use config::{
    DEFAULT_MAX_ROOT_BLOCK_SIZE, DbConfig, ENV_MAX_ROOT_BLOCK_SIZE, ENV_PATH, ENV_SYNC_ON_WRITE,
};
pub use db::{Db, DbState, RootHandle, Slot, choose_slot};
pub use error::{DbError, DbResult};
pub use transaction::{Merge, Transaction};
