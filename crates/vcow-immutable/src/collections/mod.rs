//! Immutable, time-versioned collections.

mod aa;
mod codec;
mod list;
mod map;
mod view;

pub use codec::{ListCodec, MapCodec, NilListCodec, NilMapCodec};
pub use list::{MAX_TIME, Snapshot, VersionedList};
pub use map::{MapIter, VersionedMap};
pub use view::{ListView, MapView};
