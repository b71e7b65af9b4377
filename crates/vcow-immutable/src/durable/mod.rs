//! Self-describing binary encoding.
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │  tag: u16 BE │  payload (codec specific)    │
//! └──────────────┴──────────────────────────────┘
//! ```
//!
//! Zero-payload kinds (null, true, false, the empty list and the empty map)
//! encode as the tag alone, so the smallest durable value is 2 bytes.

mod checksum;
mod reader;
mod registry;
mod scalars;
mod value;

pub use checksum::{CS256_LEN, ChecksumCodec, Cs256};
pub use reader::{MAX_NESTING_DEPTH, Reader};
pub use registry::{BoundCodec, Codec, Registry, TAG_LEN, Tag, tags};
pub(crate) use registry::kind_mismatch;
pub use scalars::{
    BytesCodec, DoubleCodec, FalseCodec, IntCodec, LongCodec, NullCodec, StrCodec, TrueCodec,
};
pub use value::{Value, ValueKind};
