//! Tag-dispatched codec registry.
//!
//! A [`Registry`] is an explicit, per-database object: it owns two maps,
//! tag -> codec for decoding and value kind -> tag for encoding. Codecs for
//! nested values (list slots, map keys) are looked up through the same
//! registry, which is passed to every codec call.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use byteorder::{BigEndian, ReadBytesExt};

use super::{Reader, Value, ValueKind};
use crate::collections::{ListCodec, MapCodec, NilListCodec, NilMapCodec};
use crate::durable::{
    BytesCodec, ChecksumCodec, DoubleCodec, FalseCodec, IntCodec, LongCodec, NullCodec, StrCodec,
    TrueCodec,
};
use crate::{DurableError, DurableResult};

/// Length of the type tag that prefixes every durable value.
pub const TAG_LEN: usize = 2;

/// A 2-byte type discriminator, written big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub u16);

impl Tag {
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; TAG_LEN] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Tags used by [`Registry::standard`].
///
/// Tag `0x0000` is never assigned, so an all-zero region decodes as an
/// unknown tag rather than as a value.
pub mod tags {
    use super::Tag;

    pub const NULL: Tag = Tag(0x0001);
    pub const TRUE: Tag = Tag(0x0002);
    pub const FALSE: Tag = Tag(0x0003);
    pub const INT: Tag = Tag(0x0004);
    pub const LONG: Tag = Tag(0x0005);
    pub const DOUBLE: Tag = Tag(0x0006);
    pub const STR: Tag = Tag(0x0007);
    pub const BYTES: Tag = Tag(0x0008);
    pub const CHECKSUM: Tag = Tag(0x0010);
    pub const NIL_LIST: Tag = Tag(0x0020);
    pub const LIST: Tag = Tag(0x0021);
    pub const NIL_MAP: Tag = Tag(0x0022);
    pub const MAP: Tag = Tag(0x0023);
}

/// Encoder/decoder for one kind of durable value.
///
/// Codecs only deal with payloads; the registry writes and reads the tag.
/// A codec is only ever handed values of its own [`kind`](Codec::kind).
pub trait Codec: Send + Sync + fmt::Debug {
    /// The value kind this codec handles.
    fn kind(&self) -> ValueKind;

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Bytes needed for the payload, excluding the tag.
    fn payload_len(&self, value: &Value, registry: &Registry) -> DurableResult<usize>;

    /// Append the payload to `out`.
    fn write_payload(
        &self,
        value: &Value,
        out: &mut Vec<u8>,
        registry: &Registry,
    ) -> DurableResult<()>;

    /// Read a payload. The tag has already been consumed.
    fn read_payload(&self, reader: &mut Reader<'_>, registry: &Registry) -> DurableResult<Value>;
}

/// Error for a codec handed a value of another kind.
pub(crate) fn kind_mismatch(expected: ValueKind, value: &Value) -> DurableError {
    DurableError::KindMismatch {
        expected,
        actual: value.kind(),
    }
}

/// A codec resolved through a registry, together with its tag.
///
/// Lengths and writes include the 2-byte tag.
#[derive(Clone, Copy)]
pub struct BoundCodec<'r> {
    tag: Tag,
    codec: &'r dyn Codec,
    registry: &'r Registry,
}

impl fmt::Debug for BoundCodec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCodec")
            .field("tag", &self.tag)
            .field("codec", &self.codec.name())
            .finish_non_exhaustive()
    }
}

impl<'r> BoundCodec<'r> {
    #[must_use]
    pub const fn tag(&self) -> Tag {
        self.tag
    }

    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.codec.kind()
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.codec.name()
    }

    fn check(&self, value: &Value) -> DurableResult<()> {
        if value.kind() == self.codec.kind() {
            Ok(())
        } else {
            Err(kind_mismatch(self.codec.kind(), value))
        }
    }

    /// Total encoded size of `value`, tag included.
    pub fn durable_length(&self, value: &Value) -> DurableResult<usize> {
        self.check(value)?;
        Ok(TAG_LEN + self.codec.payload_len(value, self.registry)?)
    }

    /// Append the tag and payload of `value` to `out`.
    pub fn write(&self, value: &Value, out: &mut Vec<u8>) -> DurableResult<()> {
        self.check(value)?;
        out.extend_from_slice(&self.tag.to_be_bytes());
        self.codec.write_payload(value, out, self.registry)
    }

    /// Read a payload whose tag resolved to this codec.
    pub fn read(&self, reader: &mut Reader<'_>) -> DurableResult<Value> {
        self.codec.read_payload(reader, self.registry)
    }

    /// The registry this codec was resolved through.
    #[must_use]
    pub const fn registry(&self) -> &'r Registry {
        self.registry
    }
}

/// Maps tags to codecs and value kinds to tags.
#[derive(Debug, Default)]
pub struct Registry {
    /// Tag -> codec, for decoding.
    by_tag: HashMap<Tag, Arc<dyn Codec>>,
    /// Kind -> tag, for encoding.
    by_kind: HashMap<ValueKind, Tag>,
}

impl Registry {
    /// Create a registry with no codecs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in codec under [`tags`].
    #[must_use]
    pub fn standard() -> Self {
        let builtins: [(Tag, Arc<dyn Codec>); 13] = [
            (tags::NULL, Arc::new(NullCodec)),
            (tags::TRUE, Arc::new(TrueCodec)),
            (tags::FALSE, Arc::new(FalseCodec)),
            (tags::INT, Arc::new(IntCodec)),
            (tags::LONG, Arc::new(LongCodec)),
            (tags::DOUBLE, Arc::new(DoubleCodec)),
            (tags::STR, Arc::new(StrCodec)),
            (tags::BYTES, Arc::new(BytesCodec)),
            (tags::CHECKSUM, Arc::new(ChecksumCodec)),
            (tags::NIL_LIST, Arc::new(NilListCodec)),
            (tags::LIST, Arc::new(ListCodec)),
            (tags::NIL_MAP, Arc::new(NilMapCodec)),
            (tags::MAP, Arc::new(MapCodec)),
        ];

        let mut registry = Self::new();
        for (tag, codec) in builtins {
            registry.bind(tag, codec);
        }
        registry
    }

    fn bind(&mut self, tag: Tag, codec: Arc<dyn Codec>) {
        self.by_kind.insert(codec.kind(), tag);
        self.by_tag.insert(tag, codec);
    }

    /// Register `codec` under `tag`.
    ///
    /// Fails if the tag is taken or the codec's value kind already has a
    /// codec.
    pub fn register(&mut self, tag: Tag, codec: Arc<dyn Codec>) -> DurableResult<()> {
        if self.by_tag.contains_key(&tag) {
            return Err(DurableError::DuplicateTag(tag));
        }
        let kind = codec.kind();
        if self.by_kind.contains_key(&kind) {
            return Err(DurableError::DuplicateKind(kind));
        }

        tracing::trace!("Registered codec {} for {kind:?} under tag {tag}", codec.name());
        self.bind(tag, codec);
        Ok(())
    }

    /// Resolve the codec for a value's runtime variant.
    pub fn codec_for(&self, value: &Value) -> DurableResult<BoundCodec<'_>> {
        self.codec_for_kind(value.kind())
    }

    /// Resolve the codec for a value kind.
    pub fn codec_for_kind(&self, kind: ValueKind) -> DurableResult<BoundCodec<'_>> {
        let tag = *self
            .by_kind
            .get(&kind)
            .ok_or(DurableError::UnregisteredKind(kind))?;
        self.codec_for_tag(tag)
    }

    /// Resolve a tag to its codec.
    pub fn codec_for_tag(&self, tag: Tag) -> DurableResult<BoundCodec<'_>> {
        let codec = self.by_tag.get(&tag).ok_or(DurableError::UnknownTag(tag))?;
        Ok(BoundCodec {
            tag,
            codec: codec.as_ref(),
            registry: self,
        })
    }

    /// Read the next 2 bytes as a tag and resolve it.
    pub fn read_tag(&self, reader: &mut Reader<'_>) -> DurableResult<BoundCodec<'_>> {
        let tag = Tag(reader.read_u16::<BigEndian>()?);
        self.codec_for_tag(tag)
    }

    /// Total encoded size of `value`, tag included.
    pub fn durable_length(&self, value: &Value) -> DurableResult<usize> {
        self.codec_for(value)?.durable_length(value)
    }

    /// Append the encoding of `value` to `out`.
    pub fn write(&self, value: &Value, out: &mut Vec<u8>) -> DurableResult<()> {
        self.codec_for(value)?.write(value, out)
    }

    /// Read one tagged value.
    ///
    /// Nested values are read through here too, so the reader's nesting
    /// depth is bounded by [`MAX_NESTING_DEPTH`](crate::MAX_NESTING_DEPTH).
    pub fn read(&self, reader: &mut Reader<'_>) -> DurableResult<Value> {
        let codec = self.read_tag(reader)?;
        reader.enter()?;
        let value = codec.read(reader)?;
        reader.leave();
        Ok(value)
    }

    /// Encode `value` into a fresh buffer sized by its durable length.
    pub fn to_bytes(&self, value: &Value) -> DurableResult<Vec<u8>> {
        let codec = self.codec_for(value)?;
        let mut out = Vec::with_capacity(codec.durable_length(value)?);
        codec.write(value, &mut out)?;
        Ok(out)
    }

    /// Decode exactly one value from `bytes`.
    pub fn from_bytes(&self, bytes: &[u8]) -> DurableResult<Value> {
        let mut reader = Reader::new(bytes);
        let value = self.read(&mut reader)?;
        let consumed = reader.position();
        if consumed != bytes.len() {
            return Err(DurableError::TrailingBytes(bytes.len() - consumed));
        }
        Ok(value)
    }

    /// Number of registered codecs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}
