//! Durable encoding and collection error types.

use thiserror::Error;

use crate::{Tag, ValueKind};

/// Errors raised while encoding, decoding, or updating durable values.
#[derive(Debug, Error)]
pub enum DurableError {
    /// The byte stream ended before the value was complete.
    #[error("unexpected end of input: {0}")]
    Truncated(#[from] std::io::Error),

    /// No codec is registered for this tag.
    #[error("unknown codec tag {0}")]
    UnknownTag(Tag),

    /// No codec is registered for this kind of value.
    #[error("no codec registered for {0:?}")]
    UnregisteredKind(ValueKind),

    /// A codec was registered twice for the same tag.
    #[error("codec tag {0} is already registered")]
    DuplicateTag(Tag),

    /// A second codec was registered for a value kind that already has one.
    #[error("value kind {0:?} already has a codec")]
    DuplicateKind(ValueKind),

    /// A codec was handed a value of the wrong kind.
    #[error("codec for {expected:?} cannot handle {actual:?}")]
    KindMismatch {
        expected: ValueKind,
        actual: ValueKind,
    },

    /// The bytes were readable but do not describe a valid value.
    #[error("malformed durable data: {0}")]
    Malformed(String),

    /// Bytes were left over after decoding a complete value.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    /// An index outside `[0, total]` (insert) or `[0, total)` (update).
    #[error("index {index} out of range for list of {total} slots")]
    IndexOutOfRange { index: usize, total: usize },

    /// A null value was supplied where a live value is required.
    #[error("value may not be null")]
    NullValue,

    /// A slot was given a deletion time earlier than its creation time.
    #[error("slot deleted at {deleted} before it was created at {created}")]
    InvalidLifespan { created: i64, deleted: i64 },

    /// A payload is too long for its 32-bit length prefix.
    #[error("{0} byte payload exceeds the 32-bit length prefix")]
    TooLong(usize),
}

impl DurableError {
    /// Shorthand for a [`DurableError::Malformed`] error.
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}

/// Result type for durable operations.
pub type DurableResult<T> = Result<T, DurableError>;
