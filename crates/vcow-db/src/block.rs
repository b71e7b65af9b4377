//! Root block layout.
//!
//! ```text
//! ┌────────────┬─────────────┬──────────────────────┬──────────────┬──────────────────┐
//! │ max: i32   │ size: i32   │ checksum: tag + 32   │ time: i64    │ tagged root ...  │
//! └────────────┴─────────────┴──────────────────────┴──────────────┴──────────────────┘
//!  0            4             8                      42             50
//! ```
//!
//! The checksum covers the timestamp and root bytes only. Bytes after
//! `size` up to the end of the slot are padding and never read.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;
use vcow_immutable::{CS256_LEN, Cs256, Registry, TAG_LEN, Timestamp, Value};

use crate::{DbError, DbResult};

/// The two size fields.
pub const BLOCK_HEADER_LEN: usize = 8;

/// The tagged checksum value.
pub const CHECKSUM_LEN: usize = TAG_LEN + CS256_LEN;

pub const TIMESTAMP_LEN: usize = 8;

/// Smallest possible block: headers, checksum, timestamp and a 2-byte root.
pub const MIN_BLOCK_SIZE: usize = BLOCK_HEADER_LEN + CHECKSUM_LEN + TIMESTAMP_LEN + TAG_LEN;

/// Offset of the checksummed body.
const BODY_OFFSET: usize = BLOCK_HEADER_LEN + CHECKSUM_LEN;

/// A decoded root block.
#[derive(Debug, Clone, PartialEq)]
pub struct RootBlock {
    pub timestamp: Timestamp,
    pub root: Value,
    /// Bytes the block occupies in its slot.
    pub size: usize,
}

/// Why a slot does not hold a valid root block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockRejection {
    #[error("slot holds only {0} bytes")]
    Short(usize),

    #[error("stored maximum block size {stored} does not match {expected}")]
    MaxSizeMismatch { stored: i32, expected: usize },

    #[error("block size {size} outside {MIN_BLOCK_SIZE}..={max}")]
    BlockSize { size: i32, max: usize },

    #[error("block of {size} bytes but only {available} were read")]
    Truncated { size: usize, available: usize },

    #[error("checksum field is invalid: {0}")]
    ChecksumField(String),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("root value is invalid: {0}")]
    Root(String),
}

/// Encode `root` as a block for slots of `max_block_size` bytes.
pub fn encode(
    registry: &Registry,
    max_block_size: usize,
    timestamp: Timestamp,
    root: &Value,
) -> DbResult<Vec<u8>> {
    let stored_max = i32::try_from(max_block_size).map_err(|_| {
        DbError::Config(format!("maximum block size {max_block_size} exceeds i32"))
    })?;

    let size = BODY_OFFSET + TIMESTAMP_LEN + registry.durable_length(root)?;
    if size > max_block_size {
        return Err(DbError::BlockTooLarge {
            size,
            max: max_block_size,
        });
    }

    let mut body = Vec::with_capacity(size - BODY_OFFSET);
    body.write_i64::<BigEndian>(timestamp)?;
    registry.write(root, &mut body)?;
    let checksum = Value::Checksum(Cs256::digest(&body));

    let mut block = Vec::with_capacity(size);
    block.write_i32::<BigEndian>(stored_max)?;
    block.write_i32::<BigEndian>(size as i32)?;
    registry.write(&checksum, &mut block)?;
    block.extend_from_slice(&body);
    Ok(block)
}

/// Decode the block at the start of `bytes`.
///
/// Never fails with an error: every problem is a [`BlockRejection`].
pub fn decode(
    registry: &Registry,
    bytes: &[u8],
    expected_max_block_size: usize,
) -> Result<RootBlock, BlockRejection> {
    let mut reader = Cursor::new(bytes);
    let short = |_| BlockRejection::Short(bytes.len());
    let stored_max = reader.read_i32::<BigEndian>().map_err(short)?;
    let size = reader.read_i32::<BigEndian>().map_err(short)?;

    if usize::try_from(stored_max).ok() != Some(expected_max_block_size) {
        return Err(BlockRejection::MaxSizeMismatch {
            stored: stored_max,
            expected: expected_max_block_size,
        });
    }
    let block_size = usize::try_from(size)
        .ok()
        .filter(|s| (MIN_BLOCK_SIZE..=expected_max_block_size).contains(s))
        .ok_or(BlockRejection::BlockSize {
            size,
            max: expected_max_block_size,
        })?;
    if block_size > bytes.len() {
        return Err(BlockRejection::Truncated {
            size: block_size,
            available: bytes.len(),
        });
    }

    let checksum = match registry.from_bytes(&bytes[BLOCK_HEADER_LEN..BODY_OFFSET]) {
        Ok(Value::Checksum(cs)) => cs,
        Ok(other) => {
            return Err(BlockRejection::ChecksumField(format!(
                "found {:?}",
                other.kind()
            )));
        }
        Err(e) => return Err(BlockRejection::ChecksumField(e.to_string())),
    };

    let body = &bytes[BODY_OFFSET..block_size];
    if Cs256::digest(body) != checksum {
        return Err(BlockRejection::ChecksumMismatch);
    }

    let mut timestamp = [0u8; TIMESTAMP_LEN];
    timestamp.copy_from_slice(&body[..TIMESTAMP_LEN]);
    let root = registry
        .from_bytes(&body[TIMESTAMP_LEN..])
        .map_err(|e| BlockRejection::Root(e.to_string()))?;

    Ok(RootBlock {
        timestamp: Timestamp::from_be_bytes(timestamp),
        root,
        size: block_size,
    })
}
