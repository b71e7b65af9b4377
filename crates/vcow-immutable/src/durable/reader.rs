//! Byte cursor used by every decoder.

use std::io::{self, Cursor, Read};

use crate::{DurableError, DurableResult};

/// Deepest nesting of durable values a [`Reader`] will decode.
///
/// Collection trees are logarithmically deep, so well-formed data stays far
/// below this; corrupt input stops here instead of exhausting the stack.
pub const MAX_NESTING_DEPTH: usize = 512;

/// Cursor over encoded bytes.
///
/// Decoders advance the cursor past everything they consume, so nested
/// values can be read one after another. The reader also tracks how deeply
/// the value being decoded is nested.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
    depth: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            depth: 0,
        }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        let bytes: &'a [u8] = *self.cursor.get_ref();
        &bytes[self.position().min(bytes.len())..]
    }

    /// Borrow the next `len` bytes and move past them.
    ///
    /// `len` is checked against the remaining input first, so a corrupt
    /// length prefix cannot trigger a huge allocation.
    pub fn take_bytes(&mut self, len: usize) -> DurableResult<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining.len() {
            return Err(DurableError::malformed(format!(
                "length prefix {len} exceeds {} remaining bytes",
                remaining.len()
            )));
        }
        self.cursor.set_position((self.position() + len) as u64);
        Ok(&remaining[..len])
    }

    /// Nesting depth of the value currently being decoded.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Step into a nested value.
    pub(crate) fn enter(&mut self) -> DurableResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(DurableError::malformed(format!(
                "values nested deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

impl Read for Reader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}
