//! 256-bit content checksum.

use std::fmt;

use bytes::BufMut;
use sha2::{Digest, Sha256};

use super::registry::kind_mismatch;
use super::{Codec, Reader, Registry, Value, ValueKind};
use crate::DurableResult;

/// Length of the hash in bytes.
pub const CS256_LEN: usize = 32;

/// SHA-256 digest used to validate persisted blocks.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cs256([u8; CS256_LEN]);

impl Cs256 {
    /// Hash `data`.
    #[must_use]
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; CS256_LEN]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; CS256_LEN] {
        &self.0
    }
}

impl fmt::Debug for Cs256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cs256(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// Fixed 32-byte payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumCodec;

impl Codec for ChecksumCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Checksum
    }

    fn name(&self) -> &'static str {
        "cs256"
    }

    fn payload_len(&self, _value: &Value, _registry: &Registry) -> DurableResult<usize> {
        Ok(CS256_LEN)
    }

    fn write_payload(
        &self,
        value: &Value,
        out: &mut Vec<u8>,
        _registry: &Registry,
    ) -> DurableResult<()> {
        let Value::Checksum(cs) = value else {
            return Err(kind_mismatch(ValueKind::Checksum, value));
        };
        out.put_slice(cs.as_bytes());
        Ok(())
    }

    fn read_payload(&self, reader: &mut Reader<'_>, _registry: &Registry) -> DurableResult<Value> {
        let mut bytes = [0u8; CS256_LEN];
        std::io::Read::read_exact(reader, &mut bytes)?;
        Ok(Value::Checksum(Cs256(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_of_empty_input() {
        let cs = Cs256::digest(b"");
        assert_eq!(cs.as_bytes()[..4], [0xe3, 0xb0, 0xc4, 0x42]);
    }

    #[test]
    fn test_digest_differs_on_single_bit() {
        assert_ne!(Cs256::digest(&[0b0000_0000]), Cs256::digest(&[0b0000_0001]));
    }

    #[test]
    fn test_encoded_checksum_is_34_bytes() {
        let registry = Registry::standard();
        let value = Value::Checksum(Cs256::digest(b"block"));
        let bytes = registry.to_bytes(&value).unwrap();
        assert_eq!(bytes.len(), 34);
        assert_eq!(registry.from_bytes(&bytes).unwrap(), value);
    }
}
