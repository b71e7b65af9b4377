//! Codecs for scalar values.

use std::sync::Arc;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::BufMut;

use super::registry::kind_mismatch;
use super::{Codec, Reader, Registry, Value, ValueKind};
use crate::{DurableError, DurableResult};

/// Write a 32-bit length prefix.
pub(crate) fn put_len(out: &mut Vec<u8>, len: usize) -> DurableResult<()> {
    let len = u32::try_from(len).map_err(|_| DurableError::TooLong(len))?;
    out.put_u32(len);
    Ok(())
}

/// Read a 32-bit length prefix and borrow that many bytes.
pub(crate) fn read_len_prefixed<'a>(reader: &mut Reader<'a>) -> DurableResult<&'a [u8]> {
    let len = reader.read_u32::<BigEndian>()? as usize;
    reader.take_bytes(len)
}

/// Codecs whose value is fully identified by the tag.
macro_rules! zero_payload_codec {
    ($(#[$meta:meta])* $name:ident, $kind:expr, $value:expr, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Codec for $name {
            fn kind(&self) -> ValueKind {
                $kind
            }

            fn name(&self) -> &'static str {
                $label
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

            fn read_payload(
                &self,
                _reader: &mut Reader<'_>,
                _registry: &Registry,
            ) -> DurableResult<Value> {
                Ok($value)
            }
        }
    };
}

zero_payload_codec!(
    /// `null`: tag only.
    NullCodec,
    ValueKind::Null,
    Value::Null,
    "null"
);
zero_payload_codec!(
    /// `true`: tag only.
    TrueCodec,
    ValueKind::True,
    Value::Bool(true),
    "true"
);
zero_payload_codec!(
    /// `false`: tag only.
    FalseCodec,
    ValueKind::False,
    Value::Bool(false),
    "false"
);

/// 32-bit signed integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntCodec;

impl Codec for IntCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Int
    }

    fn name(&self) -> &'static str {
        "int"
    }

    fn payload_len(&self, _value: &Value, _registry: &Registry) -> DurableResult<usize> {
        Ok(4)
    }

    fn write_payload(
        &self,
        value: &Value,
        out: &mut Vec<u8>,
        _registry: &Registry,
    ) -> DurableResult<()> {
        let Value::Int(v) = value else {
            return Err(kind_mismatch(ValueKind::Int, value));
        };
        out.put_i32(*v);
        Ok(())
    }

    fn read_payload(&self, reader: &mut Reader<'_>, _registry: &Registry) -> DurableResult<Value> {
        Ok(Value::Int(reader.read_i32::<BigEndian>()?))
    }
}

/// 64-bit signed integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongCodec;

impl Codec for LongCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Long
    }

    fn name(&self) -> &'static str {
        "long"
    }

    fn payload_len(&self, _value: &Value, _registry: &Registry) -> DurableResult<usize> {
        Ok(8)
    }

    fn write_payload(
        &self,
        value: &Value,
        out: &mut Vec<u8>,
        _registry: &Registry,
    ) -> DurableResult<()> {
        let Value::Long(v) = value else {
            return Err(kind_mismatch(ValueKind::Long, value));
        };
        out.put_i64(*v);
        Ok(())
    }

    fn read_payload(&self, reader: &mut Reader<'_>, _registry: &Registry) -> DurableResult<Value> {
        Ok(Value::Long(reader.read_i64::<BigEndian>()?))
    }
}

/// IEEE 754 double.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleCodec;

impl Codec for DoubleCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Double
    }

    fn name(&self) -> &'static str {
        "double"
    }

    fn payload_len(&self, _value: &Value, _registry: &Registry) -> DurableResult<usize> {
        Ok(8)
    }

    fn write_payload(
        &self,
        value: &Value,
        out: &mut Vec<u8>,
        _registry: &Registry,
    ) -> DurableResult<()> {
        let Value::Double(v) = value else {
            return Err(kind_mismatch(ValueKind::Double, value));
        };
        out.put_f64(*v);
        Ok(())
    }

    fn read_payload(&self, reader: &mut Reader<'_>, _registry: &Registry) -> DurableResult<Value> {
        Ok(Value::Double(reader.read_f64::<BigEndian>()?))
    }
}

/// UTF-8 string with a 32-bit byte length prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrCodec;

impl Codec for StrCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Str
    }

    fn name(&self) -> &'static str {
        "str"
    }

    fn payload_len(&self, value: &Value, _registry: &Registry) -> DurableResult<usize> {
        let Value::Str(s) = value else {
            return Err(kind_mismatch(ValueKind::Str, value));
        };
        Ok(4 + s.len())
    }

    fn write_payload(
        &self,
        value: &Value,
        out: &mut Vec<u8>,
        _registry: &Registry,
    ) -> DurableResult<()> {
        let Value::Str(s) = value else {
            return Err(kind_mismatch(ValueKind::Str, value));
        };
        put_len(out, s.len())?;
        out.put_slice(s.as_bytes());
        Ok(())
    }

    fn read_payload(&self, reader: &mut Reader<'_>, _registry: &Registry) -> DurableResult<Value> {
        let bytes = read_len_prefixed(reader)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|e| DurableError::malformed(format!("invalid utf-8 in string: {e}")))?;
        Ok(Value::Str(Arc::from(s)))
    }
}

/// Raw bytes with a 32-bit length prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Bytes
    }

    fn name(&self) -> &'static str {
        "bytes"
    }

    fn payload_len(&self, value: &Value, _registry: &Registry) -> DurableResult<usize> {
        let Value::Bytes(b) = value else {
            return Err(kind_mismatch(ValueKind::Bytes, value));
        };
        Ok(4 + b.len())
    }

    fn write_payload(
        &self,
        value: &Value,
        out: &mut Vec<u8>,
        _registry: &Registry,
    ) -> DurableResult<()> {
        let Value::Bytes(b) = value else {
            return Err(kind_mismatch(ValueKind::Bytes, value));
        };
        put_len(out, b.len())?;
        out.put_slice(b);
        Ok(())
    }

    fn read_payload(&self, reader: &mut Reader<'_>, _registry: &Registry) -> DurableResult<Value> {
        Ok(Value::Bytes(Arc::from(read_len_prefixed(reader)?)))
    }
}
