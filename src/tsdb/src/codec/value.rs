use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use common_base::point::DataValue;

use crate::codec::{FLAG_FLOAT, LENGTH_MASK};
use crate::error::{Result, TsdbError};

/// EncodedValue is a value payload together with the qualifier flags describing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedValue {
    pub bytes: Bytes,
    pub flags: u16,
}

impl EncodedValue {
    pub fn is_integer(&self) -> bool {
        self.flags & FLAG_FLOAT == 0
    }

    /// raw returns the value widened to 64 bits: the sign-extended integer, or the bit
    /// pattern of the float.
    pub fn raw(&self) -> i64 {
        if self.is_integer() {
            decode_integer(&self.bytes)
        } else {
            BigEndian::read_u32(&self.bytes) as i64
        }
    }
}

/// encode_value encodes an integer on the fewest bytes that hold it, and a float on 4 bytes.
pub fn encode_value(value: DataValue) -> Result<EncodedValue> {
    match value {
        DataValue::Integer(v) => Ok(encode_long(v)),
        DataValue::Float(v) => encode_float(v),
    }
}

pub fn encode_long(value: i64) -> EncodedValue {
    let mut buf = BytesMut::with_capacity(8);
    if i8::MIN as i64 <= value && value <= i8::MAX as i64 {
        buf.put_i8(value as i8);
    } else if i16::MIN as i64 <= value && value <= i16::MAX as i64 {
        buf.put_i16(value as i16);
    } else if i32::MIN as i64 <= value && value <= i32::MAX as i64 {
        buf.put_i32(value as i32);
    } else {
        buf.put_i64(value);
    }

    // Just the length.
    let flags = (buf.len() - 1) as u16;
    EncodedValue {
        bytes: buf.freeze(),
        flags,
    }
}

pub fn encode_float(value: f32) -> Result<EncodedValue> {
    if value.is_nan() || value.is_infinite() {
        return Err(TsdbError::InvalidValue(format!(
            "value is NaN or Infinite: {}",
            value
        )));
    }

    let mut buf = BytesMut::with_capacity(4);
    buf.put_u32(value.to_bits());
    Ok(EncodedValue {
        bytes: buf.freeze(),
        // A float stored on 4 bytes.
        flags: FLAG_FLOAT | 0x3,
    })
}

/// value_len returns the payload size encoded in `flags`.
#[inline]
pub fn value_len(flags: u16) -> usize {
    ((flags & LENGTH_MASK) + 1) as usize
}

fn check_len(flags: u16, bytes: &[u8]) -> Result<()> {
    if bytes.len() != value_len(flags) {
        return Err(TsdbError::InvalidValue(format!(
            "flags {:#x} expect {} bytes, got {}",
            flags,
            value_len(flags),
            bytes.len()
        )));
    }
    Ok(())
}

fn decode_integer(bytes: &[u8]) -> i64 {
    match bytes.len() {
        1 => bytes[0] as i8 as i64,
        2 => BigEndian::read_i16(bytes) as i64,
        4 => BigEndian::read_i32(bytes) as i64,
        _ => BigEndian::read_i64(bytes),
    }
}

/// decode_long decodes an integer payload; fails with `TypeMismatch` for float flags.
pub fn decode_long(flags: u16, bytes: &[u8]) -> Result<i64> {
    if flags & FLAG_FLOAT != 0 {
        return Err(TsdbError::TypeMismatch {
            index: 0,
            expected: "long",
        });
    }
    check_len(flags, bytes)?;
    match bytes.len() {
        1 | 2 | 4 | 8 => Ok(decode_integer(bytes)),
        n => Err(TsdbError::InvalidValue(format!(
            "integer on {} bytes",
            n
        ))),
    }
}

/// decode_float decodes a 4-byte float or 8-byte double payload; fails with
/// `TypeMismatch` for integer flags.
pub fn decode_float(flags: u16, bytes: &[u8]) -> Result<f64> {
    if flags & FLAG_FLOAT == 0 {
        return Err(TsdbError::TypeMismatch {
            index: 0,
            expected: "float",
        });
    }
    check_len(flags, bytes)?;
    match bytes.len() {
        4 => Ok(f32::from_bits(BigEndian::read_u32(bytes)) as f64),
        8 => Ok(f64::from_bits(BigEndian::read_u64(bytes))),
        n => Err(TsdbError::InvalidValue(format!("float on {} bytes", n))),
    }
}

pub fn decode_value(flags: u16, bytes: &[u8]) -> Result<DataValue> {
    if flags & FLAG_FLOAT == 0 {
        decode_long(flags, bytes).map(DataValue::Integer)
    } else {
        decode_float(flags, bytes).map(|v| DataValue::Float(v as f32))
    }
}
