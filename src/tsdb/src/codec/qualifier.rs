use std::fmt::{Debug, Formatter};

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use tsdb_utils::time::{is_ms_timestamp, MS_PER_SECOND};

use crate::codec::value::value_len;
use crate::codec::{
    FLAGS_MASK, FLAG_BITS, FLAG_FLOAT, MAX_MS_DELTA, MAX_SECOND_DELTA, MS_BYTE_FLAG, MS_FLAG,
    MS_FLAG_BITS, MS_OFFSET_MASK,
};
use crate::error::{Result, TsdbError};

/// Qualifier locates one sample inside a row and describes the shape of its value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qualifier {
    Seconds(u16),
    Millis(u32),
}

impl Qualifier {
    pub fn len(&self) -> usize {
        match self {
            Qualifier::Seconds(_) => 2,
            Qualifier::Millis(_) => 4,
        }
    }

    pub fn is_millis(&self) -> bool {
        matches!(self, Qualifier::Millis(_))
    }

    pub fn flags(&self) -> u16 {
        match *self {
            Qualifier::Seconds(q) => q & FLAGS_MASK,
            Qualifier::Millis(q) => (q as u16) & FLAGS_MASK,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.flags() & FLAG_FLOAT == 0
    }

    /// value_len returns the size of the value this qualifier describes.
    pub fn value_len(&self) -> usize {
        value_len(self.flags())
    }

    /// offset_ms returns the sample's offset from the row base time in milliseconds.
    pub fn offset_ms(&self) -> u32 {
        match *self {
            Qualifier::Seconds(q) => (q >> FLAG_BITS) as u32 * MS_PER_SECOND as u32,
            Qualifier::Millis(q) => (q >> MS_FLAG_BITS) & MS_OFFSET_MASK,
        }
    }

    /// delta_seconds returns the sample's offset from the row base time in whole seconds.
    pub fn delta_seconds(&self) -> u32 {
        match *self {
            Qualifier::Seconds(q) => (q >> FLAG_BITS) as u32,
            Qualifier::Millis(_) => self.offset_ms() / MS_PER_SECOND as u32,
        }
    }

    pub fn put<B: BufMut>(&self, buf: &mut B) {
        match *self {
            Qualifier::Seconds(q) => buf.put_u16(q),
            Qualifier::Millis(q) => buf.put_u32(q),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        self.put(&mut buf);
        buf.freeze()
    }

    /// decode reads the qualifier at the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(TsdbError::InvalidValue(format!(
                "truncated qualifier: {:?}",
                bytes
            )));
        }
        if bytes[0] & MS_BYTE_FLAG == MS_BYTE_FLAG {
            if bytes.len() < 4 {
                return Err(TsdbError::InvalidValue(format!(
                    "truncated millisecond qualifier: {:?}",
                    bytes
                )));
            }
            Ok(Qualifier::Millis(BigEndian::read_u32(bytes)))
        } else {
            Ok(Qualifier::Seconds(BigEndian::read_u16(bytes)))
        }
    }
}

impl Debug for Qualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_integer() { "long" } else { "float" };
        match self {
            Qualifier::Seconds(_) => write!(f, "+{}s:{}/{}", self.delta_seconds(), kind, self.value_len()),
            Qualifier::Millis(_) => write!(f, "+{}ms:{}/{}", self.offset_ms(), kind, self.value_len()),
        }
    }
}

fn check_delta(delta: i64, max: i64) -> Result<()> {
    if delta < 0 || delta > max {
        return Err(TsdbError::WindowOverflow { delta, max });
    }
    Ok(())
}

/// encode_qualifier packs the offset of a second timestamp from `base_time` with `flags`.
pub fn encode_qualifier(timestamp_secs: i64, base_time: u32, flags: u16) -> Result<[u8; 2]> {
    let delta = timestamp_secs - base_time as i64;
    check_delta(delta, MAX_SECOND_DELTA)?;

    let q = ((delta as u16) << FLAG_BITS) | (flags & FLAGS_MASK);
    Ok(q.to_be_bytes())
}

/// encode_ms_qualifier packs the offset of a millisecond timestamp from `base_time` with `flags`.
pub fn encode_ms_qualifier(timestamp_ms: i64, base_time: u32, flags: u16) -> Result<[u8; 4]> {
    let delta = timestamp_ms - base_time as i64 * MS_PER_SECOND;
    check_delta(delta, MAX_MS_DELTA)?;

    let q = MS_FLAG | ((delta as u32) << MS_FLAG_BITS) | (flags & FLAGS_MASK) as u32;
    Ok(q.to_be_bytes())
}

/// build_qualifier picks the qualifier form matching the resolution of `timestamp`.
pub fn build_qualifier(timestamp: i64, base_time: u32, flags: u16) -> Result<Qualifier> {
    if is_ms_timestamp(timestamp) {
        let q = encode_ms_qualifier(timestamp, base_time, flags)?;
        Ok(Qualifier::Millis(u32::from_be_bytes(q)))
    } else {
        let q = encode_qualifier(timestamp, base_time, flags)?;
        Ok(Qualifier::Seconds(u16::from_be_bytes(q)))
    }
}

/// decode_delta returns the offset in seconds stored in an encoded qualifier.
pub fn decode_delta(qualifier: &[u8]) -> Result<u32> {
    Qualifier::decode(qualifier).map(|q| q.delta_seconds())
}

pub fn decode_is_integer(qualifier: &[u8]) -> Result<bool> {
    Qualifier::decode(qualifier).map(|q| q.is_integer())
}
