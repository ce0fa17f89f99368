use chrono::{DateTime, Utc};

/// Mask selecting the bits a second-resolution timestamp never uses. A timestamp with any
/// of these bits set is interpreted as milliseconds.
pub const SECOND_MASK: i64 = 0xFFFF_FFFF_0000_0000_u64 as i64;

/// Largest millisecond timestamp accepted by the write path (13 digits).
pub const MAX_MS_TIMESTAMP: i64 = 9_999_999_999_999;

pub const MS_PER_SECOND: i64 = 1000;

/// is_ms_timestamp returns true when the timestamp does not fit the second-resolution range.
#[inline]
pub fn is_ms_timestamp(timestamp: i64) -> bool {
    (timestamp & SECOND_MASK) != 0
}

/// to_millis normalizes a second or millisecond timestamp to milliseconds.
#[inline]
pub fn to_millis(timestamp: i64) -> i64 {
    if is_ms_timestamp(timestamp) {
        timestamp
    } else {
        timestamp * MS_PER_SECOND
    }
}

/// to_seconds drops the millisecond part of a second or millisecond timestamp.
#[inline]
pub fn to_seconds(timestamp: i64) -> i64 {
    if is_ms_timestamp(timestamp) {
        timestamp / MS_PER_SECOND
    } else {
        timestamp
    }
}

pub fn unix_secs_to_time(unix_secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(unix_secs, 0)
}

pub fn time_format(dt: DateTime<Utc>) -> String {
    format!("{}", dt.format("%Y-%m-%d %H:%M:%S"))
}
