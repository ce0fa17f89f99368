//! Packed qualifier/value encoding of the samples stored in a row.
//!
//! Second-resolution qualifier (2 bytes):
//!
//! ```text
//! | delta seconds (12 bits) | float (1 bit) | value length - 1 (3 bits) |
//! ```
//!
//! Millisecond qualifier (4 bytes):
//!
//! ```text
//! | 1111 | delta ms (22 bits) | reserved (2 bits) | float (1 bit) | value length - 1 (3 bits) |
//! ```

pub mod append;
pub mod qualifier;
pub mod value;

/// Number of LSBs in a qualifier used to store flags.
pub const FLAG_BITS: u32 = 4;

/// Number of LSBs in a millisecond qualifier below the offset (flags + reserved bits).
pub const MS_FLAG_BITS: u32 = 6;

/// When this bit is set, the value is a floating point value.
pub const FLAG_FLOAT: u16 = 0x8;

/// Mask selecting the size of the value from the flags.
pub const LENGTH_MASK: u16 = 0x7;

/// Mask selecting the flags from a qualifier.
pub const FLAGS_MASK: u16 = FLAG_FLOAT | LENGTH_MASK;

/// Marker in the first byte of a millisecond qualifier.
pub const MS_BYTE_FLAG: u8 = 0xF0;

/// Marker bits of a millisecond qualifier.
pub const MS_FLAG: u32 = 0xF000_0000;

/// Mask selecting the millisecond offset once shifted down by [`MS_FLAG_BITS`].
pub const MS_OFFSET_MASK: u32 = 0x003F_FFFF;

/// Widest row window (seconds). Second deltas below this keep the first qualifier byte
/// under [`MS_BYTE_FLAG`], so both qualifier forms stay distinguishable.
pub const MAX_BASE_TIME_WINDOW: u32 = 0xF00;

/// Largest delta a second-resolution qualifier stores.
pub const MAX_SECOND_DELTA: i64 = MAX_BASE_TIME_WINDOW as i64 - 1;

/// Largest offset a millisecond qualifier stores.
pub const MAX_MS_DELTA: i64 = MS_OFFSET_MASK as i64;

/// Size in bytes of the base time stored in a row key.
pub const TIMESTAMP_BYTES: usize = 4;
