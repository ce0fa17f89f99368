use common_base::error::ValidationError;
use thiserror::Error;
use tsdb_storage::StoreError;

use crate::uid::UniqueIdKind;

/// Errors raised by the ingest write path.
///
/// Everything up to and including `OutOfOrder` is returned synchronously by `add_point`
/// before any write is attempted; the remaining variants surface through the pending write.
#[derive(Error, Debug)]
pub enum TsdbError {
    #[error("invalid series: {0}")]
    InvalidSeries(#[from] ValidationError),

    #[error("invalid timestamp {timestamp}: {reason}")]
    InvalidTimestamp { timestamp: i64, reason: &'static str },

    #[error("new timestamp {timestamp_ms}ms is less than or equal to previous {last_ms}ms")]
    OutOfOrder { timestamp_ms: i64, last_ms: i64 },

    #[error("set_series() never called")]
    NotInitialized,

    #[error("offset {delta} does not fit the qualifier (max {max})")]
    WindowOverflow { delta: i64, max: i64 },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("value #{index} is not a {expected}")]
    TypeMismatch { index: usize, expected: &'static str },

    #[error("index {index} out of range for {size} samples")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("no {kind} id for \"{name}\"")]
    UnresolvedIdentity { kind: UniqueIdKind, name: String },

    #[error("{kind} id space exhausted ({width} bytes)")]
    UidExhausted { kind: UniqueIdKind, width: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("admission filter failed: {0}")]
    Filter(#[source] BoxError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl TsdbError {
    /// is_rejected returns true for caller errors detected before anything was written.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            TsdbError::InvalidSeries(_)
                | TsdbError::InvalidTimestamp { .. }
                | TsdbError::OutOfOrder { .. }
                | TsdbError::NotInitialized
                | TsdbError::InvalidValue(_)
        )
    }

    /// is_point_rejected returns true when only the offending point was refused: caller
    /// errors, plus identity and window failures reported by the pending write. Store,
    /// filter and configuration failures are not point-local.
    pub fn is_point_rejected(&self) -> bool {
        self.is_rejected()
            || matches!(
                self,
                TsdbError::UnresolvedIdentity { .. } | TsdbError::WindowOverflow { .. }
            )
    }
}

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, TsdbError>;
