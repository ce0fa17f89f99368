//! Configuration of the ingest write path.

use serde::{Deserialize, Serialize};

use crate::codec::MAX_BASE_TIME_WINDOW;
use crate::error::{Result, TsdbError};

/// Column family every data point is written to.
pub const FAMILY: &[u8] = b"t";

/// For how long to buffer edits when doing batch imports (in ms).
pub const DEFAULT_BATCH_IMPORT_BUFFER_INTERVAL: u16 = 5000;

/// Configuration for a [`Tsdb`](crate::tsdb::Tsdb) instance.
///
/// Every field has a default so partial JSON documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsdbConfig {
    /// Table data points are written to.
    pub table: String,

    /// Hand points at or before a writer's last timestamp to the generic write path
    /// instead of rejecting them.
    pub allow_out_of_order_timestamps: bool,

    /// Create metric ids on first use. When off, unknown metrics are rejected at write time.
    pub auto_create_metrics: bool,

    /// Create tag key/value ids on first use. When off, unknown tags fail `set_series`.
    pub auto_create_tags: bool,

    /// Issue appends of `qualifier + value` to a single column instead of one put per sample.
    pub use_append_writes: bool,

    pub max_tags: usize,

    /// Width of the time range covered by one row, in seconds.
    pub base_time_window_seconds: u32,

    /// Flush interval raised on the store client while batch import is on.
    pub default_batch_buffer_ms: u16,

    pub metric_width: usize,
    pub tag_name_width: usize,
    pub tag_value_width: usize,

    /// Width of the salt prefix; 0 disables salting.
    pub salt_width: usize,
    pub salt_buckets: u32,

    /// Extra characters allowed in metric names and tags.
    pub allowed_special_chars: String,
}

impl Default for TsdbConfig {
    fn default() -> Self {
        Self {
            table: "tsdb".to_string(),
            allow_out_of_order_timestamps: false,
            auto_create_metrics: true,
            auto_create_tags: true,
            use_append_writes: false,
            max_tags: 8,
            base_time_window_seconds: 3600,
            default_batch_buffer_ms: DEFAULT_BATCH_IMPORT_BUFFER_INTERVAL,
            metric_width: 3,
            tag_name_width: 3,
            tag_value_width: 3,
            salt_width: 0,
            salt_buckets: 20,
            allowed_special_chars: String::new(),
        }
    }
}

impl TsdbConfig {
    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(TsdbError::Config("table must not be empty".to_string()));
        }
        if self.max_tags == 0 {
            return Err(TsdbError::Config("max_tags must be at least 1".to_string()));
        }
        if self.base_time_window_seconds == 0
            || self.base_time_window_seconds > MAX_BASE_TIME_WINDOW
        {
            return Err(TsdbError::Config(format!(
                "base_time_window_seconds must be in 1..={}, got {}",
                MAX_BASE_TIME_WINDOW, self.base_time_window_seconds
            )));
        }
        for (name, width) in [
            ("metric_width", self.metric_width),
            ("tag_name_width", self.tag_name_width),
            ("tag_value_width", self.tag_value_width),
        ] {
            if width == 0 || width > 8 {
                return Err(TsdbError::Config(format!(
                    "{} must be in 1..=8, got {}",
                    name, width
                )));
            }
        }
        if self.salt_width > 8 {
            return Err(TsdbError::Config(format!(
                "salt_width must be in 0..=8, got {}",
                self.salt_width
            )));
        }
        if self.salt_width > 0 {
            let max_buckets = 1_u64 << (8 * self.salt_width.min(4)) as u32;
            if self.salt_buckets == 0 || self.salt_buckets as u64 > max_buckets {
                return Err(TsdbError::Config(format!(
                    "salt_buckets must be in 1..={} for a {} byte salt, got {}",
                    max_buckets, self.salt_width, self.salt_buckets
                )));
            }
        }
        Ok(())
    }
}
