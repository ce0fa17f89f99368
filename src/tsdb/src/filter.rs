use common_base::point::Tags;

use crate::error::BoxError;

/// WriteFilter decides whether a data point gets persisted.
///
/// It is consulted at most once per point, after validation and before anything is
/// encoded. A denied point completes successfully without a write.
#[async_trait]
pub trait WriteFilter: Send + Sync {
    /// filter_data_points lets an installed filter switch itself off.
    fn filter_data_points(&self) -> bool {
        true
    }

    /// allow_data_point returns whether the point should be written. `timestamp_ms` is
    /// always in milliseconds; `value` and `flags` are the encoded value.
    async fn allow_data_point(
        &self,
        metric: &str,
        timestamp_ms: i64,
        value: &[u8],
        tags: &Tags,
        flags: u16,
    ) -> Result<bool, BoxError>;
}
