#[macro_use]
extern crate async_trait;

pub mod error;
pub mod flush;
pub mod memory;
pub mod request;

pub use error::StoreError;
pub use flush::FlushInterval;
pub use memory::MemoryStore;
pub use request::{AppendRequest, PutRequest};

/// StoreClient is the sorted key-value store the write path dispatches to.
///
/// Implementations own durability, buffering and retries; callers only observe the
/// completion of each request.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// put stores `value` under `qualifier` in the row, replacing any previous cell.
    async fn put(&self, request: PutRequest) -> Result<(), StoreError>;

    /// append concatenates `value` to the cell at `qualifier`, creating it when absent.
    async fn append(&self, request: AppendRequest) -> Result<(), StoreError>;

    /// flush_interval returns how long (in ms) non-durable edits are buffered.
    fn flush_interval(&self) -> u16;

    fn set_flush_interval(&self, interval_ms: u16);
}
