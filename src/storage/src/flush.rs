use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

/// FlushInterval is a shared handle to the store client's buffering interval (ms).
///
/// Every clone observes the same value, so all writers sharing a client also share the
/// interval and the last `set` wins.
#[derive(Debug, Clone, Default)]
pub struct FlushInterval(Arc<AtomicU16>);

impl FlushInterval {
    pub fn new(interval_ms: u16) -> Self {
        Self(Arc::new(AtomicU16::new(interval_ms)))
    }

    pub fn get(&self) -> u16 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, interval_ms: u16) {
        self.0.store(interval_ms, Ordering::SeqCst);
    }
}
