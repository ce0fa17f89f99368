use std::sync::atomic::{AtomicU64, Ordering};

/// WriteStats counts write path outcomes across every writer of a [`Tsdb`](crate::tsdb::Tsdb).
#[derive(Debug, Default)]
pub struct WriteStats {
    metric_rejections: AtomicU64,
    points_written: AtomicU64,
    points_filtered: AtomicU64,
    out_of_order_delegated: AtomicU64,
    rollovers: AtomicU64,
}

impl WriteStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr_metric_rejections(&self) {
        self.metric_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_points_written(&self) {
        self.points_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_points_filtered(&self) {
        self.points_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_out_of_order_delegated(&self) {
        self.out_of_order_delegated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_rollovers(&self) {
        self.rollovers.fetch_add(1, Ordering::Relaxed);
    }

    /// metric_rejections counts writes refused because their metric had no id.
    pub fn metric_rejections(&self) -> u64 {
        self.metric_rejections.load(Ordering::Relaxed)
    }

    pub fn points_written(&self) -> u64 {
        self.points_written.load(Ordering::Relaxed)
    }

    pub fn points_filtered(&self) -> u64 {
        self.points_filtered.load(Ordering::Relaxed)
    }

    pub fn out_of_order_delegated(&self) -> u64 {
        self.out_of_order_delegated.load(Ordering::Relaxed)
    }

    pub fn rollovers(&self) -> u64 {
        self.rollovers.load(Ordering::Relaxed)
    }
}
