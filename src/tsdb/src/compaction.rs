use std::collections::BTreeMap;
use std::sync::Mutex;

use bytes::Bytes;

/// CompactionScheduler is told when a row stops receiving writes.
///
/// The hint is fire-and-forget: nothing on the write path waits for or depends on it.
pub trait CompactionScheduler: Send + Sync {
    fn schedule_for_compaction(&self, row: &Bytes, base_time: u32);
}

#[derive(Debug, Default)]
pub struct NoopCompactionScheduler;

impl CompactionScheduler for NoopCompactionScheduler {
    fn schedule_for_compaction(&self, _row: &Bytes, _base_time: u32) {}
}

/// CompactionQueue collects closed rows in key order until their window has elapsed.
pub struct CompactionQueue {
    window: u32,
    rows: Mutex<BTreeMap<Bytes, u32>>,
}

impl CompactionQueue {
    pub fn new(window_seconds: u32) -> Self {
        Self {
            window: window_seconds,
            rows: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, row: &[u8]) -> bool {
        self.rows.lock().unwrap().contains_key(row)
    }

    /// drain_ready removes and returns, in key order, the rows whose window ended at or
    /// before `now_secs`.
    pub fn drain_ready(&self, now_secs: i64) -> Vec<(Bytes, u32)> {
        let mut rows = self.rows.lock().unwrap();
        let ready: Vec<Bytes> = rows
            .iter()
            .filter(|(_, base_time)| **base_time as i64 + self.window as i64 <= now_secs)
            .map(|(row, _)| row.clone())
            .collect();

        ready
            .into_iter()
            .filter_map(|row| rows.remove(&row).map(|base_time| (row, base_time)))
            .collect()
    }
}

impl CompactionScheduler for CompactionQueue {
    fn schedule_for_compaction(&self, row: &Bytes, base_time: u32) {
        self.rows.lock().unwrap().insert(row.clone(), base_time);
    }
}
