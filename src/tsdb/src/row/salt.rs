use tsdb_utils::hash::hash_parts;

use crate::codec::TIMESTAMP_BYTES;
use crate::config::TsdbConfig;

/// Salter spreads row keys across store partitions by rewriting a fixed-width prefix.
pub trait Salter: Send + Sync {
    /// width of the salt prefix in bytes.
    fn width(&self) -> usize;

    /// prefix_key_with_salt overwrites the salt prefix of `row`. Only ever called on a row
    /// buffer that has not been handed to a write yet.
    fn prefix_key_with_salt(&self, row: &mut [u8]);
}

/// NoSalt leaves rows unprefixed.
#[derive(Debug, Default)]
pub struct NoSalt;

impl Salter for NoSalt {
    fn width(&self) -> usize {
        0
    }

    fn prefix_key_with_salt(&self, _row: &mut [u8]) {}
}

/// BucketSalter writes `hash(metric id + tag ids) % buckets` into the salt prefix.
///
/// The base time does not take part in the hash, so every row of a series lands in the
/// same bucket.
#[derive(Debug)]
pub struct BucketSalter {
    width: usize,
    buckets: u32,
    metric_width: usize,
}

impl BucketSalter {
    pub fn new(width: usize, buckets: u32, metric_width: usize) -> Self {
        Self {
            width,
            buckets,
            metric_width,
        }
    }

    pub fn from_config(config: &TsdbConfig) -> Self {
        Self::new(config.salt_width, config.salt_buckets, config.metric_width)
    }

    pub fn bucket(&self, row: &[u8]) -> u32 {
        let metric_end = self.width + self.metric_width;
        let tags_start = metric_end + TIMESTAMP_BYTES;
        let h = hash_parts(&[&row[self.width..metric_end], &row[tags_start..]]);
        (h % self.buckets as u64) as u32
    }
}

impl Salter for BucketSalter {
    fn width(&self) -> usize {
        self.width
    }

    fn prefix_key_with_salt(&self, row: &mut [u8]) {
        if self.width == 0 {
            return;
        }
        let bucket = (self.bucket(row) as u64).to_be_bytes();
        row[..self.width].copy_from_slice(&bucket[8 - self.width..]);
    }
}

/// salter_from_config returns a [`BucketSalter`] when salting is configured, else [`NoSalt`].
pub fn salter_from_config(config: &TsdbConfig) -> Box<dyn Salter> {
    if config.salt_width > 0 {
        Box::new(BucketSalter::from_config(config))
    } else {
        Box::new(NoSalt)
    }
}

#[cfg(test)]
mod tests {
    use crate::row::salt::{BucketSalter, Salter};

    #[test]
    fn test_bucket_ignores_base_time() {
        let salter = BucketSalter::new(1, 20, 3);
        // salt | metric | base time | tagk | tagv
        let mut a = vec![0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1];
        let mut b = a.clone();
        b[4..8].copy_from_slice(&3600_u32.to_be_bytes());

        salter.prefix_key_with_salt(&mut a);
        salter.prefix_key_with_salt(&mut b);
        assert_eq!(a[0], b[0]);
        assert!((a[0] as u32) < 20);
        assert_eq!(&a[1..4], &[0, 0, 1]);
    }

    #[test]
    fn test_bucket_width_two() {
        let salter = BucketSalter::new(2, 1000, 3);
        let mut row = vec![0xFF, 0xFF, 0, 0, 7, 0, 0, 0, 0, 0, 0, 2, 0, 0, 3];
        salter.prefix_key_with_salt(&mut row);
        let bucket = u16::from_be_bytes([row[0], row[1]]);
        assert!(bucket < 1000);
        assert_eq!(bucket as u32, salter.bucket(&row));
    }
}
