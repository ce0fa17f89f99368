use std::fmt::{Debug, Formatter};
use std::ops::Range;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use common_base::point::Tags;
use common_base::validate::check_metric_and_tags;

use crate::codec::TIMESTAMP_BYTES;
use crate::compaction::CompactionScheduler;
use crate::config::TsdbConfig;
use crate::error::{Result, TsdbError};
use crate::row::salt::Salter;
use crate::uid::{UniqueIdKind, UniqueIdResolver};

/// RowKeyLayout gives the position of every field of a row key.
///
/// ```text
/// | salt | metric id | base time (u32 BE) | tagk id | tagv id | ... |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowKeyLayout {
    pub salt_width: usize,
    pub metric_width: usize,
    pub tag_name_width: usize,
    pub tag_value_width: usize,
}

impl RowKeyLayout {
    pub fn from_config(config: &TsdbConfig) -> Self {
        Self {
            salt_width: config.salt_width,
            metric_width: config.metric_width,
            tag_name_width: config.tag_name_width,
            tag_value_width: config.tag_value_width,
        }
    }

    pub fn metric_range(&self) -> Range<usize> {
        self.salt_width..self.salt_width + self.metric_width
    }

    pub fn timestamp_offset(&self) -> usize {
        self.salt_width + self.metric_width
    }

    pub fn tags_offset(&self) -> usize {
        self.timestamp_offset() + TIMESTAMP_BYTES
    }

    pub fn tag_pair_width(&self) -> usize {
        self.tag_name_width + self.tag_value_width
    }

    pub fn row_len(&self, num_tags: usize) -> usize {
        self.tags_offset() + num_tags * self.tag_pair_width()
    }
}

/// RowKey is the immutable key of one row.
///
/// The bytes may be held by an in-flight write, so changing the base time always yields a
/// new key.
#[derive(Clone, PartialEq, Eq)]
pub struct RowKey {
    bytes: Bytes,
    layout: RowKeyLayout,
    metric_resolved: bool,
}

impl RowKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// bytes returns a shared handle to the key, suitable for a store request.
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn layout(&self) -> &RowKeyLayout {
        &self.layout
    }

    pub fn salt(&self) -> &[u8] {
        &self.bytes[..self.layout.salt_width]
    }

    pub fn base_time(&self) -> u32 {
        BigEndian::read_u32(&self.bytes[self.layout.timestamp_offset()..])
    }

    /// is_metric_resolved is false when the metric had no id and creation was disabled.
    pub fn is_metric_resolved(&self) -> bool {
        self.metric_resolved
    }

    pub fn metric_uid(&self) -> Option<&[u8]> {
        if self.metric_resolved {
            Some(&self.bytes[self.layout.metric_range()])
        } else {
            None
        }
    }

    /// tag_uids returns the (tagk id, tagv id) pairs in key order.
    pub fn tag_uids(&self) -> Vec<(&[u8], &[u8])> {
        self.bytes[self.layout.tags_offset()..]
            .chunks_exact(self.layout.tag_pair_width())
            .map(|pair| pair.split_at(self.layout.tag_name_width))
            .collect()
    }
}

impl Debug for RowKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for b in self.bytes.iter() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// RowKeyBuilder turns series identities into row keys and moves them between windows.
pub struct RowKeyBuilder {
    layout: RowKeyLayout,
    max_tags: usize,
    allowed_special_chars: String,
    auto_create_metrics: bool,
    auto_create_tags: bool,
    uids: Arc<dyn UniqueIdResolver>,
    salter: Arc<dyn Salter>,
    compaction: Arc<dyn CompactionScheduler>,
}

impl RowKeyBuilder {
    pub fn new(
        config: &TsdbConfig,
        uids: Arc<dyn UniqueIdResolver>,
        salter: Arc<dyn Salter>,
        compaction: Arc<dyn CompactionScheduler>,
    ) -> Result<Self> {
        let layout = RowKeyLayout {
            salt_width: salter.width(),
            metric_width: uids.width(UniqueIdKind::Metric),
            tag_name_width: uids.width(UniqueIdKind::TagKey),
            tag_value_width: uids.width(UniqueIdKind::TagValue),
        };
        if layout.metric_width == 0 || layout.tag_name_width == 0 || layout.tag_value_width == 0
        {
            return Err(TsdbError::Config(format!(
                "id widths must be positive: {:?}",
                layout
            )));
        }

        Ok(Self {
            layout,
            max_tags: config.max_tags,
            allowed_special_chars: config.allowed_special_chars.clone(),
            auto_create_metrics: config.auto_create_metrics,
            auto_create_tags: config.auto_create_tags,
            uids,
            salter,
            compaction,
        })
    }

    pub fn layout(&self) -> &RowKeyLayout {
        &self.layout
    }

    /// check_series validates the cardinality and characters of a series identity.
    pub fn check_series(&self, metric: &str, tags: &Tags) -> Result<()> {
        check_metric_and_tags(metric, tags, self.max_tags, &self.allowed_special_chars)?;
        Ok(())
    }

    /// build_template lays out the row key of a series with a zero base time.
    ///
    /// An unknown metric under lookup-only mode still yields a key, with a zeroed metric
    /// id and [`RowKey::is_metric_resolved`] false; writes to it fail later.
    pub fn build_template(&self, metric: &str, tags: &Tags) -> Result<RowKey> {
        self.check_series(metric, tags)?;

        let metric_id = if self.auto_create_metrics {
            Some(self.uids.get_or_create_id(UniqueIdKind::Metric, metric)?)
        } else {
            let id = self.uids.get_id(UniqueIdKind::Metric, metric)?;
            if id.is_none() {
                debug!("no metric id for {}, writes to this series will be rejected", metric);
            }
            id
        };
        let tag_ids = self.resolve_tags(tags)?;

        let mut row = vec![0_u8; self.layout.row_len(tags.len())];
        if let Some(id) = &metric_id {
            row[self.layout.metric_range()].copy_from_slice(id);
        }
        let mut pos = self.layout.tags_offset();
        for (k, v) in &tag_ids {
            row[pos..pos + k.len()].copy_from_slice(k);
            pos += k.len();
            row[pos..pos + v.len()].copy_from_slice(v);
            pos += v.len();
        }
        self.salter.prefix_key_with_salt(&mut row);

        Ok(RowKey {
            bytes: Bytes::from(row),
            layout: self.layout,
            metric_resolved: metric_id.is_some(),
        })
    }

    /// resolve_tags returns the tag id pairs sorted by (tagk id, tagv id).
    fn resolve_tags(&self, tags: &Tags) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut ids = Vec::with_capacity(tags.len());
        for tag in tags.iter() {
            let k = self.resolve(UniqueIdKind::TagKey, &tag.key)?;
            let v = self.resolve(UniqueIdKind::TagValue, &tag.value)?;
            ids.push((k, v));
        }
        ids.sort();
        Ok(ids)
    }

    fn resolve(&self, kind: UniqueIdKind, name: &str) -> Result<Vec<u8>> {
        if self.auto_create_tags {
            return self.uids.get_or_create_id(kind, name);
        }
        self.uids
            .get_id(kind, name)?
            .ok_or_else(|| TsdbError::UnresolvedIdentity {
                kind,
                name: name.to_string(),
            })
    }

    /// with_base_time returns a copy of `row` moved to `base_time`, salt re-applied.
    pub fn with_base_time(&self, row: &RowKey, base_time: u32) -> RowKey {
        let mut bytes = row.bytes.to_vec();
        let offset = self.layout.timestamp_offset();
        BigEndian::write_u32(&mut bytes[offset..offset + TIMESTAMP_BYTES], base_time);
        self.salter.prefix_key_with_salt(&mut bytes);

        RowKey {
            bytes: Bytes::from(bytes),
            layout: row.layout,
            metric_resolved: row.metric_resolved,
        }
    }

    /// roll_to_base_time closes `row` and returns a copy moved to `base_time`.
    ///
    /// The compaction scheduler is told about the closed row with its old base time.
    pub fn roll_to_base_time(&self, row: &RowKey, base_time: u32) -> RowKey {
        let next = self.with_base_time(row, base_time);
        self.compaction
            .schedule_for_compaction(&row.bytes, row.base_time());
        debug!(
            "roll row {:?} from base time {} to {}",
            row,
            row.base_time(),
            base_time
        );
        next
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use common_base::point::{Tag, Tags};
    use rand::seq::SliceRandom;

    use crate::compaction::{CompactionQueue, NoopCompactionScheduler};
    use crate::config::TsdbConfig;
    use crate::error::TsdbError;
    use crate::row::row_key::RowKeyBuilder;
    use crate::row::salt::{BucketSalter, NoSalt};
    use crate::uid::memory::MemoryUniqueIds;
    use crate::uid::{UniqueIdKind, UniqueIdResolver};

    fn builder(config: &TsdbConfig, uids: Arc<MemoryUniqueIds>) -> RowKeyBuilder {
        RowKeyBuilder::new(
            config,
            uids,
            Arc::new(NoSalt),
            Arc::new(NoopCompactionScheduler),
        )
        .unwrap()
    }

    #[test]
    fn test_template_layout() {
        let config = TsdbConfig::default();
        let uids = Arc::new(MemoryUniqueIds::from_config(&config));
        let b = builder(&config, uids.clone());

        let tags: Tags = vec![("host", "web01")].into_iter().collect();
        let row = b.build_template("sys.cpu", &tags).unwrap();

        assert_eq!(row.len(), 3 + 4 + 6);
        assert_eq!(row.base_time(), 0);
        assert!(row.is_metric_resolved());
        assert_eq!(
            row.metric_uid().unwrap(),
            uids.get_id(UniqueIdKind::Metric, "sys.cpu")
                .unwrap()
                .unwrap()
                .as_slice()
        );
        assert_eq!(row.as_bytes(), &[0, 0, 1, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1]);
        assert_eq!(row.tag_uids(), vec![(&[0, 0, 1][..], &[0, 0, 1][..])]);
    }

    #[test]
    fn test_template_is_order_independent() {
        let config = TsdbConfig::default();
        let uids = Arc::new(MemoryUniqueIds::from_config(&config));
        let b = builder(&config, uids);

        let mut pairs = vec![
            Tag::new("host", "web01"),
            Tag::new("dc", "lga"),
            Tag::new("cpu", "0"),
            Tag::new("type", "user"),
            Tag::new("rack", "r12"),
        ];
        let expected = b
            .build_template("sys.cpu.user", &Tags::new(pairs.clone()))
            .unwrap();

        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            pairs.shuffle(&mut rng);
            let row = b
                .build_template("sys.cpu.user", &Tags::new(pairs.clone()))
                .unwrap();
            assert_eq!(row, expected);
        }

        let ids = expected.tag_uids();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_invalid_series() {
        let config = TsdbConfig::default();
        let b = builder(&config, Arc::new(MemoryUniqueIds::from_config(&config)));

        assert!(matches!(
            b.build_template("sys.cpu", &Tags::default()),
            Err(TsdbError::InvalidSeries(_))
        ));
        let too_many: Tags = (0..9).map(|i| (format!("k{}", i), "v")).collect();
        assert!(matches!(
            b.build_template("sys.cpu", &too_many),
            Err(TsdbError::InvalidSeries(_))
        ));
        let tags: Tags = vec![("host", "web 01")].into_iter().collect();
        assert!(matches!(
            b.build_template("sys.cpu", &tags),
            Err(TsdbError::InvalidSeries(_))
        ));
    }

    #[test]
    fn test_lookup_only_metric_miss() {
        let config = TsdbConfig {
            auto_create_metrics: false,
            ..Default::default()
        };
        let b = builder(&config, Arc::new(MemoryUniqueIds::from_config(&config)));

        let tags: Tags = vec![("host", "web01")].into_iter().collect();
        let row = b.build_template("unknown.metric", &tags).unwrap();
        assert!(!row.is_metric_resolved());
        assert!(row.metric_uid().is_none());
        assert_eq!(row.len(), 13);
    }

    #[test]
    fn test_lookup_only_tag_miss() {
        let config = TsdbConfig {
            auto_create_tags: false,
            ..Default::default()
        };
        let b = builder(&config, Arc::new(MemoryUniqueIds::from_config(&config)));

        let tags: Tags = vec![("host", "web01")].into_iter().collect();
        assert!(matches!(
            b.build_template("sys.cpu", &tags),
            Err(TsdbError::UnresolvedIdentity {
                kind: UniqueIdKind::TagKey,
                ..
            })
        ));
    }

    #[test]
    fn test_roll_to_base_time_copies_and_notifies() {
        let config = TsdbConfig::default();
        let queue = Arc::new(CompactionQueue::new(3600));
        let b = RowKeyBuilder::new(
            &config,
            Arc::new(MemoryUniqueIds::from_config(&config)),
            Arc::new(NoSalt),
            queue.clone(),
        )
        .unwrap();

        let tags: Tags = vec![("host", "web01")].into_iter().collect();
        let template = b.build_template("sys.cpu", &tags).unwrap();
        let held: Bytes = template.bytes();

        let opened = b.with_base_time(&template, 3600);
        assert!(queue.is_empty());

        let next = b.roll_to_base_time(&opened, 7200);
        assert_eq!(next.base_time(), 7200);
        assert_eq!(opened.base_time(), 3600);
        assert_eq!(held.as_ref(), template.as_bytes());
        assert_eq!(queue.drain_ready(i64::MAX), vec![(opened.bytes(), 3600)]);

        // only the base time differs
        assert_eq!(&next.as_bytes()[..3], &opened.as_bytes()[..3]);
        assert_eq!(&next.as_bytes()[7..], &opened.as_bytes()[7..]);
    }

    #[test]
    fn test_salt_is_reapplied() {
        let config = TsdbConfig {
            salt_width: 1,
            salt_buckets: 16,
            ..Default::default()
        };
        let b = RowKeyBuilder::new(
            &config,
            Arc::new(MemoryUniqueIds::from_config(&config)),
            Arc::new(BucketSalter::from_config(&config)),
            Arc::new(NoopCompactionScheduler),
        )
        .unwrap();

        let tags: Tags = vec![("host", "web01")].into_iter().collect();
        let template = b.build_template("sys.cpu", &tags).unwrap();
        assert_eq!(template.len(), 1 + 3 + 4 + 6);
        assert!(template.salt()[0] < 16);

        let rolled = b.roll_to_base_time(&template, 3600);
        assert_eq!(rolled.salt(), template.salt());
        assert_eq!(rolled.base_time(), 3600);
        assert_eq!(rolled.metric_uid(), template.metric_uid());
    }
}
