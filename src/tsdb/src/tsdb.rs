use std::sync::Arc;

use bytes::Bytes;
use common_base::point::{DataValue, Tags};
use futures::future::BoxFuture;
use futures::FutureExt;
use tsdb_storage::{AppendRequest, PutRequest, StoreClient};
use tsdb_utils::time::{is_ms_timestamp, to_millis, to_seconds, MAX_MS_TIMESTAMP};

use crate::codec::append::{AppendDataPoints, APPEND_COLUMN_QUALIFIER};
use crate::codec::qualifier::{build_qualifier, Qualifier};
use crate::codec::value::{encode_value, EncodedValue};
use crate::compaction::{CompactionScheduler, NoopCompactionScheduler};
use crate::config::{TsdbConfig, FAMILY};
use crate::error::{Result, TsdbError};
use crate::filter::WriteFilter;
use crate::row::row_key::RowKeyBuilder;
use crate::row::salt::{salter_from_config, Salter};
use crate::stats::WriteStats;
use crate::uid::memory::MemoryUniqueIds;
use crate::uid::{UniqueIdKind, UniqueIdResolver};
use crate::writer::SeriesWriter;

/// Handle on a write that has been accepted but not yet completed.
pub type WriteFuture<'a> = BoxFuture<'a, Result<()>>;

/// Tsdb ties the collaborators of the write path together and hands out series writers.
pub struct Tsdb {
    config: TsdbConfig,
    table: Bytes,
    client: Arc<dyn StoreClient>,
    uids: Arc<dyn UniqueIdResolver>,
    row_keys: RowKeyBuilder,
    filter: Option<Arc<dyn WriteFilter>>,
    stats: WriteStats,
}

pub struct TsdbBuilder {
    config: TsdbConfig,
    client: Arc<dyn StoreClient>,
    uids: Option<Arc<dyn UniqueIdResolver>>,
    salter: Option<Arc<dyn Salter>>,
    compaction: Option<Arc<dyn CompactionScheduler>>,
    filter: Option<Arc<dyn WriteFilter>>,
}

impl TsdbBuilder {
    pub fn new(config: TsdbConfig, client: Arc<dyn StoreClient>) -> Self {
        Self {
            config,
            client,
            uids: None,
            salter: None,
            compaction: None,
            filter: None,
        }
    }

    pub fn with_uids(mut self, uids: Arc<dyn UniqueIdResolver>) -> Self {
        self.uids = Some(uids);
        self
    }

    pub fn with_salter(mut self, salter: Arc<dyn Salter>) -> Self {
        self.salter = Some(salter);
        self
    }

    pub fn with_compaction(mut self, compaction: Arc<dyn CompactionScheduler>) -> Self {
        self.compaction = Some(compaction);
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn WriteFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// build validates the configuration and fills unset collaborators with the in-memory
    /// id resolver, the configured salter and a no-op compaction scheduler.
    pub fn build(self) -> Result<Arc<Tsdb>> {
        self.config.validate()?;

        let uids = self
            .uids
            .unwrap_or_else(|| Arc::new(MemoryUniqueIds::from_config(&self.config)));
        let salter = self
            .salter
            .unwrap_or_else(|| Arc::from(salter_from_config(&self.config)));
        let compaction = self
            .compaction
            .unwrap_or_else(|| Arc::new(NoopCompactionScheduler));

        let row_keys = RowKeyBuilder::new(&self.config, uids.clone(), salter, compaction)?;
        info!(
            "tsdb write path ready: table {}, window {}s, layout {:?}, appends {}",
            self.config.table,
            self.config.base_time_window_seconds,
            row_keys.layout(),
            self.config.use_append_writes
        );

        Ok(Arc::new(Tsdb {
            table: Bytes::from(self.config.table.clone()),
            config: self.config,
            client: self.client,
            uids,
            row_keys,
            filter: self.filter,
            stats: WriteStats::new(),
        }))
    }
}

impl Tsdb {
    pub fn builder(config: TsdbConfig, client: Arc<dyn StoreClient>) -> TsdbBuilder {
        TsdbBuilder::new(config, client)
    }

    pub fn config(&self) -> &TsdbConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn StoreClient> {
        &self.client
    }

    pub fn uids(&self) -> &Arc<dyn UniqueIdResolver> {
        &self.uids
    }

    pub fn row_keys(&self) -> &RowKeyBuilder {
        &self.row_keys
    }

    pub fn stats(&self) -> &WriteStats {
        &self.stats
    }

    pub fn window(&self) -> u32 {
        self.config.base_time_window_seconds
    }

    pub fn new_series_writer(self: &Arc<Self>) -> SeriesWriter {
        SeriesWriter::new(self.clone())
    }

    /// check_timestamp accepts unix timestamps in seconds, or in milliseconds up to
    /// [`MAX_MS_TIMESTAMP`].
    pub fn check_timestamp(&self, timestamp: i64) -> Result<()> {
        if timestamp < 0 {
            return Err(TsdbError::InvalidTimestamp {
                timestamp,
                reason: "negative timestamp",
            });
        }
        if is_ms_timestamp(timestamp) {
            if timestamp > MAX_MS_TIMESTAMP {
                return Err(TsdbError::InvalidTimestamp {
                    timestamp,
                    reason: "millisecond timestamp too large",
                });
            }
            if to_seconds(timestamp) > u32::MAX as i64 {
                return Err(TsdbError::InvalidTimestamp {
                    timestamp,
                    reason: "beyond the range of a row base time",
                });
            }
        }
        Ok(())
    }

    /// base_time_of aligns a checked timestamp to the start of its window, in seconds.
    pub fn base_time_of(&self, timestamp: i64) -> u32 {
        let secs = to_seconds(timestamp);
        (secs - secs % self.window() as i64) as u32
    }

    /// add_point writes a single data point without a series writer.
    ///
    /// Identity and timestamp are checked before the future is returned. Every call
    /// resolves the row of its own window, so points may arrive in any order.
    pub fn add_point(
        self: &Arc<Self>,
        metric: &str,
        timestamp: i64,
        value: impl Into<DataValue>,
        tags: &Tags,
    ) -> Result<WriteFuture<'static>> {
        let value = encode_value(value.into())?;
        self.add_point_internal(metric, timestamp, value, tags)
    }

    pub(crate) fn add_point_internal(
        self: &Arc<Self>,
        metric: &str,
        timestamp: i64,
        value: EncodedValue,
        tags: &Tags,
    ) -> Result<WriteFuture<'static>> {
        self.check_timestamp(timestamp)?;
        let template = self.row_keys.build_template(metric, tags)?;
        let row = self
            .row_keys
            .with_base_time(&template, self.base_time_of(timestamp));
        let qualifier = build_qualifier(timestamp, row.base_time(), value.flags)?;

        let tsdb = self.clone();
        let metric = metric.to_string();
        let tags = tags.clone();
        Ok(async move {
            if !tsdb.allow(&metric, timestamp, &value, &tags).await? {
                return Ok(());
            }
            if !row.is_metric_resolved() {
                return Err(tsdb.reject_metric(&metric));
            }
            tsdb.dispatch(row.bytes(), qualifier, value.bytes, true)
                .await
        }
        .boxed())
    }

    /// filters_points returns true when an installed filter wants to see data points.
    pub(crate) fn filters_points(&self) -> bool {
        self.filter
            .as_ref()
            .map(|filter| filter.filter_data_points())
            .unwrap_or(false)
    }

    /// allow runs the admission filter, if one is installed and enabled.
    pub(crate) async fn allow(
        &self,
        metric: &str,
        timestamp: i64,
        value: &EncodedValue,
        tags: &Tags,
    ) -> Result<bool> {
        let filter = match &self.filter {
            Some(filter) if filter.filter_data_points() => filter,
            _ => return Ok(true),
        };

        let allowed = filter
            .allow_data_point(metric, to_millis(timestamp), &value.bytes, tags, value.flags)
            .await
            .map_err(TsdbError::Filter)?;
        if !allowed {
            self.stats.incr_points_filtered();
            trace!("filter dropped {} at {}", metric, timestamp);
        }
        Ok(allowed)
    }

    /// reject_metric counts a write refused for lack of a metric id and returns its error.
    pub(crate) fn reject_metric(&self, metric: &str) -> TsdbError {
        self.stats.incr_metric_rejections();
        warn!("rejected write to unknown metric {}", metric);
        TsdbError::UnresolvedIdentity {
            kind: UniqueIdKind::Metric,
            name: metric.to_string(),
        }
    }

    /// dispatch_detached issues the store write of one encoded sample on a future that owns
    /// everything it needs, so callers may keep several of them in flight.
    pub(crate) fn dispatch_detached(
        self: &Arc<Self>,
        row: Bytes,
        qualifier: Qualifier,
        value: Bytes,
        durable: bool,
    ) -> WriteFuture<'static> {
        let tsdb = self.clone();
        async move { tsdb.dispatch(row, qualifier, value, durable).await }.boxed()
    }

    /// dispatch issues the store write of one encoded sample.
    pub(crate) async fn dispatch(
        &self,
        row: Bytes,
        qualifier: Qualifier,
        value: Bytes,
        durable: bool,
    ) -> Result<()> {
        let family = Bytes::from_static(FAMILY);
        if self.config.use_append_writes {
            let payload = AppendDataPoints::new(qualifier, value).to_bytes();
            trace!("append {:?} to row {:?}", qualifier, row);
            let mut request = AppendRequest::new(
                self.table.clone(),
                row,
                family,
                Bytes::from_static(&APPEND_COLUMN_QUALIFIER),
                payload,
            );
            request.set_durable(durable);
            self.client.append(request).await?;
        } else {
            trace!("put {:?} to row {:?}", qualifier, row);
            let mut request =
                PutRequest::new(self.table.clone(), row, family, qualifier.to_bytes(), value);
            request.set_durable(durable);
            self.client.put(request).await?;
        }
        self.stats.incr_points_written();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use common_base::point::Tags;
    use tsdb_storage::MemoryStore;

    use crate::codec::qualifier::Qualifier;
    use crate::codec::value::decode_long;
    use crate::config::TsdbConfig;
    use crate::error::{BoxError, TsdbError};
    use crate::filter::WriteFilter;
    use crate::tsdb::Tsdb;

    struct CountingFilter {
        calls: AtomicUsize,
        allow: bool,
    }

    #[async_trait]
    impl WriteFilter for CountingFilter {
        async fn allow_data_point(
            &self,
            _metric: &str,
            timestamp_ms: i64,
            _value: &[u8],
            _tags: &Tags,
            _flags: u16,
        ) -> Result<bool, BoxError> {
            assert_eq!(timestamp_ms % 1000, 0);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.allow)
        }
    }

    async fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.create_table("tsdb", "t").await;
        store
    }

    fn host(h: &str) -> Tags {
        vec![("host", h)].into_iter().collect()
    }

    #[tokio::test]
    async fn test_add_point_any_order() {
        let store = store().await;
        let tsdb = Tsdb::builder(TsdbConfig::default(), store.clone())
            .build()
            .unwrap();

        for ts in [7300_i64, 1000, 3700, 1001] {
            tsdb.add_point("sys.cpu", ts, ts, &host("web01"))
                .unwrap()
                .await
                .unwrap();
        }

        let rows = store.rows(b"tsdb").await;
        let bases: Vec<u32> = rows
            .iter()
            .map(|(key, _)| u32::from_be_bytes([key[3], key[4], key[5], key[6]]))
            .collect();
        assert_eq!(bases, vec![0, 3600, 7200]);
        assert_eq!(rows[0].1.len(), 2);
        assert_eq!(store.durable_writes(), 4);
        assert_eq!(tsdb.stats().points_written(), 4);

        let (qualifier, value) = rows[2].1.iter().next().unwrap();
        let q = Qualifier::decode(qualifier).unwrap();
        assert_eq!(q.delta_seconds(), 100);
        assert_eq!(decode_long(q.flags(), value).unwrap(), 7300);
    }

    #[tokio::test]
    async fn test_add_point_rejects_before_writing() {
        let store = store().await;
        let tsdb = Tsdb::builder(TsdbConfig::default(), store.clone())
            .build()
            .unwrap();

        assert!(matches!(
            tsdb.add_point("sys.cpu", -1, 1_i64, &host("web01")),
            Err(TsdbError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            tsdb.add_point("sys.cpu", 10_000_000_000_000, 1_i64, &host("web01")),
            Err(TsdbError::InvalidTimestamp { .. })
        ));
        // a valid 13 digit ms timestamp whose seconds overflow the row base time
        assert!(matches!(
            tsdb.check_timestamp(5_000_000_000_000),
            Err(TsdbError::InvalidTimestamp {
                timestamp: 5_000_000_000_000,
                reason: "beyond the range of a row base time"
            })
        ));
        assert!(matches!(
            tsdb.add_point("sys.cpu", 5_000_000_000_000, 1_i64, &host("web01")),
            Err(TsdbError::InvalidTimestamp { .. })
        ));
        assert!(tsdb.check_timestamp(4_294_967_295_999).is_ok());
        assert!(matches!(
            tsdb.add_point("sys.cpu", 1000, f32::NAN, &host("web01")),
            Err(TsdbError::InvalidValue(_))
        ));
        assert!(matches!(
            tsdb.add_point("sys cpu", 1000, 1_i64, &host("web01")),
            Err(TsdbError::InvalidSeries(_))
        ));
        assert_eq!(store.row_count(b"tsdb").await, 0);
    }

    #[tokio::test]
    async fn test_add_point_filtered() {
        let store = store().await;
        let filter = Arc::new(CountingFilter {
            calls: AtomicUsize::new(0),
            allow: false,
        });
        let tsdb = Tsdb::builder(TsdbConfig::default(), store.clone())
            .with_filter(filter.clone())
            .build()
            .unwrap();

        tsdb.add_point("sys.cpu", 1000, 1_i64, &host("web01"))
            .unwrap()
            .await
            .unwrap();
        assert_eq!(filter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tsdb.stats().points_filtered(), 1);
        assert_eq!(store.row_count(b"tsdb").await, 0);
    }

    #[tokio::test]
    async fn test_add_point_append_mode() {
        let store = store().await;
        let config = TsdbConfig {
            use_append_writes: true,
            ..Default::default()
        };
        let tsdb = Tsdb::builder(config, store.clone()).build().unwrap();

        tsdb.add_point("sys.cpu", 10, 1_i64, &host("web01"))
            .unwrap()
            .await
            .unwrap();
        tsdb.add_point("sys.cpu", 20, 2_i64, &host("web01"))
            .unwrap()
            .await
            .unwrap();

        let rows = store.rows(b"tsdb").await;
        assert_eq!(rows.len(), 1);
        let cell = rows[0].1.get(&[0x05, 0x00, 0x00][..]).unwrap();
        assert_eq!(cell.as_ref(), &[0x00, 0xA0, 0x01, 0x01, 0x40, 0x02]);
    }

    #[test]
    fn test_builder_validates_config() {
        let config = TsdbConfig {
            base_time_window_seconds: 0,
            ..Default::default()
        };
        assert!(matches!(
            Tsdb::builder(config, Arc::new(MemoryStore::new())).build(),
            Err(TsdbError::Config(_))
        ));
    }
}
