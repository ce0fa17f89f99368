use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use common_base::point::{DataValue, Tags};
use futures::future;
use futures::FutureExt;
use tsdb_utils::time::{time_format, to_millis, unix_secs_to_time};

use crate::buffer::WriteBuffer;
use crate::codec::qualifier::{build_qualifier, Qualifier};
use crate::codec::value::{encode_float, encode_long, encode_value, EncodedValue};
use crate::error::{Result, TsdbError};
use crate::row::row_key::RowKey;
use crate::tsdb::{Tsdb, WriteFuture};

#[derive(Default)]
struct Series {
    metric: String,
    tags: Tags,
}

/// Session is the mutable state of a writer for one `set_series` call.
struct Session {
    /// Key of the current row, `None` until `set_series` is called.
    row: Option<RowKey>,
    /// False while `row` is still the zero based template.
    row_opened: bool,

    /// Samples written to the current row.
    buffer: WriteBuffer,

    /// Timestamp of the last accepted point, in milliseconds.
    last_ts: i64,
}

impl Session {
    fn new(row: Option<RowKey>, window: u32, last_ts: i64) -> Self {
        Self {
            row,
            row_opened: false,
            buffer: WriteBuffer::new(window),
            last_ts,
        }
    }

    fn base_time(&self) -> u32 {
        self.row.as_ref().map(|r| r.base_time()).unwrap_or(0)
    }

    /// write_allowed moves the watermark, rolls the row if needed and buffers the sample.
    ///
    /// A point overtaken by a later one while it waited on the filter is either refused or,
    /// when out of order writes are allowed, written to the row of its own window.
    fn write_allowed(
        &mut self,
        tsdb: &Tsdb,
        metric: &str,
        timestamp: i64,
        value: &EncodedValue,
    ) -> Result<(Bytes, Qualifier)> {
        let timestamp_ms = to_millis(timestamp);
        let row = self.row.as_ref().ok_or(TsdbError::NotInitialized)?;

        if timestamp_ms <= self.last_ts {
            if !tsdb.config().allow_out_of_order_timestamps {
                return Err(TsdbError::OutOfOrder {
                    timestamp_ms,
                    last_ms: self.last_ts,
                });
            }
            if !row.is_metric_resolved() {
                return Err(tsdb.reject_metric(metric));
            }
            tsdb.stats().incr_out_of_order_delegated();
            let own = tsdb
                .row_keys()
                .with_base_time(row, tsdb.base_time_of(timestamp));
            let qualifier = build_qualifier(timestamp, own.base_time(), value.flags)?;
            return Ok((own.bytes(), qualifier));
        }

        self.last_ts = timestamp_ms;
        // nothing is rolled for a series that can never be written
        if !row.is_metric_resolved() {
            return Err(tsdb.reject_metric(metric));
        }
        self.roll_if_needed(tsdb, timestamp)?;

        let row = self.row.as_ref().ok_or(TsdbError::NotInitialized)?;
        let qualifier = build_qualifier(timestamp, row.base_time(), value.flags)?;
        self.buffer.append(qualifier, value.raw());
        Ok((row.bytes(), qualifier))
    }

    /// roll_if_needed makes the current row cover `timestamp`, returning true on rollover.
    ///
    /// The first point after `set_series` only sets the base time; later points move to a
    /// new row once they are at least a full window past the current base time.
    fn roll_if_needed(&mut self, tsdb: &Tsdb, timestamp: i64) -> Result<bool> {
        let row = self.row.as_ref().ok_or(TsdbError::NotInitialized)?;
        let base_time = tsdb.base_time_of(timestamp);

        if !self.row_opened {
            let opened = tsdb.row_keys().with_base_time(row, base_time);
            self.row = Some(opened);
            self.row_opened = true;
            return Ok(false);
        }

        if base_time as i64 - row.base_time() as i64 >= tsdb.window() as i64 {
            let next = tsdb.row_keys().roll_to_base_time(row, base_time);
            self.row = Some(next);
            self.buffer.reset();
            tsdb.stats().incr_rollovers();
            return Ok(true);
        }
        Ok(false)
    }
}

/// SeriesWriter streams the points of one series into consecutive rows.
///
/// Points must be issued in strictly increasing time order. Each `add_*` call validates the
/// point and returns a future that completes once the store has acknowledged the write.
/// Without an admission filter the point is ordered, buffered and encoded before the call
/// returns, and the future only carries the store write, so any number of writes may be
/// in flight and complete in any order. With a filter the point is buffered once the
/// filter admits it.
///
/// Writes still in flight when `set_series` is called finish against the series they
/// were issued for.
pub struct SeriesWriter {
    tsdb: Arc<Tsdb>,
    series: Arc<Series>,
    session: Arc<Mutex<Session>>,
    batch_import: bool,
}

impl SeriesWriter {
    pub(crate) fn new(tsdb: Arc<Tsdb>) -> Self {
        let session = Session::new(None, tsdb.window(), i64::MIN);
        Self {
            tsdb,
            series: Arc::new(Series::default()),
            session: Arc::new(Mutex::new(session)),
            batch_import: false,
        }
    }

    /// set_series points the writer at a series and starts an empty row.
    ///
    /// The ordering watermark is kept.
    pub fn set_series(&mut self, metric: &str, tags: Tags) -> Result<()> {
        let row = self.tsdb.row_keys().build_template(metric, &tags)?;

        let last_ts = self.session.lock().unwrap().last_ts;
        self.session = Arc::new(Mutex::new(Session::new(
            Some(row),
            self.tsdb.window(),
            last_ts,
        )));
        self.series = Arc::new(Series {
            metric: metric.to_string(),
            tags,
        });
        Ok(())
    }

    pub fn add_point(&mut self, timestamp: i64, value: i64) -> Result<WriteFuture<'static>> {
        self.add_encoded(timestamp, encode_long(value))
    }

    pub fn add_float_point(&mut self, timestamp: i64, value: f32) -> Result<WriteFuture<'static>> {
        self.add_encoded(timestamp, encode_float(value)?)
    }

    pub fn add_value(&mut self, timestamp: i64, value: DataValue) -> Result<WriteFuture<'static>> {
        self.add_encoded(timestamp, encode_value(value)?)
    }

    fn add_encoded(
        &mut self,
        timestamp: i64,
        value: EncodedValue,
    ) -> Result<WriteFuture<'static>> {
        let mut session = self.session.lock().unwrap();
        if session.row.is_none() {
            return Err(TsdbError::NotInitialized);
        }
        self.tsdb.check_timestamp(timestamp)?;

        let timestamp_ms = to_millis(timestamp);
        if timestamp_ms <= session.last_ts {
            if self.tsdb.config().allow_out_of_order_timestamps {
                self.tsdb.stats().incr_out_of_order_delegated();
                debug!(
                    "{} at {}ms is not after {}ms, writing it on its own",
                    self.series.metric, timestamp_ms, session.last_ts
                );
                return self.tsdb.add_point_internal(
                    &self.series.metric,
                    timestamp,
                    value,
                    &self.series.tags,
                );
            }
            return Err(TsdbError::OutOfOrder {
                timestamp_ms,
                last_ms: session.last_ts,
            });
        }

        let durable = !self.batch_import;
        if !self.tsdb.filters_points() {
            let written =
                session.write_allowed(&self.tsdb, &self.series.metric, timestamp, &value);
            return Ok(match written {
                Ok((row, qualifier)) => {
                    self.tsdb
                        .dispatch_detached(row, qualifier, value.bytes, durable)
                }
                // identity failures surface on the pending write, like store failures
                Err(e) => future::err(e).boxed(),
            });
        }
        drop(session);

        let tsdb = self.tsdb.clone();
        let series = self.series.clone();
        let session = self.session.clone();
        Ok(async move {
            if !tsdb.allow(&series.metric, timestamp, &value, &series.tags).await? {
                return Ok(());
            }
            let (row, qualifier) = {
                let mut session = session.lock().unwrap();
                session.write_allowed(&tsdb, &series.metric, timestamp, &value)?
            };
            tsdb.dispatch(row, qualifier, value.bytes, durable).await
        }
        .boxed())
    }

    /// set_buffering_time sets how long (in ms) the store client buffers non-durable edits.
    ///
    /// The interval is shared by every writer using the same store client.
    pub fn set_buffering_time(&self, interval_ms: u16) {
        self.tsdb.client().set_flush_interval(interval_ms);
    }

    /// set_batch_import switches non-durable writes on or off.
    ///
    /// Turning it on raises the store flush interval to the configured default unless a
    /// larger interval is already set. Turning it off resets the interval to 0 only if it
    /// still holds that default.
    pub fn set_batch_import(&mut self, batch_import: bool) {
        if self.batch_import == batch_import {
            return;
        }

        let current = self.tsdb.client().flush_interval();
        let default = self.tsdb.config().default_batch_buffer_ms;
        self.batch_import = batch_import;
        if batch_import {
            if default > current {
                self.set_buffering_time(default);
            }
        } else if current == default {
            self.set_buffering_time(0);
        }
    }

    pub fn is_batch_import(&self) -> bool {
        self.batch_import
    }

    pub fn metric_name(&self) -> &str {
        &self.series.metric
    }

    pub fn tags(&self) -> &Tags {
        &self.series.tags
    }

    pub fn row_key(&self) -> Option<RowKey> {
        self.session.lock().unwrap().row.clone()
    }

    pub fn metric_uid(&self) -> Option<Vec<u8>> {
        let session = self.session.lock().unwrap();
        session
            .row
            .as_ref()
            .and_then(|r| r.metric_uid())
            .map(|uid| uid.to_vec())
    }

    pub fn tag_uids(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let session = self.session.lock().unwrap();
        match &session.row {
            Some(row) => row
                .tag_uids()
                .into_iter()
                .map(|(k, v)| (k.to_vec(), v.to_vec()))
                .collect(),
            None => vec![],
        }
    }

    /// base_time returns the base time of the current row, 0 before the first point.
    pub fn base_time(&self) -> u32 {
        self.session.lock().unwrap().base_time()
    }

    /// last_timestamp_ms returns the watermark, `None` before the first accepted point.
    pub fn last_timestamp_ms(&self) -> Option<i64> {
        let last_ts = self.session.lock().unwrap().last_ts;
        if last_ts == i64::MIN {
            None
        } else {
            Some(last_ts)
        }
    }

    /// size returns the number of samples buffered for the current row.
    pub fn size(&self) -> usize {
        self.session.lock().unwrap().buffer.len()
    }

    pub fn timestamp(&self, i: usize) -> Result<i64> {
        let session = self.session.lock().unwrap();
        session.buffer.timestamp(i, session.base_time())
    }

    pub fn is_integer(&self, i: usize) -> Result<bool> {
        self.session.lock().unwrap().buffer.is_integer(i)
    }

    pub fn long_value(&self, i: usize) -> Result<i64> {
        self.session.lock().unwrap().buffer.long_value(i)
    }

    pub fn double_value(&self, i: usize) -> Result<f64> {
        self.session.lock().unwrap().buffer.double_value(i)
    }
}

impl Debug for SeriesWriter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let session = self.session.lock().unwrap();
        match &session.row {
            Some(row) => write!(f, "SeriesWriter({:?}", row)?,
            None => write!(f, "SeriesWriter(<null>")?,
        }
        let base_time = session.base_time();
        write!(f, " (metric={}), base_time={} (", self.series.metric, base_time)?;
        match unix_secs_to_time(base_time as i64) {
            Some(dt) if base_time > 0 => write!(f, "{}", time_format(dt))?,
            _ => write!(f, "no date")?,
        }
        write!(f, "), [")?;

        let buffer = &session.buffer;
        for i in 0..buffer.len() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let q = buffer.qualifier(i).map_err(|_| std::fmt::Error)?;
            match q {
                Qualifier::Millis(_) => write!(f, "+{}ms", q.offset_ms())?,
                Qualifier::Seconds(_) => write!(f, "+{}", q.delta_seconds())?,
            }
            if q.is_integer() {
                let v = buffer.long_value(i).map_err(|_| std::fmt::Error)?;
                write!(f, ":long({})", v)?;
            } else {
                let v = buffer.double_value(i).map_err(|_| std::fmt::Error)?;
                write!(f, ":float({})", v)?;
            }
        }
        write!(f, "])")
    }
}
