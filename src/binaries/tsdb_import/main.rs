use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use common_base::point::parse_import_line;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Deserialize;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tsdb_ingest::codec::append::{AppendDataPoints, APPEND_COLUMN_QUALIFIER};
use tsdb_ingest::codec::qualifier::Qualifier;
use tsdb_ingest::codec::value::decode_value;
use tsdb_ingest::config::FAMILY;
use tsdb_ingest::{SeriesWriter, Tsdb, TsdbConfig};
use tsdb_storage::MemoryStore;

/// Writes kept in flight before the importer waits for one to complete.
const MAX_IN_FLIGHT: usize = 256;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Parser)]
#[clap(about, version, author)]
struct Config {
    /// File of `metric timestamp value tagk=tagv ...` lines.
    #[clap(long)]
    pub path: String,

    /// JSON file holding the write path configuration.
    #[clap(long)]
    pub config: Option<String>,

    /// Write samples as appends to a single column per row.
    #[clap(long)]
    pub append: bool,

    #[clap(long)]
    pub allow_out_of_order: bool,

    /// Print every row once the import is done.
    #[clap(long)]
    pub dump: bool,
}

fn load_tsdb_config(config: &Config) -> anyhow::Result<TsdbConfig> {
    let mut tsdb_config = match &config.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => TsdbConfig::default(),
    };
    tsdb_config.use_append_writes |= config.append;
    tsdb_config.allow_out_of_order_timestamps |= config.allow_out_of_order;
    Ok(tsdb_config)
}

#[derive(Default)]
struct Counts {
    points: u64,
    rejected: u64,
}

impl Counts {
    /// settle records the outcome of a completed write. Only store, filter and
    /// configuration failures abort the import.
    fn settle(&mut self, result: tsdb_ingest::Result<()>) -> anyhow::Result<()> {
        match result {
            Ok(()) => self.points += 1,
            Err(e) if e.is_point_rejected() => {
                tracing::warn!("{}", e);
                self.rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

async fn dump(store: &MemoryStore, table: &str) {
    for (key, row) in store.rows(table.as_bytes()).await {
        let key_hex: String = key.iter().map(|b| format!("{:02x}", b)).collect();
        println!("row {}", key_hex);
        for (column, cell) in row {
            let points = if column[..] == APPEND_COLUMN_QUALIFIER[..] {
                AppendDataPoints::parse(&cell)
            } else {
                Qualifier::decode(&column).map(|q| vec![AppendDataPoints::new(q, cell)])
            };
            match points {
                Ok(points) => {
                    for p in points {
                        match decode_value(p.qualifier.flags(), &p.value) {
                            Ok(v) => println!("  {:?} = {}", p.qualifier, v),
                            Err(e) => println!("  {:?} = <{}>", p.qualifier, e),
                        }
                    }
                }
                Err(e) => println!("  bad column: {}", e),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    println!("config: {:?}", config);
    if config.path.is_empty() {
        println!("path MUST not be empty!");
        return Ok(());
    }

    let tsdb_config = load_tsdb_config(&config)?;
    let table = tsdb_config.table.clone();

    let store = Arc::new(MemoryStore::new());
    store.create_table(table.clone(), FAMILY).await;
    let tsdb = Tsdb::builder(tsdb_config, store.clone()).build()?;

    let file = tokio::fs::File::open(&config.path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut writers: HashMap<String, SeriesWriter> = HashMap::new();
    let mut pending = FuturesUnordered::new();
    let mut counts = Counts::default();
    let mut line_no = 0_u64;
    let start = Instant::now();

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let point = match parse_import_line(&line) {
            Ok(Some(point)) => point,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("line {}: {}", line_no, e);
                counts.rejected += 1;
                continue;
            }
        };

        let series = point.tags.series_string(&point.metric);
        if !writers.contains_key(&series) {
            let mut writer = tsdb.new_series_writer();
            if let Err(e) = writer.set_series(&point.metric, point.tags.clone()) {
                tracing::warn!("line {}: {}", line_no, e);
                counts.rejected += 1;
                continue;
            }
            writer.set_batch_import(true);
            writers.insert(series.clone(), writer);
        }
        let writer = match writers.get_mut(&series) {
            Some(writer) => writer,
            None => continue,
        };

        match writer.add_value(point.timestamp, point.value) {
            Ok(write) => pending.push(write),
            Err(e) if e.is_point_rejected() => {
                tracing::warn!("line {}: {}", line_no, e);
                counts.rejected += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        }
        if pending.len() >= MAX_IN_FLIGHT {
            if let Some(result) = pending.next().await {
                counts.settle(result)?;
            }
        }
    }
    while let Some(result) = pending.next().await {
        counts.settle(result)?;
    }

    for writer in writers.values_mut() {
        writer.set_batch_import(false);
    }

    let elapsed = start.elapsed();
    let rate = counts.points as f64 / elapsed.as_secs_f64().max(1e-9);
    tracing::info!(
        "imported {} points ({} rejected) into {} rows of {} series in {:?} ({:.0} points/s)",
        counts.points,
        counts.rejected,
        store.row_count(table.as_bytes()).await,
        writers.len(),
        elapsed,
        rate
    );
    let stats = tsdb.stats();
    tracing::info!(
        "written {}, filtered {}, out of order {}, rollovers {}, unknown metric {}",
        stats.points_written(),
        stats.points_filtered(),
        stats.out_of_order_delegated(),
        stats.rollovers(),
        stats.metric_rejections()
    );

    if config.dump {
        dump(&store, &table).await;
    }

    Ok(())
}
