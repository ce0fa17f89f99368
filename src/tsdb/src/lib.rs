#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate tracing;

pub mod buffer;
pub mod codec;
pub mod compaction;
pub mod config;
pub mod error;
pub mod filter;
pub mod row;
pub mod stats;
pub mod tsdb;
pub mod uid;
pub mod writer;

pub use config::TsdbConfig;
pub use error::{Result, TsdbError};
pub use tsdb::{Tsdb, TsdbBuilder, WriteFuture};
pub use writer::SeriesWriter;
