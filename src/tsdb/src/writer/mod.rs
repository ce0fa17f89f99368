mod series_writer;

pub use series_writer::SeriesWriter;
