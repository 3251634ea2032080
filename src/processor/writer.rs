//! Output writing module for long-format tables
//!
//! Every transformed source file becomes a Shift_JIS CSV and a Parquet file
//! under `<output>/node<s>-<e>/node<s>-<e>_<date>.{csv,parquet}`.

use crate::config::CompressionAlgorithm;
use crate::constants::columns;
use crate::error::Result;
use crate::models::{LongTable, NodeRange};

use encoding_rs::SHIFT_JIS;
use polars::prelude::{CsvWriter, DataFrame, ParquetWriter, SerWriter, df};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Paths of the two files written for one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub csv: PathBuf,
    pub parquet: PathBuf,
}

impl OutputPaths {
    pub fn new(output_dir: &Path, range: &NodeRange, date_token: &str) -> Self {
        let label = range.label();
        let stem = output_dir
            .join(&label)
            .join(format!("{}_{}", label, date_token));
        Self {
            csv: stem.with_extension("csv"),
            parquet: stem.with_extension("parquet"),
        }
    }
}

/// Writer for per-file CSV and Parquet outputs
#[derive(Debug, Clone, Default)]
pub struct OutputWriter {
    compression: CompressionAlgorithm,
}

impl OutputWriter {
    pub fn new(compression: CompressionAlgorithm) -> Self {
        Self { compression }
    }

    /// Write `table` for one source file. Returns the number of rows written.
    ///
    /// Existing outputs for the same range and date are replaced. A failure
    /// part way through may leave the CSV without its Parquet twin.
    pub fn write_long(
        &self,
        table: &LongTable,
        output_dir: &Path,
        range: &NodeRange,
        date_token: &str,
    ) -> Result<usize> {
        let paths = OutputPaths::new(output_dir, range, date_token);
        if let Some(parent) = paths.csv.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut frame = to_frame(table)?;
        if frame.height() == 0 {
            warn!(
                "{}: every row had a missing value, writing an empty table",
                paths.csv.display()
            );
        }

        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(&mut frame)?;
        let text = String::from_utf8_lossy(&buffer);
        let (encoded, _, had_errors) = SHIFT_JIS.encode(&text);
        if had_errors {
            warn!(
                "{}: characters outside Shift_JIS written as numeric references",
                paths.csv.display()
            );
        }
        fs::write(&paths.csv, encoded.as_ref())?;

        let file = File::create(&paths.parquet)?;
        ParquetWriter::new(file)
            .with_compression(self.compression.to_polars_compression())
            .finish(&mut frame)?;

        debug!(
            "Wrote {} rows to {} and {}",
            frame.height(),
            paths.csv.display(),
            paths.parquet.display()
        );
        Ok(frame.height())
    }
}

/// Long table as a `TIME, NodeID, Measurement, Value` frame
pub fn to_frame(table: &LongTable) -> Result<DataFrame> {
    let records = table.records();
    let times: Vec<&str> = records.iter().map(|r| r.time.as_str()).collect();
    let node_ids: Vec<i64> = records.iter().map(|r| i64::from(r.node_id)).collect();
    let measurements: Vec<&str> = records.iter().map(|r| r.measurement.as_str()).collect();
    let values: Vec<f64> = records.iter().map(|r| r.value).collect();

    Ok(df!(
        columns::TIME => times,
        columns::NODE_ID => node_ids,
        columns::MEASUREMENT => measurements,
        columns::VALUE => values
    )?)
}
