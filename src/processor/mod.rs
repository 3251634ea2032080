//! Main processing engine.
//!
//! Orchestrates a preprocessing run: discover node directories, transform
//! every source file not yet in the ledger, write the long tables, and
//! rebuild the latest-readings workbook from today's files.

pub mod discovery;
pub mod transform;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::discovery::{extract_range, list_node_directories, list_source_files};
use self::transform::FileTransformer;
use self::writer::OutputWriter;

use crate::calibration::{ScaleTable, SensorTypeTable};
use crate::config::WsnConfig;
use crate::constants::DATE_TOKEN_FORMAT;
use crate::error::{Result, WsnError};
use crate::latest::LatestReadingsAccumulator;
use crate::ledger::ProcessedFileLedger;
use crate::models::{NodeRange, ProcessingStats};
use crate::registry::SensorRegistry;

use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What happened to one source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    /// No node produced data; nothing written
    Empty,
    Written { rows: usize },
}

/// One preprocessing run over the logging root
#[derive(Debug)]
pub struct Pipeline {
    config: WsnConfig,
    run_date_token: String,
    scales: ScaleTable,
    sensor_types: SensorTypeTable,
    registry: SensorRegistry,
    ledger: ProcessedFileLedger,
    accumulator: LatestReadingsAccumulator,
    writer: OutputWriter,
}

impl Pipeline {
    /// Load every lookup table the run needs. Any failure here is fatal.
    pub fn new(config: WsnConfig, run_date: NaiveDate) -> Result<Self> {
        let scales = ScaleTable::from_json_file(&config.scale_json_path)?;
        let sensor_types = SensorTypeTable::from_json_file(&config.sens_type_json_path)?;
        if !sensor_types.declares_channels() {
            return Err(WsnError::configuration(format!(
                "{} declares no measurement channels for any sensor type",
                config.sens_type_json_path.display()
            )));
        }
        let registry = SensorRegistry::from_csv_file(&config.management_ledger_path)?;
        let accumulator =
            LatestReadingsAccumulator::from_json_file(&config.current_sensor_readings_json)?;
        let ledger = ProcessedFileLedger::new(config.ledger_path());
        let writer = OutputWriter::new(config.parquet_compression);

        info!(
            "Loaded {} scale codes, {} sensor types, {} installed sensors, {} sheets",
            scales.len(),
            sensor_types.len(),
            registry.len(),
            accumulator.sheets().len()
        );

        Ok(Self {
            run_date_token: run_date.format(DATE_TOKEN_FORMAT).to_string(),
            config,
            scales,
            sensor_types,
            registry,
            ledger,
            accumulator,
            writer,
        })
    }

    pub fn config(&self) -> &WsnConfig {
        &self.config
    }

    /// Run date as it appears in file names, e.g. `20250421`
    pub fn run_date_token(&self) -> &str {
        &self.run_date_token
    }

    pub fn ledger(&self) -> &ProcessedFileLedger {
        &self.ledger
    }

    pub fn accumulator(&self) -> &LatestReadingsAccumulator {
        &self.accumulator
    }

    /// Process every pending source file and rewrite the latest-readings
    /// workbook.
    ///
    /// A missing logging root fails the run. Directory and file failures are
    /// logged and counted; the run carries on with the next one.
    pub fn run(&mut self) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        let mut stats = ProcessingStats {
            output_path: self.config.output_folder_path.clone(),
            ..Default::default()
        };
        self.accumulator.clear();

        info!(
            "Preprocessing {} for run date {}",
            self.config.logging_data_path.display(),
            self.run_date_token
        );

        let directories = list_node_directories(&self.config.logging_data_path)?;
        for directory in &directories {
            stats.directories_scanned += 1;
            if let Err(e) = self.process_directory(directory, &mut stats) {
                error!("Directory {} failed: {}", directory.display(), e);
                stats.directories_failed += 1;
            }
        }

        self.accumulator
            .flush(&self.config.current_data_excel_file_path)?;
        stats.latest_samples = self.accumulator.sample_count();
        stats.processing_time_ms = start_time.elapsed().as_millis();

        info!(
            "Run complete: {} processed, {} empty, {} skipped, {} failed, {} rows in {}ms",
            stats.files_processed,
            stats.files_empty,
            stats.files_skipped,
            stats.files_failed,
            stats.rows_written,
            stats.processing_time_ms
        );
        Ok(stats)
    }

    /// Source files `run()` would transform, without touching any state
    pub fn plan(&self) -> Result<Vec<PathBuf>> {
        let mut pending = Vec::new();
        for directory in list_node_directories(&self.config.logging_data_path)? {
            if let Err(e) = extract_range(&directory) {
                warn!("Skipping {}: {}", directory.display(), e);
                continue;
            }
            let files = match list_source_files(&directory, &self.config.source_file_pattern) {
                Ok(files) => files,
                Err(e) => {
                    warn!("Skipping {}: {}", directory.display(), e);
                    continue;
                }
            };
            pending.extend(
                files
                    .into_iter()
                    .filter(|file| !self.ledger.is_processed(file)),
            );
        }
        Ok(pending)
    }

    fn process_directory(&mut self, directory: &Path, stats: &mut ProcessingStats) -> Result<()> {
        let range = extract_range(directory)?;
        let files = list_source_files(directory, &self.config.source_file_pattern)?;
        info!(
            "Directory {} (nodes {}): {} source files",
            directory.display(),
            range,
            files.len()
        );

        let progress_bar = if self.config.show_progress {
            let bar = ProgressBar::new(files.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_message(range.label());
            bar
        } else {
            ProgressBar::hidden()
        };

        for file in &files {
            stats.files_seen += 1;
            if self.ledger.is_processed(file) {
                debug!("{} already processed", file.display());
                stats.files_skipped += 1;
                progress_bar.inc(1);
                continue;
            }

            match self.process_file(file, &range) {
                Ok(FileOutcome::Empty) => stats.files_empty += 1,
                Ok(FileOutcome::Written { rows }) => {
                    stats.files_processed += 1;
                    stats.rows_written += rows;
                }
                Err(e) => {
                    if e.is_data_quality() {
                        error!("Rejected {}: {}", file.display(), e);
                    } else {
                        error!("Failed to process {}: {}", file.display(), e);
                    }
                    stats.files_failed += 1;
                }
            }
            progress_bar.inc(1);
        }

        progress_bar.finish_and_clear();
        Ok(())
    }

    fn process_file(&mut self, path: &Path, range: &NodeRange) -> Result<FileOutcome> {
        info!("Processing {}", path.display());
        let output =
            FileTransformer::new(&self.scales, &self.sensor_types, self.run_date_token.as_str())
                .transform(path, range)?;
        let is_today = output.date_token == self.run_date_token;

        if output.is_empty() {
            info!("{}: no node produced data, nothing written", path.display());
            if !is_today {
                self.ledger.mark_processed(path)?;
            }
            return Ok(FileOutcome::Empty);
        }

        let rows = self.writer.write_long(
            &output.table,
            &self.config.output_folder_path,
            range,
            &output.date_token,
        )?;

        // Today's dump keeps growing; it is re-read on every run until the
        // date moves on.
        if !is_today {
            self.ledger.mark_processed(path)?;
        }

        let mut accepted = 0;
        for sample in &output.samples {
            if self.accumulator.add_sample(sample, &self.registry) {
                accepted += 1;
            }
        }

        info!(
            "{}: {} rows from {} nodes, {} latest samples",
            path.display(),
            rows,
            output.nodes_emitted,
            accepted
        );
        Ok(FileOutcome::Written { rows })
    }
}
