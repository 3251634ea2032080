//! WSN Preprocessor Library
//!
//! Turns periodic CSV dumps from wireless sensor network loggers into
//! normalized long-format tables.
//!
//! This library provides tools for:
//! - Generating the fixed per-node column schema of a logger dump
//! - Rescaling raw readings with scale-code and sensor-type tables
//! - Unpivoting node blocks into `TIME, NodeID, Measurement, Value` rows
//! - Writing Shift_JIS CSV and Parquet outputs per node range and day
//! - Tracking processed files so re-runs are incremental
//! - Maintaining a latest-readings workbook for today's data

pub mod calibration;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod latest;
pub mod ledger;
pub mod mirror;
pub mod models;
pub mod processor;
pub mod raw;
pub mod registry;
pub mod schema;

pub use calibration::{Channel, ScaleTable, SensorTypeTable};
pub use config::{CompressionAlgorithm, WsnConfig};
pub use error::{Result, WsnError};
pub use latest::{LatestReadingsAccumulator, LatestSample};
pub use ledger::ProcessedFileLedger;
pub use models::{LongRecord, LongTable, NodeRange, ProcessingStats};
pub use processor::Pipeline;
pub use processor::transform::{FileOutput, FileTransformer};
pub use processor::writer::OutputWriter;
pub use registry::SensorRegistry;
pub use schema::generate_columns;
