//! Per-file transformation from raw logger dumps to long-format rows.
//!
//! Each node block of a dump is rescaled with the scale table, labelled from
//! the sensor-type table, and unpivoted so every (timestamp, node,
//! measurement) triple becomes one row.

use crate::calibration::{Channel, ScaleTable, SensorTypeTable};
use crate::constants::{VALUE_SLOTS_PER_NODE, columns};
use crate::error::{Result, WsnError};
use crate::latest::LatestSample;
use crate::models::{LongTable, NodeRange, PendingRecord};
use crate::raw::RawFile;
use crate::schema::NodeColumns;
use std::path::Path;
use tracing::debug;

/// Result of transforming one source file
#[derive(Debug, Clone, Default)]
pub struct FileOutput {
    pub table: LongTable,
    pub date_token: String,
    /// Node blocks that produced a wide table
    pub nodes_emitted: usize,
    /// Last row of every emitted node, only for files dated on the run date
    pub samples: Vec<LatestSample>,
}

impl FileOutput {
    /// No node produced any data
    pub fn is_empty(&self) -> bool {
        self.nodes_emitted == 0
    }
}

/// Wide per-node table before unpivoting
#[derive(Debug)]
struct NodeTable {
    measurements: Vec<String>,
    rows: Vec<WideRow>,
}

#[derive(Debug)]
struct WideRow {
    time: Option<String>,
    node_id: Option<u32>,
    values: Vec<Option<f64>>,
}

/// Transforms source files against the run's lookup tables
#[derive(Debug, Clone)]
pub struct FileTransformer<'a> {
    scales: &'a ScaleTable,
    sensor_types: &'a SensorTypeTable,
    run_date_token: String,
}

impl<'a> FileTransformer<'a> {
    pub fn new(
        scales: &'a ScaleTable,
        sensor_types: &'a SensorTypeTable,
        run_date_token: impl Into<String>,
    ) -> Self {
        Self {
            scales,
            sensor_types,
            run_date_token: run_date_token.into(),
        }
    }

    pub fn run_date_token(&self) -> &str {
        &self.run_date_token
    }

    /// Read, decode and transform one dump
    pub fn transform(&self, path: &Path, range: &NodeRange) -> Result<FileOutput> {
        let raw = RawFile::read(path, range)?;
        self.transform_raw(&raw, range)
    }

    /// Transform an already decoded dump
    pub fn transform_raw(&self, raw: &RawFile, range: &NodeRange) -> Result<FileOutput> {
        let file_name = raw
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let date_token = date_token(&file_name);
        let is_today = date_token == self.run_date_token;

        let mut pending = Vec::new();
        let mut samples = Vec::new();
        let mut nodes_emitted = 0;

        for node_id in range.ids() {
            let Some(node) = self.node_table(raw, node_id)? else {
                continue;
            };
            nodes_emitted += 1;

            if is_today {
                if let Some(last) = node.rows.last() {
                    samples.push(LatestSample {
                        time: last.time.clone(),
                        node_id: last.node_id,
                        measurements: node
                            .measurements
                            .iter()
                            .cloned()
                            .zip(last.values.iter().copied())
                            .collect(),
                    });
                }
            }

            // Column-major, so a stable sort on TIME leaves node then
            // measurement order within each timestamp.
            for (column, measurement) in node.measurements.iter().enumerate() {
                for row in &node.rows {
                    pending.push(PendingRecord {
                        time: row.time.clone(),
                        node_id: row.node_id,
                        measurement: measurement.clone(),
                        value: row.values[column],
                    });
                }
            }
        }

        let table = if nodes_emitted == 0 {
            LongTable::default()
        } else {
            LongTable::from_pending(pending)
        };

        debug!(
            "{}: {} nodes emitted, {} long rows, {} latest samples",
            raw.path().display(),
            nodes_emitted,
            table.len(),
            samples.len()
        );

        Ok(FileOutput {
            table,
            date_token,
            nodes_emitted,
            samples,
        })
    }

    /// Build the wide table for one node, or `None` when the node is skipped
    fn node_table(&self, raw: &RawFile, node_id: u32) -> Result<Option<NodeTable>> {
        let block = NodeColumns::for_node(node_id);

        let Some(node_col) = raw.column_index(&block.node_id) else {
            return Ok(None);
        };
        let node_cells = raw.column_cells(&block.node_id);
        if node_cells.iter().all(Option::is_none) {
            debug!("Node {}: NodeID column empty, skipped", node_id);
            return Ok(None);
        }

        let last_row = raw.row_count().saturating_sub(1);
        let sensor_code = raw
            .column_index(&block.sensor_type)
            .and_then(|col| raw.cell(last_row, col))
            .and_then(parse_code);
        let Some(sensor_code) = sensor_code else {
            debug!("Node {}: no sensor type code on the last row, skipped", node_id);
            return Ok(None);
        };

        let channels: &[Channel] = self.sensor_types.labels_for(sensor_code);
        let channels = &channels[..channels.len().min(VALUE_SLOTS_PER_NODE)];
        if channels.is_empty() {
            debug!(
                "Node {}: sensor type {} has no channels, skipped",
                node_id, sensor_code
            );
            return Ok(None);
        }

        let value_cols: Vec<Option<usize>> = block.values[..channels.len()]
            .iter()
            .map(|name| raw.column_index(name))
            .collect();
        let scale_cols: Vec<Option<usize>> = block.scales[..channels.len()]
            .iter()
            .map(|name| raw.column_index(name))
            .collect();
        let signal_col = raw.column_index(&block.signal_strength);
        let time_col = raw.column_index(columns::TIME);

        let mut measurements = vec![columns::SIGNAL_STRENGTH_DB.to_string()];
        measurements.extend(
            channels
                .iter()
                .filter(|channel| !channel.is_empty())
                .map(Channel::column_name),
        );

        let mut rows = Vec::with_capacity(raw.row_count());
        for row in 0..raw.row_count() {
            let time = time_col
                .and_then(|col| raw.cell(row, col))
                .map(str::to_string);
            let node_value = match raw.cell(row, node_col) {
                Some(text) => Some(parse_node_id(text).ok_or_else(|| {
                    WsnError::MalformedNodeId {
                        path: raw.path().to_path_buf(),
                        column: block.node_id.clone(),
                        row: row + 1,
                        value: text.to_string(),
                    }
                })?),
                None => None,
            };

            let mut values = Vec::with_capacity(measurements.len());
            values.push(signal_col.and_then(|col| raw.cell(row, col)).and_then(parse_number));

            for (slot, channel) in channels.iter().enumerate() {
                if channel.is_empty() {
                    continue;
                }
                let value = value_cols[slot]
                    .and_then(|col| raw.cell(row, col))
                    .and_then(parse_number);
                let multiplier = match scale_cols[slot] {
                    Some(col) => self.resolve_scale(raw, row, col, &block.scales[slot])?,
                    None => None,
                };
                values.push(value.zip(multiplier).map(|(reading, scale)| reading * scale));
            }

            rows.push(WideRow {
                time,
                node_id: node_value,
                values,
            });
        }

        Ok(Some(NodeTable { measurements, rows }))
    }

    /// Scale cell -> multiplier. Text that is not a number fails the file.
    fn resolve_scale(
        &self,
        raw: &RawFile,
        row: usize,
        col: usize,
        column: &str,
    ) -> Result<Option<f64>> {
        let Some(text) = raw.cell(row, col) else {
            return Ok(None);
        };
        let code: f64 = text.parse().map_err(|_| WsnError::MalformedScale {
            path: raw.path().to_path_buf(),
            column: column.to_string(),
            row: row + 1,
            value: text.to_string(),
        })?;
        if !code.is_finite() || code.fract() != 0.0 {
            return Ok(None);
        }
        Ok(self.scales.resolve(code as i64))
    }
}

/// Date token of a source file name: the text after the last `_` and before
/// the first `.` that follows it.
///
/// ```
/// use wsn_preprocess::processor::transform::date_token;
/// assert_eq!(date_token("LG01_node1-17_20250421.csv"), "20250421");
/// ```
pub fn date_token(file_name: &str) -> String {
    let tail = file_name.rsplit('_').next().unwrap_or(file_name);
    tail.split('.').next().unwrap_or(tail).to_string()
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|value| !value.is_nan())
}

/// Integer code, tolerating a trailing `.0`
fn parse_code(text: &str) -> Option<i64> {
    if let Ok(code) = text.parse::<i64>() {
        return Some(code);
    }
    let value: f64 = text.parse().ok()?;
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

fn parse_node_id(text: &str) -> Option<u32> {
    parse_code(text)
        .filter(|id| *id >= 1)
        .and_then(|id| u32::try_from(id).ok())
}
