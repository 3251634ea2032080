//! Core data structures and types for WSN preprocessing.
//!
//! Defines node ranges, long-format records and run statistics shared by
//! the transformer, writers and pipeline.

use crate::constants::{MAX_NODE_ID, MIN_NODE_ID};
use crate::error::{Result, WsnError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Contiguous, inclusive range of node ids served by one logger directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeRange {
    start_id: u32,
    end_id: u32,
}

impl NodeRange {
    /// Create a validated node range
    pub fn new(start_id: u32, end_id: u32) -> Result<Self> {
        if start_id < MIN_NODE_ID || end_id > MAX_NODE_ID || start_id > end_id {
            return Err(WsnError::InvalidRange {
                start: start_id,
                end: end_id,
            });
        }
        Ok(Self { start_id, end_id })
    }

    pub fn start_id(&self) -> u32 {
        self.start_id
    }

    pub fn end_id(&self) -> u32 {
        self.end_id
    }

    /// Number of nodes in the range
    pub fn len(&self) -> usize {
        (self.end_id - self.start_id + 1) as usize
    }

    /// Node ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = u32> {
        self.start_id..=self.end_id
    }

    /// Label used for output folders and file names, e.g. `node1-17`
    pub fn label(&self) -> String {
        format!("node{}-{}", self.start_id, self.end_id)
    }
}

impl fmt::Display for NodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_id, self.end_id)
    }
}

/// One canonical output row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub time: String,
    pub node_id: u32,
    pub measurement: String,
    pub value: f64,
}

/// Unpivoted row before missing values are filtered out
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    pub time: Option<String>,
    pub node_id: Option<u32>,
    pub measurement: String,
    pub value: Option<f64>,
}

impl PendingRecord {
    /// Complete record, or `None` when any field is unpopulated
    pub fn complete(self) -> Option<LongRecord> {
        Some(LongRecord {
            time: self.time?,
            node_id: self.node_id?,
            measurement: self.measurement,
            value: self.value?,
        })
    }
}

/// Long-format table produced for one source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LongTable {
    records: Vec<LongRecord>,
}

impl LongTable {
    /// Drop incomplete rows and order by TIME.
    ///
    /// The sort is stable so rows sharing a timestamp keep node, then
    /// measurement order.
    pub fn from_pending(pending: Vec<PendingRecord>) -> Self {
        let mut records: Vec<LongRecord> = pending
            .into_iter()
            .filter_map(PendingRecord::complete)
            .collect();
        records.sort_by(|a, b| a.time.cmp(&b.time));
        Self { records }
    }

    pub fn records(&self) -> &[LongRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Statistics for one pipeline run
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub directories_scanned: usize,
    pub directories_failed: usize,
    pub files_seen: usize,
    pub files_skipped: usize,
    pub files_processed: usize,
    pub files_empty: usize,
    pub files_failed: usize,
    pub rows_written: usize,
    pub latest_samples: usize,
    pub output_path: PathBuf,
    pub processing_time_ms: u128,
}
