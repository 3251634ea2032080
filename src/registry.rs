//! Installed-sensor registry.
//!
//! Loads the management ledger that maps a node id to the sensor type it
//! was installed as and the equipment it measures. Only the latest-readings
//! workbook consults it; long-format output does not depend on it.

use crate::error::Result;
use crate::raw::decode_text;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// One installed sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorEntry {
    pub node_id: u32,
    pub sensor_type: Option<String>,
    pub measurement_target: Option<String>,
}

impl SensorEntry {
    /// Declared sensor type, or `None` when blank (decommissioned node)
    pub fn declared_type(&self) -> Option<&str> {
        self.sensor_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct LedgerRow {
    #[serde(rename = "ID")]
    id: Option<String>,
    #[serde(rename = "SensorType", alias = "センサ種別", default)]
    sensor_type: Option<String>,
    #[serde(rename = "MeasurementTarget", alias = "測定対象", default)]
    measurement_target: Option<String>,
}

/// Node id -> installed sensor lookup
#[derive(Debug, Clone, Default)]
pub struct SensorRegistry {
    sensors: HashMap<u32, SensorEntry>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: SensorEntry) {
        self.sensors.entry(entry.node_id).or_insert(entry);
    }

    /// Load the registry from a CSV export of the management ledger.
    ///
    /// Rows whose `ID` is blank or not a positive integer (spare or note
    /// rows) are skipped. When an id appears twice the
    /// first row wins.
    pub fn from_csv_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let text = decode_text(&bytes, path);
        let registry = Self::from_csv_str(&text)?;
        debug!(
            "Loaded {} installed sensors from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut registry = Self::new();
        for (line, row) in reader.deserialize::<LedgerRow>().enumerate() {
            let row = row?;
            let Some(raw_id) = row.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
            else {
                continue;
            };
            let Some(node_id) = parse_node_id(raw_id) else {
                warn!("Sensor ledger row {}: ignoring non-integer ID {:?}", line + 1, raw_id);
                continue;
            };
            registry.insert(SensorEntry {
                node_id,
                sensor_type: row.sensor_type,
                measurement_target: row.measurement_target,
            });
        }

        Ok(registry)
    }

    pub fn get(&self, node_id: u32) -> Option<&SensorEntry> {
        self.sensors.get(&node_id)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

/// Spreadsheet exports write integer ids as `7` or `7.0`
fn parse_node_id(raw: &str) -> Option<u32> {
    if let Ok(id) = raw.parse::<u32>() {
        return (id >= 1).then_some(id);
    }
    let id = raw.parse::<f64>().ok()?;
    (id.fract() == 0.0 && id >= 1.0 && id <= u32::MAX as f64).then_some(id as u32)
}
