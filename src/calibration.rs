//! Calibration lookup tables.
//!
//! `ScaleTable` turns a raw scale code into a decimal multiplier and
//! `SensorTypeTable` turns a sensor-type code into the ordered measurement
//! channels the node's value slots carry. Both are loaded once per run and
//! read-only afterwards.

use crate::error::{Result, WsnError};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Scale code -> multiplier lookup
#[derive(Debug, Clone, Default)]
pub struct ScaleTable {
    multipliers: HashMap<i64, f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScaleDocument {
    Records(Vec<ScaleRecord>),
    Columns { scale: ScaleColumn },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScaleColumn {
    Positional(Vec<Option<f64>>),
    Keyed(BTreeMap<String, Option<f64>>),
}

#[derive(Deserialize)]
struct ScaleRecord {
    code: Option<i64>,
    scale: Option<f64>,
}

impl ScaleTable {
    pub fn new(multipliers: HashMap<i64, f64>) -> Self {
        Self { multipliers }
    }

    /// Load from a JSON document.
    ///
    /// Accepted shapes: `{"scale": [m0, m1, ..]}` where the position is the
    /// code, `{"scale": {"<code>": m}}`, or `[{"code": c, "scale": m}]` where
    /// a missing `code` falls back to the record position.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let table = Self::from_json_str(&text)?;
        debug!(
            "Loaded {} scale codes from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let document: ScaleDocument = serde_json::from_str(strip_bom(text))?;
        let mut multipliers = HashMap::new();

        match document {
            ScaleDocument::Columns {
                scale: ScaleColumn::Positional(values),
            } => {
                for (code, value) in values.into_iter().enumerate() {
                    if let Some(value) = value {
                        multipliers.insert(code as i64, value);
                    }
                }
            }
            ScaleDocument::Columns {
                scale: ScaleColumn::Keyed(values),
            } => {
                for (key, value) in values {
                    let code = key.trim().parse::<i64>().map_err(|_| {
                        WsnError::configuration(format!("Scale code {:?} is not an integer", key))
                    })?;
                    if let Some(value) = value {
                        multipliers.insert(code, value);
                    }
                }
            }
            ScaleDocument::Records(records) => {
                for (position, record) in records.into_iter().enumerate() {
                    if let Some(value) = record.scale {
                        multipliers.insert(record.code.unwrap_or(position as i64), value);
                    }
                }
            }
        }

        Ok(Self { multipliers })
    }

    /// Multiplier for `code`; unknown codes yield `None`
    pub fn resolve(&self, code: i64) -> Option<f64> {
        self.multipliers.get(&code).copied()
    }

    pub fn len(&self) -> usize {
        self.multipliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.multipliers.is_empty()
    }
}

/// One measurement channel a sensor type reports
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    pub label: String,
    #[serde(default)]
    pub unit: String,
}

impl Channel {
    pub fn new(label: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            unit: unit.into(),
        }
    }

    /// Placeholder slots are kept for alignment but never emitted
    pub fn is_empty(&self) -> bool {
        self.label.trim().is_empty()
    }

    /// Split a flat-table entry such as `Temperature_[degC]`.
    ///
    /// Entries without a `_[unit]` suffix become a unitless channel.
    pub fn from_column_name(name: &str) -> Self {
        let name = name.trim();
        match name.strip_suffix(']').and_then(|head| head.rsplit_once("_[")) {
            Some((label, unit)) => Self::new(label, unit),
            None => Self::new(name, ""),
        }
    }

    /// Output column name, e.g. `Temperature_[degC]`
    pub fn column_name(&self) -> String {
        if self.unit.is_empty() {
            self.label.clone()
        } else {
            format!("{}_[{}]", self.label, self.unit)
        }
    }
}

/// Keys of a sensor-type record that never name a channel
const RECORD_KEYS: &[&str] = &["sens_code_dec", "code", "sens_code_hex", "sens_name", "name"];

/// A sensor type's name and channel layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorType {
    pub name: Option<String>,
    pub channels: Vec<Channel>,
}

/// Sensor-type code -> ordered channel list
#[derive(Debug, Clone, Default)]
pub struct SensorTypeTable {
    types: HashMap<i64, SensorType>,
}

impl SensorTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sensor type; trailing empty channels are trimmed
    pub fn insert(&mut self, code: i64, name: Option<String>, channels: Vec<Channel>) {
        self.types.insert(
            code,
            SensorType {
                name,
                channels: trim_trailing_empty(channels),
            },
        );
    }

    /// Load from a JSON array of sensor-type records.
    ///
    /// A record either carries
    /// `{"sens_code_dec": c, "sens_name": "..", "channels": [{"label", "unit"} | null]}`
    /// or is a flat row where every field after `sens_code_dec`,
    /// `sens_code_hex` and `sens_name` is a `label_[unit]` column name, in
    /// document order. Null fields in a flat row are dropped.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let table = Self::from_json_str(&text)?;
        debug!(
            "Loaded {} sensor types from {}",
            table.types.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let records: Vec<Map<String, Value>> = serde_json::from_str(strip_bom(text))?;
        let mut table = Self::new();

        for (position, record) in records.into_iter().enumerate() {
            let code = record_code(&record).ok_or_else(|| {
                WsnError::configuration(format!(
                    "Sensor type record {} has no integer sens_code_dec",
                    position
                ))
            })?;
            let name = record
                .get("sens_name")
                .or_else(|| record.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string);

            let channels = match record.get("channels") {
                Some(channels) => {
                    serde_json::from_value::<Vec<Option<Channel>>>(channels.clone())?
                        .into_iter()
                        .map(|channel| channel.unwrap_or_else(|| Channel::new("", "")))
                        .collect()
                }
                None => flat_channels(&record),
            };
            table.insert(code, name, channels);
        }

        Ok(table)
    }

    /// Whether at least one sensor type declares a measurement channel
    pub fn declares_channels(&self) -> bool {
        self.types
            .values()
            .any(|sensor| sensor.channels.iter().any(|channel| !channel.is_empty()))
    }

    /// Channels valid for `code`; empty when the code is unknown
    pub fn labels_for(&self, code: i64) -> &[Channel] {
        self.types
            .get(&code)
            .map(|sensor| sensor.channels.as_slice())
            .unwrap_or(&[])
    }

    pub fn get(&self, code: i64) -> Option<&SensorType> {
        self.types.get(&code)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn record_code(record: &Map<String, Value>) -> Option<i64> {
    let value = record.get("sens_code_dec").or_else(|| record.get("code"))?;
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|code| code.fract() == 0.0)
                .map(|code| code as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn flat_channels(record: &Map<String, Value>) -> Vec<Channel> {
    record
        .iter()
        .filter(|(key, _)| !RECORD_KEYS.contains(&key.as_str()))
        .filter_map(|(_, value)| match value {
            Value::Null => None,
            Value::String(name) => Some(Channel::from_column_name(name)),
            other => Some(Channel::from_column_name(&other.to_string())),
        })
        .collect()
}

fn trim_trailing_empty(mut channels: Vec<Channel>) -> Vec<Channel> {
    while channels.last().is_some_and(Channel::is_empty) {
        channels.pop();
    }
    channels
}

pub(crate) fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}
