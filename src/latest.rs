//! Latest readings workbook.
//!
//! While today's dumps are processed, the last row of every node block is
//! routed to the worksheet named after the node's installed sensor type.
//! At the end of the run the whole workbook is rewritten.

use crate::calibration::strip_bom;
use crate::constants::columns;
use crate::error::Result;
use crate::registry::SensorRegistry;
use rust_xlsxwriter::Workbook;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Last row of one node's wide table
#[derive(Debug, Clone, PartialEq)]
pub struct LatestSample {
    pub time: Option<String>,
    pub node_id: Option<u32>,
    /// Column name and value, signal strength first
    pub measurements: Vec<(String, Option<f64>)>,
}

/// A sample accepted into a sheet
#[derive(Debug, Clone, PartialEq)]
pub struct LatestReadingRow {
    pub time: Option<String>,
    pub node_id: u32,
    pub measurement_target: Option<String>,
    pub measurements: Vec<(String, Option<f64>)>,
}

/// Accumulated rows for one worksheet
#[derive(Debug, Clone, PartialEq)]
pub struct SheetBuffer {
    pub name: String,
    pub rows: Vec<LatestReadingRow>,
}

impl SheetBuffer {
    /// Header row: fixed columns, then measurement columns in first-seen order
    pub fn columns(&self) -> Vec<String> {
        let mut names: Vec<String> = vec![
            columns::TIME.to_string(),
            columns::NODE_ID.to_string(),
            columns::MEASUREMENT_TARGET.to_string(),
        ];
        let mut seen: HashSet<&str> = HashSet::new();
        for row in &self.rows {
            for (name, _) in &row.measurements {
                if seen.insert(name.as_str()) {
                    names.push(name.clone());
                }
            }
        }
        names
    }
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    sheet_name: String,
}

/// Per-sensor-type buffers of latest samples
#[derive(Debug, Clone, Default)]
pub struct LatestReadingsAccumulator {
    sheets: Vec<SheetBuffer>,
}

impl LatestReadingsAccumulator {
    /// Create one empty sheet per name, in order.
    ///
    /// `/` is not allowed in worksheet names and is removed. Empty and
    /// repeated names, and names the workbook format rejects (the characters
    /// `[ ] : * ? \`, more than 31 characters, a leading or trailing `'`,
    /// or `History`), are dropped with a warning.
    pub fn new<I, S>(sheet_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sheets: Vec<SheetBuffer> = Vec::new();
        for name in sheet_names {
            let cleaned = clean_sheet_name(name.as_ref());
            if cleaned.is_empty() {
                warn!("Ignoring empty sheet name {:?}", name.as_ref());
                continue;
            }
            if let Some(reason) = invalid_sheet_name(&cleaned) {
                warn!("Ignoring sheet name {:?}: {}", cleaned, reason);
                continue;
            }
            if sheets
                .iter()
                .any(|sheet| sheet.name.to_lowercase() == cleaned.to_lowercase())
            {
                warn!("Ignoring repeated sheet name {:?}", cleaned);
                continue;
            }
            sheets.push(SheetBuffer {
                name: cleaned,
                rows: Vec::new(),
            });
        }
        Self { sheets }
    }

    /// Load sheet names from `[{"sheet_name": ".."}, ..]`
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let entries: Vec<SheetEntry> = serde_json::from_str(strip_bom(&text))?;
        let accumulator = Self::new(entries.into_iter().map(|entry| entry.sheet_name));
        debug!(
            "Loaded {} latest-reading sheets from {}",
            accumulator.sheets.len(),
            path.display()
        );
        Ok(accumulator)
    }

    /// Route a sample to its sheet. Returns whether it was kept.
    ///
    /// Samples from nodes missing from the registry, or registered without a
    /// sensor type, are dropped.
    pub fn add_sample(&mut self, sample: &LatestSample, registry: &SensorRegistry) -> bool {
        let Some(node_id) = sample.node_id else {
            debug!("Latest sample without node id dropped");
            return false;
        };
        let Some(entry) = registry.get(node_id) else {
            debug!("Node {} is not in the sensor ledger", node_id);
            return false;
        };
        let Some(sensor_type) = entry.declared_type() else {
            debug!("Node {} has no declared sensor type", node_id);
            return false;
        };

        let sheet_name = clean_sheet_name(sensor_type);
        let Some(sheet) = self.sheets.iter_mut().find(|sheet| sheet.name == sheet_name) else {
            warn!(
                "No latest-readings sheet for sensor type {:?} (node {})",
                sensor_type, node_id
            );
            return false;
        };

        sheet.rows.push(LatestReadingRow {
            time: sample.time.clone(),
            node_id,
            measurement_target: entry.measurement_target.clone(),
            measurements: sample.measurements.clone(),
        });
        true
    }

    /// Drop accepted samples, keeping the sheet list
    pub fn clear(&mut self) {
        for sheet in &mut self.sheets {
            sheet.rows.clear();
        }
    }

    pub fn sheets(&self) -> &[SheetBuffer] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetBuffer> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    /// Total accepted samples across sheets
    pub fn sample_count(&self) -> usize {
        self.sheets.iter().map(|sheet| sheet.rows.len()).sum()
    }

    /// Rewrite the workbook at `path`, one worksheet per sheet.
    pub fn flush(&self, path: &Path) -> Result<()> {
        let mut workbook = Workbook::new();

        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name)?;

            if sheet.rows.is_empty() {
                debug!("Sheet {} has no samples, writing it empty", sheet.name);
                continue;
            }

            let header = sheet.columns();
            for (col, name) in header.iter().enumerate() {
                worksheet.write_string(0, col as u16, name)?;
            }

            for (index, row) in sheet.rows.iter().enumerate() {
                let line = (index + 1) as u32;
                if let Some(time) = &row.time {
                    worksheet.write_string(line, 0, time)?;
                }
                worksheet.write_number(line, 1, row.node_id)?;
                if let Some(target) = &row.measurement_target {
                    worksheet.write_string(line, 2, target)?;
                }
                for (name, value) in &row.measurements {
                    let Some(value) = value else { continue };
                    if let Some(col) = header.iter().position(|column| column == name) {
                        worksheet.write_number(line, col as u16, *value)?;
                    }
                }
            }
        }

        let buffer = workbook.save_to_buffer()?;

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(&buffer)?;
        temp.persist(path)
            .map_err(|e| crate::error::WsnError::Io(e.error))?;

        info!(
            "Latest readings written to {} ({} samples in {} sheets)",
            path.display(),
            self.sample_count(),
            self.sheets.len()
        );
        Ok(())
    }
}

fn clean_sheet_name(name: &str) -> String {
    name.replace('/', "")
}

const MAX_SHEET_NAME_CHARS: usize = 31;
const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '\\'];

fn invalid_sheet_name(name: &str) -> Option<&'static str> {
    if name.chars().count() > MAX_SHEET_NAME_CHARS {
        Some("longer than 31 characters")
    } else if name.contains(FORBIDDEN_SHEET_CHARS) {
        Some("contains one of [ ] : * ? \\")
    } else if name.starts_with('\'') || name.ends_with('\'') {
        Some("starts or ends with an apostrophe")
    } else if name.eq_ignore_ascii_case("history") {
        Some("reserved name")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SensorEntry;
    use tempfile::TempDir;

    fn registry() -> SensorRegistry {
        let mut registry = SensorRegistry::new();
        registry.insert(SensorEntry {
            node_id: 1,
            sensor_type: Some("Temp/Humidity".to_string()),
            measurement_target: Some("Office".to_string()),
        });
        registry.insert(SensorEntry {
            node_id: 2,
            sensor_type: Some("".to_string()),
            measurement_target: Some("Retired".to_string()),
        });
        registry.insert(SensorEntry {
            node_id: 3,
            sensor_type: Some("CO2".to_string()),
            measurement_target: None,
        });
        registry
    }

    fn sample(node_id: u32, temperature: Option<f64>) -> LatestSample {
        LatestSample {
            time: Some("2025/04/21 10:00:00".to_string()),
            node_id: Some(node_id),
            measurements: vec![
                ("SignalStrength_[dB]".to_string(), Some(-61.0)),
                ("Temperature_[degC]".to_string(), temperature),
            ],
        }
    }

    #[test]
    fn test_sheet_names_are_cleaned() {
        let accumulator = LatestReadingsAccumulator::new(["Temp/Humidity", "CO2", "CO2", "/"]);
        let names: Vec<&str> = accumulator.sheets().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["TempHumidity", "CO2"]);
    }

    #[test]
    fn test_unwritable_sheet_names_are_dropped() {
        let accumulator = LatestReadingsAccumulator::new([
            "CO2[ppm]",
            "Flow:1",
            "A very long sheet name that Excel refuses",
            "'quoted'",
            "History",
            "co2",
            "CO2",
        ]);
        let names: Vec<&str> = accumulator.sheets().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["co2"]);
    }

    #[test]
    fn test_flush_succeeds_after_dropping_bad_names() {
        let temp_dir = TempDir::new().unwrap();
        let accumulator = LatestReadingsAccumulator::new(["CO2[ppm]", "Temp/Humidity"]);
        let path = temp_dir.path().join("sensor_data.xlsx");

        accumulator.flush(&path).unwrap();

        assert!(path.exists());
        assert_eq!(accumulator.sheets().len(), 1);
    }

    #[test]
    fn test_samples_routed_by_declared_type() {
        let registry = registry();
        let mut accumulator = LatestReadingsAccumulator::new(["Temp/Humidity", "CO2"]);

        assert!(accumulator.add_sample(&sample(1, Some(21.5)), &registry));
        assert!(accumulator.add_sample(&sample(1, Some(21.7)), &registry));

        let sheet = accumulator.sheet("TempHumidity").unwrap();
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].measurement_target.as_deref(), Some("Office"));
        assert_eq!(
            sheet.columns(),
            vec![
                "TIME",
                "NodeID",
                "MeasurementTarget",
                "SignalStrength_[dB]",
                "Temperature_[degC]"
            ]
        );
        assert!(accumulator.sheet("CO2").unwrap().rows.is_empty());
    }

    #[test]
    fn test_unregistered_and_blank_nodes_discarded() {
        let registry = registry();
        let mut accumulator = LatestReadingsAccumulator::new(["Temp/Humidity", "CO2"]);

        assert!(!accumulator.add_sample(&sample(2, Some(1.0)), &registry));
        assert!(!accumulator.add_sample(&sample(99, Some(1.0)), &registry));
        let mut anonymous = sample(1, Some(1.0));
        anonymous.node_id = None;
        assert!(!accumulator.add_sample(&anonymous, &registry));

        assert_eq!(accumulator.sample_count(), 0);
    }

    #[test]
    fn test_type_without_sheet_discarded() {
        let registry = registry();
        let mut accumulator = LatestReadingsAccumulator::new(["Temp/Humidity"]);

        assert!(!accumulator.add_sample(&sample(3, Some(400.0)), &registry));
        assert_eq!(accumulator.sample_count(), 0);
    }

    #[test]
    fn test_flush_writes_workbook_with_empty_sheets() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry();
        let mut accumulator = LatestReadingsAccumulator::new(["Temp/Humidity", "CO2"]);
        accumulator.add_sample(&sample(1, None), &registry);

        let path = temp_dir.path().join("latest").join("sensor_data.xlsx");
        accumulator.flush(&path).unwrap();
        let first_size = fs::metadata(&path).unwrap().len();
        assert!(first_size > 0);

        // A second flush replaces the file instead of appending to it.
        accumulator.flush(&path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), first_size);
    }

    #[test]
    fn test_from_json_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sheets.json");
        fs::write(
            &path,
            r#"[{"sheet_name": "Temp/Humidity"}, {"sheet_name": "CO2"}]"#,
        )
        .unwrap();

        let accumulator = LatestReadingsAccumulator::from_json_file(&path).unwrap();
        assert_eq!(accumulator.sheets().len(), 2);
        assert_eq!(accumulator.sheets()[0].name, "TempHumidity");
    }
}
