//! Builders for logger dumps and complete run environments

use crate::config::{CompressionAlgorithm, WsnConfig};
use crate::constants::DEFAULT_SOURCE_PATTERN;
use crate::models::NodeRange;
use crate::schema::{columns_for_range, node_label};
use encoding_rs::SHIFT_JIS;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// One generated cell, addressed by its schema column name
pub fn cell(node_id: u32, kind: &str, value: &str) -> (String, String) {
    (format!("{}:{}", node_label(node_id), kind), value.to_string())
}

/// Cells of one populated node block: id, signal -60 dB, sensor code, and
/// `(value, scale code)` pairs from slot 1 upwards
pub fn node_cells(node_id: u32, sensor_code: &str, pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut cells = vec![
        cell(node_id, "NodeID", &node_id.to_string()),
        cell(node_id, "SignalStrength", "-60"),
        cell(node_id, "SensorType", sensor_code),
    ];
    for (slot, (value, scale)) in pairs.iter().enumerate() {
        cells.push(cell(node_id, &format!("Value{}", slot + 1), value));
        cells.push(cell(node_id, &format!("Scale{}", slot + 1), scale));
        cells.push(cell(node_id, &format!("Unit{}", slot + 1), "-"));
    }
    cells
}

/// In-memory logger dump
#[derive(Debug, Clone)]
pub struct DumpBuilder {
    range: NodeRange,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DumpBuilder {
    pub fn new(start_id: u32, end_id: u32) -> Self {
        let range = NodeRange::new(start_id, end_id).unwrap();
        Self {
            range,
            columns: columns_for_range(&range),
            rows: Vec::new(),
        }
    }

    pub fn range(&self) -> &NodeRange {
        &self.range
    }

    /// Append a data row; later cells overwrite earlier ones
    pub fn row(mut self, time: &str, cells: Vec<(String, String)>) -> Self {
        let mut row = vec![String::new(); self.columns.len()];
        row[0] = time.to_string();
        for (name, value) in cells {
            let index = self
                .columns
                .iter()
                .position(|column| *column == name)
                .unwrap_or_else(|| panic!("no column {}", name));
            row[index] = value;
        }
        self.rows.push(row);
        self
    }

    /// Full file text: two metadata lines, a logger-style header, the rows
    pub fn text(&self) -> String {
        let header: Vec<String> = self
            .columns
            .iter()
            .map(|name| name.replace(':', "_"))
            .collect();

        let mut text = String::from("ロガー,LG-01\n出力日時,2025/04/21 10:30:00\n");
        text.push_str(&header.join(","));
        text.push('\n');
        for row in &self.rows {
            text.push_str(&row.join(","));
            text.push('\n');
        }
        text
    }

    /// Write the dump Shift_JIS encoded, creating parent directories
    pub fn write(&self, path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let text = self.text();
        let (bytes, _, _) = SHIFT_JIS.encode(&text);
        fs::write(path, bytes).unwrap();
    }
}

/// Temporary run environment with lookup tables and a configuration
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub config: WsnConfig,
}

impl TestEnvironment {
    /// Tables used across the pipeline tests:
    /// * scale code 5 -> 0.1, 1 -> 1.0
    /// * sensor type 3 -> Temperature [degC], Humidity [%RH]
    /// * sensor type 4 -> CO2 [ppm]
    /// * sensor type 9 -> no channels
    /// * registry: node 1 Temp/Humidity, node 2 CO2, node 3 blank
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let setting = root.join("setting");
        fs::create_dir_all(&setting).unwrap();
        fs::create_dir_all(root.join("LoggingLog")).unwrap();

        fs::write(
            setting.join("scale.json"),
            r#"{"scale": {"1": 1.0, "5": 0.1}}"#,
        )
        .unwrap();
        fs::write(
            setting.join("sens_type.json"),
            r#"[
                {"sens_code_dec": 3, "sens_name": "Temp/Humidity",
                 "channels": [{"label": "Temperature", "unit": "degC"},
                              {"label": "Humidity", "unit": "%RH"}]},
                {"sens_code_dec": 4, "sens_name": "CO2",
                 "channels": [{"label": "CO2", "unit": "ppm"}]},
                {"sens_code_dec": 9, "sens_name": "Retired", "channels": []}
            ]"#,
        )
        .unwrap();
        fs::write(
            setting.join("sheets.json"),
            r#"[{"sheet_name": "Temp/Humidity"}, {"sheet_name": "CO2"}]"#,
        )
        .unwrap();
        let (ledger_csv, _, _) = SHIFT_JIS.encode(
            "ID,センサ種別,測定対象\n1,Temp/Humidity,事務室\n2,CO2,会議室\n3,,撤去済\n",
        );
        fs::write(setting.join("management_ledger.csv"), ledger_csv).unwrap();

        let config = WsnConfig {
            logging_data_path: root.join("LoggingLog"),
            output_folder_path: root.join("output"),
            scale_json_path: setting.join("scale.json"),
            sens_type_json_path: setting.join("sens_type.json"),
            current_data_excel_file_path: root.join("latest").join("sensor_data.xlsx"),
            current_sensor_readings_json: setting.join("sheets.json"),
            management_ledger_path: setting.join("management_ledger.csv"),
            preprocessed_file_path: None,
            source_file_pattern: DEFAULT_SOURCE_PATTERN.to_string(),
            parquet_compression: CompressionAlgorithm::Snappy,
            show_progress: false,
        };

        Self { temp_dir, config }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of a source file under `LoggingLog/<directory>/`
    pub fn source(&self, directory: &str, file_name: &str) -> PathBuf {
        self.config.logging_data_path.join(directory).join(file_name)
    }

    /// Expected output stem for a range and date
    pub fn output_stem(&self, label: &str, date: &str) -> PathBuf {
        self.config
            .output_folder_path
            .join(label)
            .join(format!("{}_{}", label, date))
    }
}

/// One row for nodes 1 and 2 of a `node1-2` dump
pub fn two_node_row(builder: DumpBuilder, time: &str, temperature: &str, co2: &str) -> DumpBuilder {
    builder.row(
        time,
        [
            node_cells(1, "3", &[(temperature, "5"), ("50", "1")]),
            node_cells(2, "4", &[(co2, "1")]),
        ]
        .concat(),
    )
}
