//! Configuration management and validation.
//!
//! The run configuration is a JSON document with upper-case keys naming the
//! input share, output folder and the lookup tables. Optional keys tune the
//! source file pattern, Parquet compression and progress display.

use crate::calibration::strip_bom;
use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILENAME, DEFAULT_CONFIG_PATH, DEFAULT_LEDGER_FILENAME,
    DEFAULT_SOURCE_PATTERN,
};
use crate::error::{Result, WsnError};
use polars::prelude::ParquetCompression;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Supported compression algorithms for parquet files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    #[default]
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    /// No compression
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to polars ParquetCompression type
    pub fn to_polars_compression(&self) -> ParquetCompression {
        match self {
            CompressionAlgorithm::Snappy => ParquetCompression::Snappy,
            CompressionAlgorithm::Zstd => ParquetCompression::Zstd(None),
            CompressionAlgorithm::Lz4 => ParquetCompression::Lz4Raw,
            CompressionAlgorithm::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

/// Run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct WsnConfig {
    /// Root holding the `node<start>-<end>` directories
    pub logging_data_path: PathBuf,

    /// Root for long-format outputs (and the default ledger location)
    pub output_folder_path: PathBuf,

    /// Scale-code table
    pub scale_json_path: PathBuf,

    /// Sensor-type channel table
    pub sens_type_json_path: PathBuf,

    /// Latest-readings workbook, rewritten every run
    pub current_data_excel_file_path: PathBuf,

    /// Sheet list for the latest-readings workbook
    pub current_sensor_readings_json: PathBuf,

    /// Installed-sensor ledger (CSV)
    pub management_ledger_path: PathBuf,

    /// Processed-file ledger; defaults to a file in the output folder
    #[serde(default)]
    pub preprocessed_file_path: Option<PathBuf>,

    /// Glob selecting source files inside a node directory
    #[serde(default = "default_source_pattern")]
    pub source_file_pattern: String,

    #[serde(default)]
    pub parquet_compression: CompressionAlgorithm,

    /// Show per-directory progress bars
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

fn default_source_pattern() -> String {
    DEFAULT_SOURCE_PATTERN.to_string()
}

fn default_show_progress() -> bool {
    true
}

impl WsnConfig {
    /// Find the configuration file.
    ///
    /// An explicit path must exist. Otherwise `./setting/config.json` is
    /// tried, then `<user config dir>/wsn-preprocess/config.json`.
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            return Err(WsnError::configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let mut candidates = vec![PathBuf::from(DEFAULT_CONFIG_PATH)];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILENAME));
        }

        for candidate in &candidates {
            if candidate.is_file() {
                debug!("Using configuration file {}", candidate.display());
                return Ok(candidate.clone());
            }
        }

        let tried: Vec<String> = candidates
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        Err(WsnError::configuration(format!(
            "No configuration file found (tried {})",
            tried.join(", ")
        )))
    }

    /// Locate and read the configuration
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::locate(explicit)?;
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse a configuration document; a UTF-8 BOM is tolerated
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(strip_bom(text))?)
    }

    /// Check that every input the run reads exists
    pub fn validate(&self) -> Result<()> {
        if !self.logging_data_path.is_dir() {
            return Err(WsnError::configuration(format!(
                "LOGGING_DATA_PATH is not a directory: {}",
                self.logging_data_path.display()
            )));
        }

        let inputs = [
            ("SCALE_JSON_PATH", &self.scale_json_path),
            ("SENS_TYPE_JSON_PATH", &self.sens_type_json_path),
            ("CURRENT_SENSOR_READINGS_JSON", &self.current_sensor_readings_json),
            ("MANAGEMENT_LEDGER_PATH", &self.management_ledger_path),
        ];
        for (key, path) in inputs {
            if !path.is_file() {
                return Err(WsnError::configuration(format!(
                    "{} does not name a file: {}",
                    key,
                    path.display()
                )));
            }
        }

        if self.source_file_pattern.trim().is_empty() {
            return Err(WsnError::configuration("SOURCE_FILE_PATTERN is empty"));
        }
        if let Err(e) = glob::Pattern::new(&self.source_file_pattern) {
            return Err(WsnError::configuration(format!(
                "SOURCE_FILE_PATTERN {:?} is not a valid glob: {}",
                self.source_file_pattern, e
            )));
        }

        Ok(())
    }

    /// Processed-file ledger location
    pub fn ledger_path(&self) -> PathBuf {
        self.preprocessed_file_path
            .clone()
            .unwrap_or_else(|| self.output_folder_path.join(DEFAULT_LEDGER_FILENAME))
    }

    /// Override the input root
    pub fn with_logging_data_path(mut self, path: PathBuf) -> Self {
        self.logging_data_path = path;
        self
    }

    /// Override the output root
    pub fn with_output_folder_path(mut self, path: PathBuf) -> Self {
        self.output_folder_path = path;
        self
    }

    pub fn with_show_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn with_parquet_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.parquet_compression = compression;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"{
        "LOGGING_DATA_PATH": "/share/LoggingLog",
        "OUTPUT_FOLDER_PATH": "/share/output",
        "SCALE_JSON_PATH": "setting/scale.json",
        "SENS_TYPE_JSON_PATH": "setting/sens_type.json",
        "CURRENT_DATA_EXCEL_FILE_PATH": "/share/latest/sensor_data.xlsx",
        "CURRENT_SENSOR_READINGS_JSON": "setting/sheets.json",
        "MANAGEMENT_LEDGER_PATH": "setting/ledger.csv"
    }"#;

    #[test]
    fn test_defaults_for_optional_keys() {
        let config = WsnConfig::from_json_str(MINIMAL).unwrap();

        assert_eq!(config.logging_data_path, PathBuf::from("/share/LoggingLog"));
        assert_eq!(config.source_file_pattern, "*.csv");
        assert_eq!(config.parquet_compression, CompressionAlgorithm::Snappy);
        assert!(config.show_progress);
        assert_eq!(
            config.ledger_path(),
            PathBuf::from("/share/output/preprocessed_file_history.json")
        );
    }

    #[test]
    fn test_optional_keys_and_bom() {
        let text = format!(
            "\u{feff}{}",
            MINIMAL.replace(
                "\"MANAGEMENT_LEDGER_PATH\": \"setting/ledger.csv\"",
                "\"MANAGEMENT_LEDGER_PATH\": \"setting/ledger.csv\",
                 \"PREPROCESSED_FILE_PATH\": \"/state/history.json\",
                 \"PARQUET_COMPRESSION\": \"zstd\",
                 \"SOURCE_FILE_PATTERN\": \"*_2025*.csv\",
                 \"SHOW_PROGRESS\": false"
            )
        );
        let config = WsnConfig::from_json_str(&text).unwrap();

        assert_eq!(config.ledger_path(), PathBuf::from("/state/history.json"));
        assert_eq!(config.parquet_compression, CompressionAlgorithm::Zstd);
        assert_eq!(config.source_file_pattern, "*_2025*.csv");
        assert!(!config.show_progress);
    }

    #[test]
    fn test_missing_required_key_fails() {
        let text = MINIMAL.replace("\"SCALE_JSON_PATH\": \"setting/scale.json\",", "");
        assert!(WsnConfig::from_json_str(&text).is_err());
    }

    #[test]
    fn test_validate_reports_missing_inputs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("logs")).unwrap();
        for name in ["scale.json", "sens.json", "sheets.json"] {
            fs::write(root.join(name), "[]").unwrap();
        }

        let mut config = WsnConfig::from_json_str(MINIMAL)
            .unwrap()
            .with_logging_data_path(root.join("logs"))
            .with_output_folder_path(root.join("out"));
        config.scale_json_path = root.join("scale.json");
        config.sens_type_json_path = root.join("sens.json");
        config.current_sensor_readings_json = root.join("sheets.json");
        config.management_ledger_path = root.join("ledger.csv");

        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("MANAGEMENT_LEDGER_PATH"));

        fs::write(root.join("ledger.csv"), "ID,SensorType\n").unwrap();
        assert!(config.validate().is_ok());

        config.source_file_pattern = "[".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_locate_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, MINIMAL).unwrap();

        assert_eq!(WsnConfig::locate(Some(&path)).unwrap(), path);
        assert!(WsnConfig::locate(Some(&temp_dir.path().join("absent.json"))).is_err());
        assert!(WsnConfig::load(Some(&path)).is_ok());
    }

    #[test]
    fn test_compression_mapping() {
        assert!(matches!(
            CompressionAlgorithm::Lz4.to_polars_compression(),
            ParquetCompression::Lz4Raw
        ));
        assert!(matches!(
            CompressionAlgorithm::Uncompressed.to_polars_compression(),
            ParquetCompression::Uncompressed
        ));
    }
}
