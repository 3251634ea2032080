//! Application constants for the WSN preprocessor
//!
//! Column names, file layout markers and default values shared across the
//! schema generator, transformer and writers.

// =============================================================================
// Node Ranges
// =============================================================================

/// Smallest node id a logger can report
pub const MIN_NODE_ID: u32 = 1;

/// Largest node id a logger can report
pub const MAX_NODE_ID: u32 = 9999;

/// Number of value/scale/unit slots each node block carries
pub const VALUE_SLOTS_PER_NODE: usize = 19;

/// Fixed columns per node block (NodeID, SignalStrength, SensorType)
pub const FIXED_COLUMNS_PER_NODE: usize = 3;

/// Total columns per node block
pub const COLUMNS_PER_NODE: usize = FIXED_COLUMNS_PER_NODE + 3 * VALUE_SLOTS_PER_NODE;

/// Directory name prefix for node range folders
pub const NODE_DIR_PREFIX: &str = "node";

// =============================================================================
// Source File Layout
// =============================================================================

/// Metadata lines preceding the header row in a logger dump
pub const SOURCE_METADATA_LINES: usize = 2;

/// Cell contents treated as missing, in addition to empty cells
pub const MISSING_VALUE_MARKERS: &[&str] = &["NA", "N/A", "NaN", "nan", "NULL", "null", "#N/A", "None"];

/// Default glob for source files inside a node directory
pub const DEFAULT_SOURCE_PATTERN: &str = "*.csv";

/// strftime format of the date token embedded in file names
pub const DATE_TOKEN_FORMAT: &str = "%Y%m%d";

// =============================================================================
// Column Name Constants
// =============================================================================

/// Column names used in raw schemas and in the outputs
pub mod columns {
    pub const TIME: &str = "TIME";
    pub const NODE_ID: &str = "NodeID";
    pub const SIGNAL_STRENGTH: &str = "SignalStrength";
    pub const SENSOR_TYPE: &str = "SensorType";
    pub const VALUE: &str = "Value";
    pub const SCALE: &str = "Scale";
    pub const UNIT: &str = "Unit";

    /// Signal strength after renaming in the per-node table
    pub const SIGNAL_STRENGTH_DB: &str = "SignalStrength_[dB]";

    /// Long-format measurement label column
    pub const MEASUREMENT: &str = "Measurement";

    /// Latest-readings column holding the ledger's measurement target
    pub const MEASUREMENT_TARGET: &str = "MeasurementTarget";
}

// =============================================================================
// Output Files
// =============================================================================

/// Ledger file name used when the configuration does not name one
pub const DEFAULT_LEDGER_FILENAME: &str = "preprocessed_file_history.json";

/// Top-level key of the ledger document
pub const LEDGER_ROOT_KEY: &str = "preprocessed_file_path";

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "setting/config.json";

/// Application directory under the user config dir
pub const CONFIG_DIR_NAME: &str = "wsn-preprocess";

/// Configuration file name
pub const CONFIG_FILENAME: &str = "config.json";
