//! End-to-end run through the public API: configuration file, lookup
//! tables, a logger dump, and the outputs on disk.

use chrono::NaiveDate;
use encoding_rs::SHIFT_JIS;
use polars::prelude::{ParquetReader, SerReader};
use std::fs::{self, File};
use std::path::Path;
use tempfile::TempDir;
use wsn_preprocess::{Pipeline, WsnConfig, WsnError, generate_columns};

fn write_dump(path: &Path, start: u32, end: u32, rows: &[&[(&str, &str)]]) {
    let columns = generate_columns(start, end).unwrap();
    let mut text = String::from("logger,LG-07\nexported,2025/04/21\n");
    text.push_str(&columns.join(","));
    text.push('\n');
    for cells in rows {
        let mut row = vec![String::new(); columns.len()];
        for (name, value) in cells.iter() {
            let index = columns.iter().position(|c| c == name).unwrap();
            row[index] = value.to_string();
        }
        text.push_str(&row.join(","));
        text.push('\n');
    }
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let (bytes, _, _) = SHIFT_JIS.encode(&text);
    fs::write(path, bytes).unwrap();
}

fn write_config(root: &Path) -> std::path::PathBuf {
    let setting = root.join("setting");
    fs::create_dir_all(&setting).unwrap();
    fs::create_dir_all(root.join("LoggingLog")).unwrap();

    fs::write(setting.join("scale.json"), r#"{"scale": [null, 1.0, 0.01, null, null, 0.1]}"#).unwrap();
    fs::write(
        setting.join("sens_type.json"),
        r#"[{"sens_code_dec": 12, "sens_name": "Pressure",
             "channels": [{"label": "Pressure", "unit": "kPa"}, null, null]}]"#,
    )
    .unwrap();
    fs::write(setting.join("sheets.json"), r#"[{"sheet_name": "Pressure"}]"#).unwrap();
    fs::write(
        setting.join("ledger.csv"),
        "\u{feff}ID,SensorType,MeasurementTarget\n5,Pressure,Boiler feed\n",
    )
    .unwrap();

    let config = serde_json::json!({
        "LOGGING_DATA_PATH": root.join("LoggingLog"),
        "OUTPUT_FOLDER_PATH": root.join("output"),
        "SCALE_JSON_PATH": setting.join("scale.json"),
        "SENS_TYPE_JSON_PATH": setting.join("sens_type.json"),
        "CURRENT_DATA_EXCEL_FILE_PATH": root.join("latest.xlsx"),
        "CURRENT_SENSOR_READINGS_JSON": setting.join("sheets.json"),
        "MANAGEMENT_LEDGER_PATH": setting.join("ledger.csv"),
        "PARQUET_COMPRESSION": "zstd",
        "SHOW_PROGRESS": false
    });
    let path = setting.join("config.json");
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

#[test]
fn test_run_from_configuration_file() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let config_path = write_config(root);

    let yesterday = root.join("LoggingLog/node5-6/LG07_node5-6_20250420.csv");
    write_dump(
        &yesterday,
        5,
        6,
        &[&[
            ("TIME", "2025/04/20 23:50:00"),
            ("0005:NodeID", "5"),
            ("0005:SignalStrength", "-71"),
            ("0005:SensorType", "12"),
            ("0005:Value1", "1013"),
            ("0005:Scale1", "5"),
        ]],
    );
    let today = root.join("LoggingLog/node5-6/LG07_node5-6_20250421.csv");
    write_dump(
        &today,
        5,
        6,
        &[
            &[
                ("TIME", "2025/04/21 00:00:00"),
                ("0005:NodeID", "5"),
                ("0005:SignalStrength", "-70"),
                ("0005:SensorType", "12"),
                ("0005:Value1", "1012"),
                ("0005:Scale1", "5"),
            ],
            &[
                ("TIME", "2025/04/21 00:10:00"),
                ("0005:NodeID", "5"),
                ("0005:SignalStrength", "-69"),
                ("0005:SensorType", "12"),
                ("0005:Value1", ""),
                ("0005:Scale1", "5"),
            ],
        ],
    );

    let config = WsnConfig::load(Some(&config_path)).unwrap();
    config.validate().unwrap();
    let run_date = NaiveDate::from_ymd_opt(2025, 4, 21).unwrap();
    let mut pipeline = Pipeline::new(config.clone(), run_date).unwrap();

    assert_eq!(pipeline.plan().unwrap().len(), 2);
    let stats = pipeline.run().unwrap();

    assert_eq!(stats.files_processed, 2);
    // Yesterday: signal + pressure. Today: two signals, one pressure.
    assert_eq!(stats.rows_written, 5);
    assert_eq!(stats.latest_samples, 1);

    let frame = ParquetReader::new(
        File::open(root.join("output/node5-6/node5-6_20250421.parquet")).unwrap(),
    )
    .finish()
    .unwrap();
    assert_eq!(frame.height(), 3);

    assert!(root.join("output/node5-6/node5-6_20250420.csv").exists());
    assert!(root.join("latest.xlsx").exists());
    assert!(pipeline.ledger().is_processed(&yesterday));
    assert!(!pipeline.ledger().is_processed(&today));

    let history: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(config.ledger_path()).unwrap(),
    )
    .unwrap();
    assert_eq!(
        history["preprocessed_file_path"][0]["file_name"],
        "LG07_node5-6_20250420.csv"
    );

    assert_eq!(pipeline.plan().unwrap(), vec![today]);
}

#[test]
fn test_invalid_range_rejected() {
    assert!(matches!(
        generate_columns(0, 3),
        Err(WsnError::InvalidRange { start: 0, end: 3 })
    ));
    assert!(matches!(
        generate_columns(9999, 10000),
        Err(WsnError::InvalidRange { .. })
    ));
    assert_eq!(generate_columns(9999, 9999).unwrap().len(), 61);
    assert_eq!(generate_columns(1, 2).unwrap().len(), 121);
}
