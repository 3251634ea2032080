//! Raw logger dump decoding.
//!
//! A dump is Shift_JIS text: two metadata lines, one header row and the
//! data rows. The header row is only consulted for its width and for the
//! names of any drift columns; cells are otherwise addressed by the
//! generated schema.

use crate::constants::{MISSING_VALUE_MARKERS, SOURCE_METADATA_LINES};
use crate::error::{Result, WsnError};
use crate::models::NodeRange;
use crate::schema::{columns_for_range, extend_for_drift};
use encoding_rs::SHIFT_JIS;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Decoded rows of one source file, keyed by generated column names
#[derive(Debug, Clone)]
pub struct RawFile {
    path: PathBuf,
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl RawFile {
    /// Read and decode a dump for the node range of its directory
    pub fn read(path: &Path, range: &NodeRange) -> Result<Self> {
        let bytes = fs::read(path)?;
        let text = decode_legacy(&bytes, path);
        Self::parse(path, &text, range)
    }

    /// Parse already decoded text
    pub fn parse(path: &Path, text: &str, range: &NodeRange) -> Result<Self> {
        let body = skip_lines(text, SOURCE_METADATA_LINES).ok_or_else(|| {
            WsnError::InvalidSourceFile {
                path: path.to_path_buf(),
                reason: format!(
                    "expected {} metadata lines followed by a header row",
                    SOURCE_METADATA_LINES
                ),
            }
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(body.as_bytes());

        let physical: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut columns = columns_for_range(range);
        if physical.len() < columns.len() {
            return Err(WsnError::SchemaMismatch {
                path: path.to_path_buf(),
                expected: columns.len(),
                found: physical.len(),
            });
        }
        if physical.len() > columns.len() {
            warn!(
                "{}: {} trailing columns beyond the node {} schema kept as-is",
                path.display(),
                physical.len() - columns.len(),
                range
            );
        }
        extend_for_drift(&mut columns, &physical);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        debug!(
            "Decoded {}: {} columns, {} data rows",
            path.display(),
            columns.len(),
            rows.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            columns,
            index,
            rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Position of a named column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Cell text, or `None` when the cell is empty or a missing marker
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        let value = self.rows.get(row)?.get(column)?.trim();
        if value.is_empty() || MISSING_VALUE_MARKERS.contains(&value) {
            None
        } else {
            Some(value)
        }
    }

    /// All cells of a named column, top to bottom
    pub fn column_cells(&self, name: &str) -> Vec<Option<&str>> {
        match self.column_index(name) {
            Some(column) => (0..self.rows.len())
                .map(|row| self.cell(row, column))
                .collect(),
            None => vec![None; self.rows.len()],
        }
    }
}

/// Decode the fixed legacy encoding of logger output.
///
/// Undecodable bytes become U+FFFD; the file is still processed.
pub fn decode_legacy<'a>(bytes: &'a [u8], path: &Path) -> Cow<'a, str> {
    let (text, _, had_errors) = SHIFT_JIS.decode(bytes);
    if had_errors {
        warn!("{}: invalid Shift_JIS sequences replaced", path.display());
    }
    text
}

/// Decode text that may be UTF-8 (with or without BOM) or Shift_JIS
pub fn decode_text<'a>(bytes: &'a [u8], path: &Path) -> Cow<'a, str> {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => decode_legacy(bytes, path),
    }
}

fn skip_lines(text: &str, count: usize) -> Option<&str> {
    let mut rest = text;
    for _ in 0..count {
        let newline = rest.find('\n')?;
        rest = &rest[newline + 1..];
    }
    if rest.trim().is_empty() { None } else { Some(rest) }
}
