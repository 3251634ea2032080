//! Persistent record of already transformed source files.
//!
//! The ledger is a small JSON document rewritten in full on every update.
//! Reads fail open: a missing or corrupt store means "not processed", so a
//! damaged ledger costs a re-transform rather than a stalled pipeline, and
//! the next write replaces it with a valid document.

use crate::constants::LEDGER_ROOT_KEY;
use crate::error::{Result, WsnError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// One processed source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEntry {
    pub file_name: String,
    pub file_path: String,
}

impl ProcessedEntry {
    pub fn for_path(path: &Path) -> Self {
        Self {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
            file_path: ledger_key(path),
        }
    }
}

/// On-disk form of the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDocument {
    #[serde(rename = "preprocessed_file_path")]
    pub entries: Vec<ProcessedEntry>,
}

impl LedgerDocument {
    pub fn contains(&self, file_path: &str) -> bool {
        self.entries.iter().any(|entry| entry.file_path == file_path)
    }
}

/// Ledger of processed files backed by a JSON store
#[derive(Debug, Clone)]
pub struct ProcessedFileLedger {
    store_path: PathBuf,
}

impl ProcessedFileLedger {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
        }
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Whether `path` has been recorded. Never fails.
    pub fn is_processed(&self, path: &Path) -> bool {
        match self.load() {
            Ok(Some(document)) => document.contains(&ledger_key(path)),
            Ok(None) => false,
            Err(e) => {
                warn!(
                    "Ledger {} unreadable, treating {} as unprocessed: {}",
                    self.store_path.display(),
                    path.display(),
                    e
                );
                false
            }
        }
    }

    /// Record `path` and persist the whole ledger.
    ///
    /// A missing or corrupt store is replaced by a fresh document.
    pub fn mark_processed(&self, path: &Path) -> Result<()> {
        let mut document = match self.load() {
            Ok(Some(document)) => document,
            Ok(None) => LedgerDocument::default(),
            Err(e) => {
                warn!(
                    "Ledger {} corrupt, rebuilding it: {}",
                    self.store_path.display(),
                    e
                );
                LedgerDocument::default()
            }
        };

        let entry = ProcessedEntry::for_path(path);
        if document.contains(&entry.file_path) {
            debug!("{} already recorded", entry.file_path);
            return Ok(());
        }
        document.entries.push(entry);
        self.save(&document)
    }

    /// Current entries, tolerating a missing or corrupt store
    pub fn entries(&self) -> Vec<ProcessedEntry> {
        match self.load() {
            Ok(Some(document)) => document.entries,
            _ => Vec::new(),
        }
    }

    /// Rewrite recorded paths that start with `from_prefix` to start with
    /// `to_prefix`, saving to `output` (or in place). Returns the number of
    /// rewritten entries.
    pub fn rebase(&self, from_prefix: &str, to_prefix: &str, output: Option<&Path>) -> Result<usize> {
        let mut document = self.load()?.ok_or_else(|| {
            WsnError::configuration(format!(
                "Ledger not found: {}",
                self.store_path.display()
            ))
        })?;

        let mut rewritten = 0;
        for entry in &mut document.entries {
            if let Some(rest) = entry.file_path.strip_prefix(from_prefix) {
                entry.file_path = format!("{}{}", to_prefix, rest);
                rewritten += 1;
            }
        }

        let target = output.unwrap_or(&self.store_path);
        write_document(target, &document)?;
        info!(
            "Rebased {} of {} ledger entries into {}",
            rewritten,
            document.entries.len(),
            target.display()
        );
        Ok(rewritten)
    }

    fn load(&self) -> Result<Option<LedgerDocument>> {
        if !self.store_path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.store_path)?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        if value.get(LEDGER_ROOT_KEY).is_none() {
            return Ok(Some(LedgerDocument::default()));
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    fn save(&self, document: &LedgerDocument) -> Result<()> {
        write_document(&self.store_path, document)
    }
}

/// Identity of a source file in the ledger
pub fn ledger_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn write_document(target: &Path, document: &LedgerDocument) -> Result<()> {
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    document.serialize(&mut serializer)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(&buffer)?;
    temp.persist(target).map_err(|e| WsnError::Io(e.error))?;
    Ok(())
}
