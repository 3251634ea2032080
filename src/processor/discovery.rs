//! File discovery module for logger output
//!
//! Handles finding the node-range directories under the logging root, the
//! node range each one serves, and the source files inside them.
//!
//! Logger output follows this structure:
//! ```text
//! LoggingLog/
//!   node1-17/
//!     LG01_node1-17_20250420.csv
//!     LG01_node1-17_20250421.csv
//!   node18-34/
//!     LG02_node18-34_20250421.csv
//! ```

use crate::constants::NODE_DIR_PREFIX;
use crate::error::{Result, WsnError};
use crate::models::NodeRange;
use glob::{MatchOptions, Pattern};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;
use walkdir::WalkDir;

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"node(\d+)-(\d+)").expect("valid node range regex"))
}

/// Directories directly under `root` whose name starts with `node`, sorted
pub fn list_node_directories(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(WsnError::DirectoryNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut directories = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry
            .file_name()
            .to_string_lossy()
            .starts_with(NODE_DIR_PREFIX)
        {
            directories.push(entry.into_path());
        }
    }

    debug!(
        "Found {} node directories under {}",
        directories.len(),
        root.display()
    );
    Ok(directories)
}

/// Node range named by the first `node<start>-<end>` in `path`
pub fn extract_range(path: &Path) -> Result<NodeRange> {
    let text = path.to_string_lossy();
    let unparsable = || WsnError::UnparsableRange {
        path: path.to_path_buf(),
    };

    let captures = range_pattern().captures(&text).ok_or_else(unparsable)?;
    let start: u32 = captures[1].parse().map_err(|_| unparsable())?;
    let end: u32 = captures[2].parse().map_err(|_| unparsable())?;

    NodeRange::new(start, end)
}

/// Regular files in `directory` matching `pattern` (case-insensitive), sorted
pub fn list_source_files(directory: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = Pattern::new(pattern).map_err(|e| {
        WsnError::configuration(format!("Invalid source file pattern {:?}: {}", pattern, e))
    })?;
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if pattern.matches_with(&entry.file_name().to_string_lossy(), options) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}
