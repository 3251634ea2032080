//! Staging mirror of a logging share.
//!
//! Recreates the `node*` directory layout of a source share under a local
//! root and copies the dumps dated inside a window, so a run can be tried
//! against a snapshot instead of the live share.

use crate::constants::DATE_TOKEN_FORMAT;
use crate::error::Result;
use crate::processor::discovery::{list_node_directories, list_source_files};
use crate::processor::transform::date_token;
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Counts from one mirror pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub directories_created: usize,
    pub directories_existing: usize,
    pub files_copied: usize,
    pub files_out_of_window: usize,
    pub files_unparsable: usize,
}

/// Mirror `source_root` into `dest_root`, copying files dated within
/// `since..=until`. Existing destination files are overwritten.
pub fn mirror(
    source_root: &Path,
    dest_root: &Path,
    since: NaiveDate,
    until: NaiveDate,
    pattern: &str,
) -> Result<MirrorStats> {
    let mut stats = MirrorStats::default();
    let directories = list_node_directories(source_root)?;

    for source_dir in &directories {
        let Some(name) = source_dir.file_name() else {
            continue;
        };
        let dest_dir = dest_root.join(name);
        if dest_dir.is_dir() {
            stats.directories_existing += 1;
        } else {
            fs::create_dir_all(&dest_dir)?;
            debug!("Created {}", dest_dir.display());
            stats.directories_created += 1;
        }

        for file in list_source_files(source_dir, pattern)? {
            let Some(file_name) = file.file_name() else {
                continue;
            };
            let token = date_token(&file_name.to_string_lossy());
            let Ok(date) = NaiveDate::parse_from_str(&token, DATE_TOKEN_FORMAT) else {
                warn!("Skipped {}: no date in file name", file.display());
                stats.files_unparsable += 1;
                continue;
            };
            if date < since || date > until {
                stats.files_out_of_window += 1;
                continue;
            }

            let target = dest_dir.join(file_name);
            fs::copy(&file, &target)?;
            debug!("Copied {} -> {}", file.display(), target.display());
            stats.files_copied += 1;
        }
    }

    info!(
        "Mirrored {} node directories ({} new), {} files copied",
        directories.len(),
        stats.directories_created,
        stats.files_copied
    );
    Ok(stats)
}
