//! Archive expansion into a scoped working directory.

mod locator;

pub use locator::locate_documents;

use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::Path;

use tempfile::TempDir;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::ArchiveError;
use crate::models::ArchiveConfig;

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// An archive expanded to disk.
///
/// Owns the working directory: dropping the value deletes the whole tree,
/// whichever way the run ends.
#[derive(Debug)]
pub struct ExpandedArchive {
    dir: TempDir,
    files: usize,
    bytes: u64,
}

impl ExpandedArchive {
    /// Root of the expanded tree.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Number of files written.
    pub fn file_count(&self) -> usize {
        self.files
    }

    /// Total bytes written.
    pub fn total_bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for ExpandedArchive {
    fn drop(&mut self) {
        debug!("Releasing working directory {}", self.dir.path().display());
    }
}

/// Expand a zip archive held in memory into a fresh temporary directory.
///
/// Relative paths are preserved. Entries whose names escape the root
/// (absolute paths, `..`) are skipped.
pub fn expand(data: &[u8], config: &ArchiveConfig) -> Result<ExpandedArchive> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    if archive.len() > config.max_entries {
        return Err(ArchiveError::Limit(format!(
            "{} entries, at most {} allowed",
            archive.len(),
            config.max_entries
        )));
    }

    let mut builder = tempfile::Builder::new();
    builder.prefix("regtrib-");
    let dir = match &config.work_dir {
        Some(parent) => builder.tempdir_in(parent)?,
        None => builder.tempdir()?,
    };
    let mut files = 0;
    let mut written: u64 = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe archive entry: {}", entry.name());
            continue;
        };
        let target = dir.path().join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        // Budget applies to inflated bytes, not declared sizes.
        let budget = config.max_total_bytes.saturating_sub(written);
        let mut out = File::create(&target)?;
        let copied = std::io::copy(&mut (&mut entry).take(budget.saturating_add(1)), &mut out)?;
        written += copied;

        if written > config.max_total_bytes {
            return Err(ArchiveError::Limit(format!(
                "more than {} uncompressed bytes",
                config.max_total_bytes
            )));
        }

        files += 1;
    }

    debug!(
        "Expanded {} files ({} bytes) into {}",
        files,
        written,
        dir.path().display()
    );

    Ok(ExpandedArchive {
        dir,
        files,
        bytes: written,
    })
}
