//! Cache Directory Walk
//!
//! Depth-first traversal of a cache root that yields children before their
//! parents, so directories can be removed right after their contents. Every
//! call walks from scratch. Entries that vanish mid-walk (another process
//! flushing or deleting) are skipped silently.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// One file or directory seen during a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkRecord {
    pub path: PathBuf,
    pub is_dir: bool,
    /// File size in bytes (0 for directories)
    pub size: u64,
}

/// Lazily walk everything below `root`, children first. `root` itself is not
/// yielded.
pub fn walk(root: &Path) -> impl Iterator<Item = WalkRecord> {
    WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .follow_links(false)
        .into_iter()
        .filter_map(|item| {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    if !is_vanished(&e) {
                        debug!(error = %e, "skipping unreadable cache path");
                    }
                    return None;
                }
            };

            let is_dir = entry.file_type().is_dir();
            let size = if is_dir {
                0
            } else {
                match entry.metadata() {
                    Ok(meta) => meta.len(),
                    Err(e) => {
                        if !is_vanished(&e) {
                            debug!(path = %entry.path().display(), error = %e, "skipping unreadable cache file");
                        }
                        return None;
                    }
                }
            };

            Some(WalkRecord {
                path: entry.into_path(),
                is_dir,
                size,
            })
        })
}

fn is_vanished(error: &walkdir::Error) -> bool {
    error
        .io_error()
        .is_some_and(|io| io.kind() == ErrorKind::NotFound)
}
