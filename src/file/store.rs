//! Atomic File Store
//!
//! Crash-safe single-file reads and writes below a cache root.
//!
//! # Write protocol
//!
//! ```text
//! create parent dirs ──▶ stage .swap-XXXX.tmp in the same dir ──▶ write body
//!        ──▶ (fsync) ──▶ chmod ──▶ rename onto final path
//! ```
//!
//! The rename is the only step readers can observe, so a reader sees either
//! the previous file or the complete new one. If anything fails before the
//! rename, the staged file is removed and the previous content is untouched.
//! Concurrent writers to the same key race on the rename; the last one wins.
//!
//! There is no locking beyond this: reads never block writes and nothing is
//! coordinated across keys.

use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::codec::EntryCodec;
use super::layout::ShardLayout;
use super::walk::walk;
use crate::cache::Entry;
use crate::error::{Error, Result};

/// Prefix of staged (not yet renamed) files
pub const SWAP_PREFIX: &str = ".swap-";

/// Suffix of staged (not yet renamed) files
pub const SWAP_SUFFIX: &str = ".tmp";

/// Largest accepted umask
pub const MAX_UMASK: u32 = 0o777;

/// Permission bits derived from a umask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    umask: u32,
}

impl Permissions {
    /// Validate and wrap a umask
    pub fn from_umask(umask: u32) -> Result<Self> {
        if umask > MAX_UMASK {
            return Err(Error::Config(format!(
                "umask {umask:#o} is out of range (max {MAX_UMASK:#o})"
            )));
        }
        Ok(Self { umask })
    }

    /// Mode for created directories
    pub fn dir_mode(&self) -> u32 {
        0o777 & !self.umask
    }

    /// Mode for entry files
    pub fn file_mode(&self) -> u32 {
        0o666 & !self.umask
    }

    /// Create `dir` and its missing parents with [`Self::dir_mode`]
    pub fn create_dir_all(&self, dir: &Path) -> std::io::Result<()> {
        if dir.is_dir() {
            return Ok(());
        }
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(self.dir_mode());
        }
        builder.create(dir)
    }

    fn apply_to(&self, file: &File) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(self.file_mode()))?;
        }
        #[cfg(not(unix))]
        let _ = file;
        Ok(())
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self { umask: 0o002 }
    }
}

/// A fully written file waiting to be renamed into place.
///
/// Dropping it without calling [`StagedWrite::commit`] deletes the staged
/// file and leaves the target as it was.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    /// Path of the staged file
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Final destination
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically rename the staged file onto its target
    pub fn commit(self) -> Result<()> {
        let target = self.target;
        self.temp.persist(&target).map_err(|e| {
            warn!(path = %target.display(), error = %e.error, "rename into place failed");
            // Dropping `e.file` removes the staged file
            Error::Io(e.error)
        })?;
        Ok(())
    }
}

/// Crash-safe entry storage below a cache root
#[derive(Debug)]
pub struct AtomicFileStore<C: EntryCodec> {
    layout: ShardLayout,
    codec: C,
    permissions: Permissions,
    sync_writes: bool,
}

impl<C: EntryCodec> AtomicFileStore<C> {
    /// Create a store over an existing, writable root
    pub fn new(layout: ShardLayout, codec: C, permissions: Permissions, sync_writes: bool) -> Self {
        Self {
            layout,
            codec,
            permissions,
            sync_writes,
        }
    }

    /// Path layout
    pub fn layout(&self) -> &ShardLayout {
        &self.layout
    }

    /// Entry codec
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// File path for a physical key
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.layout.path_for(key)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Encode and stage an entry next to `path` without publishing it
    pub fn stage(&self, path: &Path, entry: &Entry) -> Result<StagedWrite> {
        // Encoding first: an unsupported payload must not touch the disk
        let body = self.codec.encode(entry)?;

        let parent = path
            .parent()
            .ok_or_else(|| Error::Config(format!("{} has no parent directory", path.display())))?;
        self.permissions.create_dir_all(parent)?;

        let mut temp = tempfile::Builder::new()
            .prefix(SWAP_PREFIX)
            .suffix(SWAP_SUFFIX)
            .tempfile_in(parent)?;

        temp.write_all(&body)?;
        temp.flush()?;
        if self.sync_writes {
            temp.as_file().sync_all()?;
        }
        self.permissions.apply_to(temp.as_file())?;

        Ok(StagedWrite {
            temp,
            target: path.to_path_buf(),
        })
    }

    /// Write an entry atomically
    pub fn write(&self, path: &Path, entry: &Entry) -> Result<()> {
        self.stage(path, entry)?.commit()?;
        debug!(path = %path.display(), expiry = %entry.expiry, size = entry.size(), "entry written");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn open(&self, path: &Path) -> Result<Option<BufReader<File>>> {
        match File::open(path) {
            Ok(file) => Ok(Some(BufReader::new(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a live entry; expired entries are misses and stay on disk
    pub fn read(&self, path: &Path, now: i64) -> Result<Option<Entry>> {
        let Some(mut reader) = self.open(path)? else {
            return Ok(None);
        };

        match self.codec.decode(path, &mut reader) {
            Ok(entry) if entry.is_expired_at(now) => Ok(None),
            Ok(entry) => Ok(Some(entry)),
            Err(Error::CorruptEntry { path, reason }) => {
                warn!(path = %path.display(), %reason, "ignoring corrupt cache entry");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Check for a live entry without necessarily reading its payload
    pub fn exists(&self, path: &Path, now: i64) -> Result<bool> {
        let Some(mut reader) = self.open(path)? else {
            return Ok(false);
        };

        match self.codec.decode_expiry(path, &mut reader) {
            Ok(expiry) => Ok(!expiry.is_expired_at(now)),
            Err(Error::CorruptEntry { path, reason }) => {
                warn!(path = %path.display(), %reason, "ignoring corrupt cache entry");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove a file; succeeds when the file is absent afterwards
    pub fn delete(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(_) if !path.exists() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every entry file, leftover staged files and emptied directories
    pub fn flush(&self) -> Result<()> {
        let mut remaining = 0usize;
        let mut removed = 0usize;

        for record in walk(self.layout.root()) {
            if record.is_dir {
                // Non-empty or already gone: leave it
                let _ = fs::remove_dir(&record.path);
                continue;
            }

            if !self.layout.is_entry_file(&record.path) && !is_swap_file(&record.path) {
                continue;
            }

            match fs::remove_file(&record.path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %record.path.display(), error = %e, "failed to remove cache file");
                    remaining += 1;
                }
            }
        }

        debug!(root = %self.layout.root().display(), removed, remaining, "flush finished");
        if remaining > 0 {
            return Err(Error::FlushIncomplete { remaining });
        }
        Ok(())
    }

    // =========================================================================
    // Accounting
    // =========================================================================

    /// Total size of entry files in bytes
    pub fn usage(&self) -> u64 {
        walk(self.layout.root())
            .filter(|record| !record.is_dir && self.layout.is_entry_file(&record.path))
            .map(|record| record.size)
            .sum()
    }

    /// Number of entry files on disk, including expired and orphaned ones
    pub fn file_count(&self) -> usize {
        walk(self.layout.root())
            .filter(|record| !record.is_dir && self.layout.is_entry_file(&record.path))
            .count()
    }

    /// Free bytes on the file system holding the root
    pub fn available(&self) -> Option<u64> {
        free_space(self.layout.root())
    }
}

/// Whether a path is a staged write left behind by this store
pub fn is_swap_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(SWAP_PREFIX) && name.ends_with(SWAP_SUFFIX))
}

/// Whether the current process may create files in `dir`
pub fn is_writable(dir: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let Ok(c_path) = CString::new(dir.as_os_str().as_bytes()) else {
            return false;
        };
        // SAFETY: c_path is a valid NUL-terminated string for the duration of the call
        unsafe { libc::access(c_path.as_ptr(), libc::W_OK | libc::X_OK) == 0 }
    }
    #[cfg(not(unix))]
    {
        fs::metadata(dir)
            .map(|meta| !meta.permissions().readonly())
            .unwrap_or(false)
    }
}

/// Bytes available to unprivileged users on the file system holding `path`
#[allow(clippy::unnecessary_cast)]
pub fn free_space(path: &Path) -> Option<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
        // SAFETY: statvfs is plain old data; zeroed is a valid initial state
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        // SAFETY: c_path is NUL-terminated and stat points to writable memory
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return None;
        }
        Some((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        None
    }
}

// =============================================================================
// Tests
// =============================================================================
