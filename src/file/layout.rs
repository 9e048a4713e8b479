//! Sharded Directory Layout
//!
//! Maps a physical key to `root/ab/cd/<md5-hex><ext>`: the key's md5 digest
//! in lowercase hex, preceded by `directory_level` nested directories named
//! after successive two-character slices of that digest. Each level is a
//! 256-way fan-out.

use std::path::{Path, PathBuf};

/// Hex characters in an md5 digest
pub const DIGEST_HEX_LEN: usize = 32;

/// Deepest supported nesting (one level per digest byte)
pub const MAX_DIRECTORY_LEVEL: usize = DIGEST_HEX_LEN / 2;

/// Path derivation for cache files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardLayout {
    root: PathBuf,
    directory_level: usize,
    extension: String,
}

impl ShardLayout {
    /// Create a layout; callers validate `directory_level` and `extension`
    pub fn new(root: impl Into<PathBuf>, directory_level: usize, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            directory_level: directory_level.min(MAX_DIRECTORY_LEVEL),
            extension: extension.into(),
        }
    }

    /// md5 digest of a key as lowercase hex
    pub fn digest(key: &str) -> String {
        format!("{:x}", md5::compute(key.as_bytes()))
    }

    /// File path for a physical key
    pub fn path_for(&self, key: &str) -> PathBuf {
        let hash = Self::digest(key);

        let mut path = self.root.clone();
        for level in 0..self.directory_level {
            path.push(&hash[level * 2..level * 2 + 2]);
        }
        path.push(format!("{hash}{}", self.extension));
        path
    }

    /// Whether a file name belongs to this layout's entries
    pub fn is_entry_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.len() > self.extension.len() && name.ends_with(&self.extension))
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of nested shard directories
    pub fn directory_level(&self) -> usize {
        self.directory_level
    }

    /// Entry file extension, including the leading dot
    pub fn extension(&self) -> &str {
        &self.extension
    }
}
