//! File System Backend
//!
//! One file per entry below a cache root, written atomically and sharded by
//! the md5 digest of the physical key.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── 3f/                      directory_level = 2
//! │   └── a9/
//! │       ├── 3fa9…e1.cache    "{expiry}\n{payload}"
//! │       └── .swap-XXXX.tmp   staged write (renamed into place)
//! └── 7c/
//!     └── 02/
//!         └── 7c02…4b.cache
//! ```
//!
//! Expired entries are never removed on access; they stay on disk until
//! overwritten, deleted or flushed.

mod backend;
mod codec;
mod layout;
mod store;
mod walk;

pub use backend::{FileBackend, FileCache, FileCacheConfig, LiteralFileCache};
pub use codec::{EntryCodec, LiteralCodec, TextCodec};
pub use layout::{ShardLayout, DIGEST_HEX_LEN, MAX_DIRECTORY_LEVEL};
pub use store::{
    free_space, is_swap_file, is_writable, AtomicFileStore, Permissions, StagedWrite, MAX_UMASK,
    SWAP_PREFIX, SWAP_SUFFIX,
};
pub use walk::{walk, WalkRecord};
