//! Cache Entry Types
//!
//! Payload plus expiry metadata, shared by every backend that has to track
//! expiry itself (file stores, the shared memory store).

use std::fmt;

use bytes::Bytes;

/// ttl value meaning "never expires"
pub const NO_EXPIRY: u64 = 0;

/// Current Unix time in whole seconds
#[inline]
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// When an entry stops being visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiry {
    /// Entry lives until overwritten, deleted or evicted by the backing store
    Never,
    /// Absolute Unix timestamp (seconds)
    At(i64),
}

impl Expiry {
    /// Convert a relative ttl in seconds into an absolute expiry
    pub fn from_ttl(ttl: u64, now: i64) -> Self {
        if ttl == NO_EXPIRY {
            return Expiry::Never;
        }
        let ttl = i64::try_from(ttl).unwrap_or(i64::MAX);
        Expiry::At(now.saturating_add(ttl))
    }

    /// Decode the on-disk marker (`0` = never)
    pub fn from_marker(marker: i64) -> Self {
        if marker == 0 {
            Expiry::Never
        } else {
            Expiry::At(marker)
        }
    }

    /// Encode as the on-disk marker (`0` = never)
    pub fn marker(&self) -> i64 {
        match self {
            Expiry::Never => 0,
            Expiry::At(ts) => *ts,
        }
    }

    /// Check expiry against a point in time
    #[inline]
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(ts) => *ts < now,
        }
    }

    /// Check expiry against the wall clock
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }
}

impl Default for Expiry {
    fn default() -> Self {
        Expiry::Never
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiry::Never => write!(f, "never"),
            Expiry::At(ts) => write!(f, "at {}", ts),
        }
    }
}

/// Stored payload together with its expiry
#[derive(Clone, PartialEq, Eq)]
pub struct Entry {
    /// Expiry descriptor
    pub expiry: Expiry,
    /// Serialized payload (owned, never aliases caller memory)
    pub payload: Bytes,
}

impl Entry {
    /// Create an entry that never expires
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            expiry: Expiry::Never,
            payload: payload.into(),
        }
    }

    /// Create an entry expiring `ttl` seconds after `now`
    pub fn with_ttl(payload: impl Into<Bytes>, ttl: u64, now: i64) -> Self {
        Self {
            expiry: Expiry::from_ttl(ttl, now),
            payload: payload.into(),
        }
    }

    /// Payload size in bytes
    #[inline]
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Check if the entry is logically gone at `now`
    #[inline]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiry.is_expired_at(now)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("expiry", &self.expiry)
            .field("size", &self.size())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
