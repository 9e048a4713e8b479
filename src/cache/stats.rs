//! Backend Statistics Snapshot
//!
//! Best-effort view of a backend's counters. Anything a backend cannot
//! report stays `None` instead of being defaulted to zero.

use serde::{Deserialize, Serialize};

/// Point-in-time statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Successful lookups
    pub hits: Option<u64>,
    /// Failed lookups
    pub misses: Option<u64>,
    /// Seconds since the backend started
    pub uptime: Option<u64>,
    /// Bytes currently used
    pub memory_usage: Option<u64>,
    /// Bytes still available
    pub memory_available: Option<u64>,
}

impl CacheStats {
    /// Hit ratio (0.0 - 1.0), `None` unless both counters are known
    pub fn hit_ratio(&self) -> Option<f64> {
        let hits = self.hits? as f64;
        let total = hits + self.misses? as f64;
        if total == 0.0 {
            Some(0.0)
        } else {
            Some(hits / total)
        }
    }
}
