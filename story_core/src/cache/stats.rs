//! Cache counters and the adaptation window.

use serde::Serialize;

/// Point-in-time view of the cache, for debugging and tuning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub memory_bytes: usize,
    pub memory_limit: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
    /// Lifetime hit rate, 0.0 when nothing has been looked up yet.
    pub hit_rate: f64,
    /// Tracked keys and bound paths in the dependency tracker.
    pub tracked_keys: usize,
    pub dependencies: usize,
}

/// Lookups since the last adaptation.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Window {
    pub ops: usize,
    pub hits: u64,
    pub misses: u64,
}

impl Window {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> Option<f64> {
        let lookups = self.lookups();
        (lookups > 0).then(|| self.hits as f64 / lookups as f64)
    }
}

pub(crate) fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
