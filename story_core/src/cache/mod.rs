//! Smart Cache - adaptive LRU cache of derived content.
//!
//! The cache owns its [`DependencyTracker`]. Every path that removes an
//! entry (LRU eviction, memory pressure, shrinking, invalidation, explicit
//! removal) goes through one place that drops the value and its dependency
//! bindings together, so the two can never disagree.
//!
//! Capacity adapts to the observed hit rate:
//! 1. **Window**: count hits and misses over `adapt_interval` operations
//! 2. **Grow**: hit rate below target with memory to spare, capacity x1.2
//! 3. **Shrink**: hit rate comfortably above target under memory pressure,
//!    capacity x0.9 and the excess is evicted immediately

mod size;
mod stats;

pub use size::EstimateSize;
pub use stats::CacheStats;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use story_expr::{DependencyRecorder, Value};

use crate::tracker::DependencyTracker;
use stats::Window;

/// Memory usage ratio below which the cache is allowed to grow, and at or
/// above which it may shrink.
const MEMORY_PRESSURE: f64 = 0.8;

/// How far above the target hit rate counts as comfortably above it.
const HIT_RATE_SLACK: f64 = 0.1;

const GROW_FACTOR: f64 = 1.2;
const SHRINK_FACTOR: f64 = 0.9;

/// Configuration for the smart cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Starting capacity, in entries.
    pub initial_size: usize,

    /// Capacity never shrinks below this.
    pub min_size: usize,

    /// Capacity never grows beyond this.
    pub max_size: usize,

    /// Hit rate the adaptation aims for (0.0-1.0).
    pub target_hit_rate: f64,

    /// Operations between adaptation steps.
    pub adapt_interval: usize,

    /// Estimated byte budget for all entries together.
    pub memory_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            initial_size: 100,
            min_size: 10,
            max_size: 1000,
            target_hit_rate: 0.7,
            adapt_interval: 100,
            memory_limit: 10 * 1024 * 1024,
        }
    }
}

/// A cached value with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub last_accessed: Instant,
    pub access_count: u64,
    pub size_bytes: usize,
}

/// Adaptive LRU cache whose entries are invalidated by state path.
#[derive(Debug)]
pub struct SmartCache<V = Value> {
    config: CacheConfig,

    /// Entries in recency order, least recently used first.
    entries: IndexMap<String, CacheEntry<V>>,

    tracker: DependencyTracker,

    capacity: usize,
    memory_bytes: usize,

    hits: u64,
    misses: u64,
    evictions: u64,
    invalidations: u64,

    window: Window,
}

impl<V: EstimateSize> SmartCache<V> {
    /// Create a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        let min = config.min_size.max(1);
        let capacity = config.initial_size.clamp(min, config.max_size.max(min));
        Self {
            config,
            entries: IndexMap::new(),
            tracker: DependencyTracker::new(),
            capacity,
            memory_bytes: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            invalidations: 0,
            window: Window::default(),
        }
    }

    /// Create a cache with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let hit = match self.entries.get_index_of(key) {
            Some(index) => {
                let last = self.entries.len() - 1;
                self.entries.move_index(index, last);
                if let Some((_, entry)) = self.entries.get_index_mut(last) {
                    entry.last_accessed = Instant::now();
                    entry.access_count += 1;
                }
                self.hits += 1;
                self.window.hits += 1;
                true
            }
            None => {
                self.misses += 1;
                self.window.misses += 1;
                false
            }
        };

        self.tick();

        if hit {
            self.entries.get(key).map(|entry| &entry.value)
        } else {
            None
        }
    }

    /// Store `value` under `key` with no dependencies.
    ///
    /// Bindings left from an earlier computation of `key` are dropped.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        self.tracker.remove_key(&key);
        self.insert_entry(key, value);
        self.tick();
    }

    /// Return the cached value for `key`, or compute it while tracking the
    /// state paths it reads and cache the result.
    ///
    /// A failed computation caches nothing and leaves earlier bindings alone.
    pub fn get_or_compute<E, F>(&mut self, key: &str, compute: F) -> Result<V, E>
    where
        V: Clone,
        F: FnOnce(&mut dyn DependencyRecorder) -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value.clone());
        }

        self.tracker.start_tracking(key);
        match compute(&mut self.tracker) {
            Ok(value) => {
                self.tracker.stop_tracking();
                self.insert_entry(key.to_string(), value.clone());
                self.tick();
                Ok(value)
            }
            Err(err) => {
                self.tracker.abort_tracking();
                Err(err)
            }
        }
    }

    /// Drop every entry that depends on one of the changed paths.
    ///
    /// An empty slice means "anything may have changed" and clears the cache.
    /// Returns the number of entries removed.
    pub fn invalidate<S: AsRef<str>>(&mut self, changed: &[S]) -> usize {
        if changed.is_empty() {
            let removed = self.entries.len();
            self.clear();
            self.invalidations += removed as u64;
            return removed;
        }

        let affected = self.tracker.find_affected_keys(changed);
        let mut removed = 0;
        for key in &affected {
            if self.remove_entry(key).is_some() {
                removed += 1;
            }
            // A key can be bound without an entry if it was computed and
            // then removed some other way; drop the stale bindings too.
            self.tracker.remove_key(key);
        }

        self.invalidations += removed as u64;
        if removed > 0 {
            log::debug!("invalidated {} cache entries", removed);
        }
        removed
    }

    /// Remove one entry and its bindings.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.remove_entry(key).map(|entry| entry.value)
    }

    /// Remove every entry and binding. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.tracker.clear();
        self.memory_bytes = 0;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Inspect an entry without touching its recency.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current capacity, in entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn tracker(&self) -> &DependencyTracker {
        &self.tracker
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            memory_bytes: self.memory_bytes,
            memory_limit: self.config.memory_limit,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            invalidations: self.invalidations,
            hit_rate: stats::hit_rate(self.hits, self.misses),
            tracked_keys: self.tracker.tracked_key_count(),
            dependencies: self.tracker.dependency_count(),
        }
    }

    fn insert_entry(&mut self, key: String, value: V) {
        let size_bytes = value.estimated_size() + key.len();
        let now = Instant::now();

        if let Some(old) = self.entries.shift_remove(&key) {
            self.memory_bytes -= old.size_bytes;
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                last_accessed: now,
                access_count: 0,
                size_bytes,
            },
        );
        self.memory_bytes += size_bytes;

        self.evict_to_fit();
    }

    /// Evict least recently used entries until both limits hold.
    ///
    /// A single entry larger than the memory limit is kept.
    fn evict_to_fit(&mut self) {
        while self.entries.len() > self.capacity
            || (self.memory_bytes > self.config.memory_limit && self.entries.len() > 1)
        {
            let Some(key) = self.entries.keys().next().cloned() else {
                break;
            };
            self.remove_entry(&key);
            self.evictions += 1;
        }
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.shift_remove(key)?;
        self.memory_bytes -= entry.size_bytes;
        self.tracker.remove_key(key);
        Some(entry)
    }

    fn tick(&mut self) {
        self.window.ops += 1;
        if self.window.ops < self.config.adapt_interval.max(1) {
            return;
        }
        let window = std::mem::take(&mut self.window);
        self.adapt(window);
    }

    fn adapt(&mut self, window: Window) {
        let Some(hit_rate) = window.hit_rate() else {
            return;
        };
        let usage = if self.config.memory_limit == 0 {
            1.0
        } else {
            self.memory_bytes as f64 / self.config.memory_limit as f64
        };
        let target = self.config.target_hit_rate;
        let previous = self.capacity;

        if hit_rate < target && usage < MEMORY_PRESSURE {
            let grown = (previous as f64 * GROW_FACTOR).ceil() as usize;
            self.capacity = grown.min(self.config.max_size).max(previous);
        } else if hit_rate > target + HIT_RATE_SLACK && usage >= MEMORY_PRESSURE {
            let shrunk = (previous as f64 * SHRINK_FACTOR).floor() as usize;
            self.capacity = shrunk.max(self.config.min_size).max(1).min(previous);
            self.evict_to_fit();
        }

        if self.capacity != previous {
            log::debug!(
                "cache capacity {} -> {} (hit rate {:.2}, memory {:.0}%)",
                previous,
                self.capacity,
                hit_rate,
                usage * 100.0
            );
        }
    }
}

impl<V: EstimateSize> Default for SmartCache<V> {
    fn default() -> Self {
        Self::with_defaults()
    }
}
