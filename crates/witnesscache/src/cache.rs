//! PrecomputeCache: two-tier write-back LRU cache for witness data
//!
//! The hot tier is a bounded recency list. Overflowing it moves the least
//! recently used entry into the dirty tier, which is only emptied by a flush
//! or by promoting an entry back on read.

use std::collections::HashMap;

use ahash::RandomState;
use precomputedb::Hash256;
use tracing::{debug, trace, warn};

use crate::config::{CacheConfig, DEFAULT_CAPACITY};
use crate::lru::RecencyList;
use crate::stats::CacheStats;
use crate::writer::{FlushSummary, WitnessWriter};

/// Write-back cache of precomputed witness values keyed by 256-bit hash
///
/// Not internally synchronized; callers serialize access.
pub struct PrecomputeCache<V> {
    /// Hot entries, most recently used first
    entries: RecencyList<Hash256, V>,

    /// Hot index: key -> handle into `entries`
    hot: HashMap<Hash256, usize, RandomState>,

    /// Evicted entries not yet written to the store
    dirty: HashMap<Hash256, V, RandomState>,

    /// Cache statistics
    stats: CacheStats,

    /// Hot tier capacity
    capacity: usize,
}

impl<V: Clone> Default for PrecomputeCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> PrecomputeCache<V> {
    /// Create an empty cache with [`DEFAULT_CAPACITY`]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty cache holding at most `capacity` hot entries
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");

        Self {
            entries: RecencyList::with_capacity(capacity + 1),
            hot: HashMap::with_capacity_and_hasher(capacity + 1, RandomState::new()),
            dirty: HashMap::with_hasher(RandomState::new()),
            stats: CacheStats::new(),
            capacity,
        }
    }

    /// Create an empty cache from configuration
    ///
    /// Panics on a zero capacity, which [`CacheConfig::from_json`] rejects.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_capacity(config.capacity)
    }

    /// Drop every entry from both tiers and reset statistics
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hot.clear();
        self.dirty.clear();
        self.stats.reset();
    }

    /// Number of hot-tier entries
    pub fn size(&self) -> usize {
        self.hot.len()
    }

    /// Number of dirty-tier entries
    pub fn dirty_size(&self) -> usize {
        self.dirty.len()
    }

    /// Hot tier capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True when both tiers are empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.dirty.is_empty()
    }

    /// Check whether `key` is cached in either tier
    pub fn contains(&self, key: &Hash256) -> bool {
        self.hot.contains_key(key) || self.dirty.contains_key(key)
    }

    /// Check whether `key` is in the hot tier
    pub fn contains_hot(&self, key: &Hash256) -> bool {
        self.hot.contains_key(key)
    }

    /// Check whether `key` is in the dirty tier
    pub fn contains_dirty(&self, key: &Hash256) -> bool {
        self.dirty.contains_key(key)
    }

    /// Hot-tier keys, most recently used first
    pub fn keys(&self) -> impl Iterator<Item = &Hash256> + '_ {
        self.entries.iter().map(|(key, _)| key)
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Look up a witness, promoting it to most recently used
    ///
    /// A dirty entry is moved back into the hot tier first, which may evict
    /// the current hot tail into the dirty tier.
    ///
    /// # Returns
    /// * `Option<V>` - A copy of the cached value, `None` on a miss
    pub fn get(&mut self, key: &Hash256) -> Option<V> {
        if let Some(value) = self.dirty.remove(key) {
            trace!(key = %key, "Promoting witness from dirty tier");
            self.stats.record_promotion();
            self.insert_hot(*key, value);
        }

        match self.hot.get(key) {
            Some(&idx) => {
                self.entries.move_to_front(idx);
                self.stats.record_hit();
                self.entries.get(idx).cloned()
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Insert or overwrite a witness at the most recently used position
    pub fn put(&mut self, key: Hash256, value: V) {
        self.stats.record_insert();
        self.insert_hot(key, value);
    }

    /// Remove `key` from both tiers
    ///
    /// # Returns
    /// * `Option<V>` - The removed value, if the key was cached
    pub fn remove(&mut self, key: &Hash256) -> Option<V> {
        let hot = self
            .hot
            .remove(key)
            .and_then(|idx| self.entries.remove(idx))
            .map(|(_, value)| value);
        let dirty = self.dirty.remove(key);

        debug_assert!(hot.is_none() || dirty.is_none(), "key {} cached in both tiers", key);
        hot.or(dirty)
    }

    /// Write every cached entry to `store`
    ///
    /// Dirty entries are written first and dropped from the dirty tier as
    /// each write succeeds. Hot entries are then written and stay cached, so
    /// they are written again on every flush.
    ///
    /// On a failed write the error is returned immediately: dirty entries
    /// already written stay removed, the failing and unwritten ones stay
    /// dirty, and the hot pass is skipped if the dirty pass failed.
    ///
    /// After both passes succeed the store is synced through
    /// [`WitnessWriter::sync`], so `Ok` means every entry is durable.
    pub fn flush<W>(&mut self, store: &mut W) -> Result<FlushSummary, W::Error>
    where
        W: WitnessWriter<V>,
    {
        let mut summary = FlushSummary::default();
        let mut failure = None;

        self.dirty.retain(|key, value| {
            if failure.is_some() {
                return true;
            }
            match store.write(key, value) {
                Ok(()) => {
                    summary.dirty_written += 1;
                    false
                }
                Err(err) => {
                    failure = Some(err);
                    true
                }
            }
        });
        self.stats.record_flushed(summary.dirty_written);

        if let Some(err) = failure {
            warn!(
                written = summary.dirty_written,
                remaining = self.dirty.len(),
                "Flush failed while draining dirty tier"
            );
            return Err(err);
        }

        for (key, value) in self.entries.iter() {
            if let Err(err) = store.write(key, value) {
                self.stats.record_flushed(summary.hot_written);
                warn!(
                    written = summary.hot_written,
                    hot = self.hot.len(),
                    "Flush failed while writing hot tier"
                );
                return Err(err);
            }
            summary.hot_written += 1;
        }
        self.stats.record_flushed(summary.hot_written);

        store.sync()?;

        debug!(
            dirty = summary.dirty_written,
            hot = summary.hot_written,
            "Flushed witness cache"
        );
        Ok(summary)
    }

    /// Single entry point into the hot tier; keeps the tiers disjoint
    fn insert_hot(&mut self, key: Hash256, value: V) {
        if let Some(&idx) = self.hot.get(&key) {
            self.entries.move_to_front(idx);
            if let Some(slot) = self.entries.get_mut(idx) {
                *slot = value;
            }
        } else {
            let idx = self.entries.push_front(key, value);
            self.hot.insert(key, idx);
        }

        self.dirty.remove(&key);
        self.evict_if_full();

        debug_assert_eq!(self.hot.len(), self.entries.len());
        debug_assert!(self.hot.len() <= self.capacity);
        debug_assert!(!self.dirty.contains_key(&key));
    }

    fn evict_if_full(&mut self) {
        if self.hot.len() <= self.capacity {
            return;
        }

        if let Some((key, value)) = self.entries.pop_back() {
            self.hot.remove(&key);
            trace!(key = %key, dirty = self.dirty.len() + 1, "Evicting witness to dirty tier");
            self.dirty.insert(key, value);
            self.stats.record_eviction();
        }
    }
}
