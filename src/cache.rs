//! Cost-aware LRU cache for decoded assets.
//!
//! Capacity is a byte budget derived from available memory at construction,
//! not an entry count: one large animated asset can weigh as much as dozens
//! of stills, so eviction is driven by the cumulative decoded footprint.
//!
//! Not internally synchronized. All mutation happens on the feed's single
//! apply context, so no lock is needed here.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::asset::Asset;

pub struct AssetCache {
    /// Map from asset key to the decoded asset.
    entries: HashMap<String, Arc<Asset>>,
    /// LRU order (front = oldest, back = most recent).
    lru_order: VecDeque<String>,
    /// Sum of `byte_cost` over all entries. Invariant: `<= capacity` after
    /// every mutation.
    total_cost: usize,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl AssetCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru_order: VecDeque::new(),
            total_cost: 0,
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    /// Get an asset, marking it most recently used on a hit.
    pub fn get(&mut self, key: &str) -> Option<Arc<Asset>> {
        match self.entries.get(key) {
            Some(asset) => {
                self.hits += 1;
                let asset = Arc::clone(asset);
                self.lru_order.retain(|k| k != key);
                self.lru_order.push_back(key.to_string());
                Some(asset)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Check for presence without touching LRU order or stats.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace an entry, then evict oldest-first until the total
    /// cost fits the capacity again. An asset costing more than the whole
    /// capacity is evicted right back out; the cache never overcommits for
    /// a single entry.
    pub fn put(&mut self, key: String, asset: Arc<Asset>) {
        if let Some(old) = self.entries.remove(&key) {
            self.total_cost -= old.byte_cost;
            self.lru_order.retain(|k| k != &key);
        }

        self.total_cost += asset.byte_cost;
        self.lru_order.push_back(key.clone());
        self.entries.insert(key, asset);

        while self.total_cost > self.capacity {
            let Some(oldest) = self.lru_order.pop_front() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&oldest) {
                self.total_cost -= evicted.byte_cost;
                log::debug!(
                    "evicted asset {oldest} ({} bytes, {} total)",
                    evicted.byte_cost,
                    self.total_cost
                );
            }
        }
    }

    pub fn total_cost(&self) -> usize {
        self.total_cost
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Log hit-rate statistics at debug level.
    pub fn log_stats(&self) {
        let total = self.hits + self.misses;
        if total > 0 {
            let hit_rate = (self.hits as f64 / total as f64) * 100.0;
            log::debug!(
                "asset cache: {} hits, {} misses ({:.1}% hit rate), {}/{} bytes in {} entries",
                self.hits,
                self.misses,
                hit_rate,
                self.total_cost,
                self.capacity,
                self.entries.len()
            );
        }
    }
}
