//! Fetch coordination state: cache lookups plus in-flight de-duplication.
//!
//! The coordinator owns the asset cache and the in-flight key set. It is a
//! synchronous state machine; the feed drives it from the single apply
//! context and performs the actual async dispatch when told to.

use std::collections::HashSet;
use std::sync::Arc;

use crate::asset::Asset;
use crate::cache::AssetCache;

/// Outcome of a lookup for one asset key.
pub enum Lookup {
    /// Cached; ready immediately.
    Hit(Arc<Asset>),
    /// A fetch for this key is already outstanding; wait for its
    /// notification instead of dispatching another.
    InFlight,
    /// Caller must dispatch a fetch; the key is now recorded in-flight.
    Dispatch,
}

pub struct Coordinator {
    cache: AssetCache,
    in_flight: HashSet<String>,
}

impl Coordinator {
    pub fn new(cache: AssetCache) -> Self {
        Self {
            cache,
            in_flight: HashSet::new(),
        }
    }

    /// Resolve a key against the cache and the in-flight set.
    ///
    /// At most one fetch per key is ever outstanding: `Dispatch` is returned
    /// only when the key was absent from both, and marks it in-flight in the
    /// same step.
    pub fn lookup(&mut self, key: &str) -> Lookup {
        if let Some(asset) = self.cache.get(key) {
            return Lookup::Hit(asset);
        }

        if self.in_flight.contains(key) {
            return Lookup::InFlight;
        }

        self.in_flight.insert(key.to_string());
        Lookup::Dispatch
    }

    /// A dispatched fetch succeeded: cache the asset, clear in-flight.
    pub fn complete(&mut self, key: &str, asset: Arc<Asset>) {
        self.in_flight.remove(key);
        self.cache.put(key.to_string(), asset);
    }

    /// A dispatched fetch failed: clear in-flight without caching, so the
    /// next request for this key dispatches a fresh fetch.
    pub fn fail(&mut self, key: &str) {
        self.in_flight.remove(key);
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains(key)
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }
}
