//! Per-event memoization
//!
//! Results derived from a track that do not depend on the hypothesis are
//! computed once per event and shared between the swims of that track. The
//! cache is keyed by (entity id, [`ComputationId`]) and cleared when the
//! next event starts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

/// Names one kind of memoized computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputationId(pub &'static str);

impl ComputationId {
    /// Whether a track fit can seed a swim
    pub const SEED_VALIDATION: ComputationId = ComputationId("seed-validation");
}

/// Hit/miss counters of an [`EventCache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: usize,
    /// Lookups that ran the computation
    pub misses: usize,
}

/// Memoization map shared by the swims of one event
#[derive(Debug)]
pub struct EventCache<V> {
    entries: RwLock<HashMap<(u64, ComputationId), V>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<V> Default for EventCache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }
}

impl<V: Clone> EventCache<V> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value, if present
    pub fn get(&self, entity: u64, computation: ComputationId) -> Option<V> {
        self.entries.read().get(&(entity, computation)).cloned()
    }

    /// Cached value, computing and storing it on a miss
    ///
    /// The computation runs without holding the lock; when two threads miss
    /// at once the first value stored wins and both return it.
    pub fn get_or_insert_with(
        &self,
        entity: u64,
        computation: ComputationId,
        compute: impl FnOnce() -> V,
    ) -> V {
        if let Some(value) = self.get(entity, computation) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return value;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute();
        self.entries
            .write()
            .entry((entity, computation))
            .or_insert(value)
            .clone()
    }

    /// Number of cached values
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Hit/miss counters since the last clear
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop every value and reset the counters
    pub fn clear(&self) {
        self.entries.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_computes_once_per_key() {
        let cache = EventCache::new();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            42
        };

        assert_eq!(cache.get_or_insert_with(1, ComputationId::SEED_VALIDATION, compute), 42);
        assert_eq!(cache.get_or_insert_with(1, ComputationId::SEED_VALIDATION, compute), 42);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });

        // Another entity or another computation is a separate key
        cache.get_or_insert_with(2, ComputationId::SEED_VALIDATION, compute);
        cache.get_or_insert_with(1, ComputationId("other"), compute);
        assert_eq!(calls.get(), 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_clear_resets_everything() {
        let cache = EventCache::new();
        cache.get_or_insert_with(1, ComputationId::SEED_VALIDATION, || true);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(1, ComputationId::SEED_VALIDATION), None);
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_concurrent_lookups_agree() {
        let cache = EventCache::new();
        std::thread::scope(|s| {
            for i in 0..4 {
                let cache = &cache;
                s.spawn(move || {
                    for entity in 0..50u64 {
                        let v = cache.get_or_insert_with(entity, ComputationId::SEED_VALIDATION, || entity * 10 + i);
                        assert_eq!(v / 10, entity);
                    }
                });
            }
        });
        assert_eq!(cache.len(), 50);
        for entity in 0..50u64 {
            let v = cache.get(entity, ComputationId::SEED_VALIDATION).unwrap();
            assert_eq!(v / 10, entity);
        }
    }
}
