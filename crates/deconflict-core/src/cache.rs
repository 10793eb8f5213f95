//! Memoized pairwise conflict outcomes.
//!
//! Entries are keyed on the index generation, so any change to the
//! registered set makes older entries unreachable without an explicit purge.

use crate::conflict::ConflictPoint;
use lru::LruCache;
use std::num::NonZeroUsize;

const DEFAULT_CACHE_SIZE: usize = 4096;

/// Normalized cache key for one drone pair.
///
/// `first` is always the lexicographically smaller id; the fingerprints
/// follow the same order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub first: String,
    pub second: String,
    pub fingerprints: (u64, u64),
    pub generation: u64,
}

impl PairKey {
    pub fn new(a: (&str, u64), b: (&str, u64), generation: u64) -> Self {
        let (first, second) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        Self {
            first: first.0.to_string(),
            second: second.0.to_string(),
            fingerprints: (first.1, second.1),
            generation,
        }
    }
}

/// Cached result for a pair: the sorted conflicts, oriented so that
/// `drone_a == PairKey::first`. Empty means the pair is clear.
pub type PairOutcome = Vec<ConflictPoint>;

/// Storage for pair outcomes, injected into the engine.
pub trait ResultCache: Send {
    fn get(&mut self, key: &PairKey) -> Option<PairOutcome>;

    fn put(&mut self, key: PairKey, outcome: PairOutcome);

    /// Drop every entry.
    fn invalidate(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded least-recently-used cache.
pub struct LruResultCache {
    entries: LruCache<PairKey, PairOutcome>,
}

impl LruResultCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CACHE_SIZE))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for LruResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl ResultCache for LruResultCache {
    fn get(&mut self, key: &PairKey) -> Option<PairOutcome> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: PairKey, outcome: PairOutcome) {
        self.entries.put(key, outcome);
    }

    fn invalidate(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl ResultCache for NoopCache {
    fn get(&mut self, _key: &PairKey) -> Option<PairOutcome> {
        None
    }

    fn put(&mut self, _key: PairKey, _outcome: PairOutcome) {}

    fn invalidate(&mut self) {}

    fn len(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_pair_order() {
        let ab = PairKey::new(("A", 1), ("B", 2), 3);
        let ba = PairKey::new(("B", 2), ("A", 1), 3);
        assert_eq!(ab, ba);
        assert_eq!(ab.first, "A");
        assert_eq!(ab.fingerprints, (1, 2));
        assert_ne!(ab, PairKey::new(("A", 1), ("B", 2), 4));
        assert_ne!(ab, PairKey::new(("A", 9), ("B", 2), 3));
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = LruResultCache::new(2);
        let k1 = PairKey::new(("A", 0), ("B", 0), 0);
        let k2 = PairKey::new(("A", 0), ("C", 0), 0);
        let k3 = PairKey::new(("A", 0), ("D", 0), 0);

        cache.put(k1.clone(), Vec::new());
        cache.put(k2.clone(), Vec::new());
        assert!(cache.get(&k1).is_some());
        cache.put(k3.clone(), Vec::new());

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&k2).is_none());
        assert!(cache.get(&k1).is_some());
        assert!(cache.get(&k3).is_some());
    }

    #[test]
    fn invalidate_clears_everything() {
        let mut cache = LruResultCache::default();
        assert_eq!(cache.capacity(), DEFAULT_CACHE_SIZE);
        cache.put(PairKey::new(("A", 0), ("B", 0), 0), Vec::new());
        assert!(!cache.is_empty());
        cache.invalidate();
        assert!(cache.is_empty());
    }

    #[test]
    fn noop_cache_never_hits() {
        let mut cache = NoopCache;
        let key = PairKey::new(("A", 0), ("B", 0), 0);
        cache.put(key.clone(), Vec::new());
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.len(), 0);
    }
}
