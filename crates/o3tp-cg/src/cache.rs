//! # Coupling-Tensor Cache
//!
//! Coupling tensors are pure functions of `(l1, l2, l3)` and are reused by
//! every instruction with the same degrees, across every engine. The cache
//! holds them behind `Arc` so callers share one read-only copy.
//!
//! Lookups take the read lock. A miss computes the tensor with no lock held
//! and then inserts under the write lock; if another thread inserted the
//! same key meanwhile, its value is kept and ours is dropped, so every
//! caller observes the same `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use ndarray::Array3;
use parking_lot::RwLock;

use crate::real::clebsch_gordan;

/// Key of a cached tensor: `(l1, l2, l3)`.
pub type DegreeTriple = (u32, u32, u32);

/// Thread-safe memo of real coupling tensors.
#[derive(Debug, Default)]
pub struct ClebschGordanCache {
    tensors: RwLock<HashMap<DegreeTriple, Arc<Array3<f64>>>>,
}

impl ClebschGordanCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache shared by all engines.
    pub fn global() -> &'static ClebschGordanCache {
        static GLOBAL: OnceLock<ClebschGordanCache> = OnceLock::new();
        GLOBAL.get_or_init(ClebschGordanCache::new)
    }

    /// The tensor for `(l1, l2, l3)`, computing it on first use.
    pub fn get(&self, l1: u32, l2: u32, l3: u32) -> Arc<Array3<f64>> {
        let key = (l1, l2, l3);
        if let Some(hit) = self.tensors.read().get(&key) {
            return Arc::clone(hit);
        }

        tracing::debug!(l1, l2, l3, "computing Clebsch-Gordan tensor");
        let computed = Arc::new(clebsch_gordan(l1, l2, l3));
        let mut tensors = self.tensors.write();
        Arc::clone(tensors.entry(key).or_insert(computed))
    }

    /// Whether `(l1, l2, l3)` is already cached.
    pub fn contains(&self, l1: u32, l2: u32, l3: u32) -> bool {
        self.tensors.read().contains_key(&(l1, l2, l3))
    }

    /// Number of cached tensors.
    pub fn len(&self) -> usize {
        self.tensors.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.tensors.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn miss_then_hit_returns_same_arc() {
        let cache = ClebschGordanCache::new();
        assert!(cache.is_empty());
        let a = cache.get(1, 1, 2);
        assert!(cache.contains(1, 1, 2));
        let b = cache.get(1, 1, 2);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cached_value_matches_direct_computation() {
        let cache = ClebschGordanCache::new();
        assert_eq!(*cache.get(2, 1, 3), clebsch_gordan(2, 1, 3));
    }

    #[test]
    fn forbidden_triple_is_cached_as_zeros() {
        let cache = ClebschGordanCache::new();
        let c = cache.get(0, 0, 2);
        assert_eq!(c.dim(), (1, 1, 5));
        assert!(c.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn concurrent_first_use_converges_on_one_value() {
        let cache = Arc::new(ClebschGordanCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get(3, 2, 4))
            })
            .collect();
        let results: Vec<Arc<Array3<f64>>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let first = cache.get(3, 2, 4);
        for r in &results {
            assert!(Arc::ptr_eq(r, &first));
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn global_cache_is_shared() {
        let a = ClebschGordanCache::global().get(1, 0, 1);
        let b = ClebschGordanCache::global().get(1, 0, 1);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
