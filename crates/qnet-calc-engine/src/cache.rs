//! ---
//! qnet_section: "08-queueing-models"
//! qnet_subsection: "module"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Normalization constants and performance metrics for closed queueing networks."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
//! Memoizing layer over the recurrence, keyed by `(loads, N, policy)`.
//!
//! Each key owns a [`OnceCell`] slot so that concurrent callers asking for the
//! same table block on a single computation instead of racing.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::{
    errors::Result,
    model::Network,
    normalization::{compute_table, NormalizationTable, ScalingPolicy},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    loads: Vec<u64>,
    population: usize,
    policy: (u8, u64),
}

impl CacheKey {
    fn new(loads: &[f64], population: usize, policy: ScalingPolicy) -> Self {
        // `+ 0.0` folds -0.0 onto 0.0 so both hash alike.
        let loads = loads.iter().map(|x| (x + 0.0).to_bits()).collect();
        let policy = match policy {
            ScalingPolicy::Direct => (0, 0),
            ScalingPolicy::Rescale { threshold } => (1, threshold.to_bits()),
            ScalingPolicy::LogDomain => (2, 0),
        };
        Self {
            loads,
            population,
            policy,
        }
    }
}

type Slot = Arc<OnceCell<Arc<NormalizationTable>>>;

/// Number of tables kept by [`NormalizationCache::new`].
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug)]
struct CacheEntry {
    slot: Slot,
    last_used: u64,
}

/// Bounded memo of normalization tables; the least recently used entry is
/// evicted once `capacity` is reached.
#[derive(Debug)]
pub struct NormalizationCache {
    slots: Mutex<HashMap<CacheKey, CacheEntry>>,
    capacity: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl Default for NormalizationCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl NormalizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get_or_compute(
        &self,
        loads: &[f64],
        population: usize,
        policy: ScalingPolicy,
    ) -> Result<Arc<NormalizationTable>> {
        let key = CacheKey::new(loads, population, policy);
        let slot = self.checkout(&key);

        if let Some(table) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(table.clone());
        }

        let mut computed = false;
        let outcome = slot.get_or_try_init(|| {
            computed = true;
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(queues = loads.len(), population, policy = %policy, "normalization cache miss");
            compute_table(loads, population, policy).map(Arc::new)
        });

        match outcome {
            Ok(table) => {
                if !computed {
                    // Another caller finished the computation while we waited.
                    self.hits.fetch_add(1, Ordering::Relaxed);
                }
                Ok(table.clone())
            }
            Err(err) => {
                let mut slots = self.slots.lock();
                if slots.get(&key).is_some_and(|e| e.slot.get().is_none()) {
                    slots.remove(&key);
                }
                Err(err)
            }
        }
    }

    pub fn get_or_compute_network(
        &self,
        network: &Network,
        policy: ScalingPolicy,
    ) -> Result<Arc<NormalizationTable>> {
        self.get_or_compute(&network.loads(), network.population(), policy)
    }

    /// Returns the slot for `key`, inserting an empty one and evicting as needed.
    fn checkout(&self, key: &CacheKey) -> Slot {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        let mut slots = self.slots.lock();
        if let Some(entry) = slots.get_mut(key) {
            entry.last_used = tick;
            return entry.slot.clone();
        }

        while slots.len() >= self.capacity {
            let Some(oldest) = slots
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            slots.remove(&oldest);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(capacity = self.capacity, "evicted least recently used normalization table");
        }

        let slot = Slot::default();
        slots.insert(
            key.clone(),
            CacheEntry {
                slot: slot.clone(),
                last_used: tick,
            },
        );
        slot
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.slots.lock().len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lookup_is_a_hit() {
        let cache = NormalizationCache::new();
        let first = cache
            .get_or_compute(&[2.0, 3.0], 3, ScalingPolicy::Direct)
            .unwrap();
        let second = cache
            .get_or_compute(&[2.0, 3.0], 3, ScalingPolicy::Direct)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                capacity: DEFAULT_CACHE_CAPACITY,
                hits: 1,
                misses: 1,
                evictions: 0,
            }
        );
    }

    #[test]
    fn policy_and_population_are_part_of_the_key() {
        let cache = NormalizationCache::new();
        cache
            .get_or_compute(&[2.0, 3.0], 3, ScalingPolicy::Direct)
            .unwrap();
        cache
            .get_or_compute(&[2.0, 3.0], 3, ScalingPolicy::LogDomain)
            .unwrap();
        cache
            .get_or_compute(&[2.0, 3.0], 4, ScalingPolicy::Direct)
            .unwrap();
        assert_eq!(cache.stats().entries, 3);
        assert_eq!(cache.stats().misses, 3);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = NormalizationCache::new();
        assert!(cache
            .get_or_compute(&[], 2, ScalingPolicy::Direct)
            .unwrap_err()
            .is_domain());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let cache = NormalizationCache::with_capacity(2);
        let first = cache.get_or_compute(&[1.0], 2, ScalingPolicy::Direct).unwrap();
        cache.get_or_compute(&[2.0], 2, ScalingPolicy::Direct).unwrap();
        // Touch the first entry so the second becomes the eviction candidate.
        let again = cache.get_or_compute(&[1.0], 2, ScalingPolicy::Direct).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        cache.get_or_compute(&[3.0], 2, ScalingPolicy::Direct).unwrap();
        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.evictions, 1);

        cache.get_or_compute(&[1.0], 2, ScalingPolicy::Direct).unwrap();
        assert_eq!(cache.stats().misses, 3);
        cache.get_or_compute(&[2.0], 2, ScalingPolicy::Direct).unwrap();
        assert_eq!(cache.stats().misses, 4);
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn concurrent_callers_compute_once() {
        let cache = NormalizationCache::new();
        let loads = vec![1.1; 50];
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    cache
                        .get_or_compute(&loads, 200, ScalingPolicy::LogDomain)
                        .unwrap();
                });
            }
        });
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits + stats.misses, 8);
    }
}
