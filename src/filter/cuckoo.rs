//! Cuckoo admission filter
//!
//! Probabilistic membership over key bytes. Each key has two candidate
//! buckets and a one-byte fingerprint; the alternate bucket of a
//! fingerprint is derivable from the fingerprint alone, which lets a full
//! bucket displace ("kick") a resident fingerprint to its other home.
//!
//! # Sizing
//!
//! `buckets = max(next_pow2(capacity) / 4, 1)`. The bucket count is a power
//! of two, so `(i ^ h) % n` is an involution and `alt(alt(i)) == i`.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::bucket::{Bucket, BUCKET_SIZE};
use crate::hash::{hash_with_seed, FINGERPRINT_SEED, KEY_SEED};

/// Relocation rounds before an insert gives up
pub const MAX_CUCKOO_KICKS: usize = 500;

/// Point-in-time filter lookup counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub hits: u64,
    pub misses: u64,
}

/// Cuckoo filter with 4-slot buckets
pub struct CuckooFilter {
    buckets: Vec<Bucket>,
    count: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    rng: SmallRng,
}

impl CuckooFilter {
    /// Create a filter sized for roughly `capacity` fingerprints
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, SmallRng::from_entropy())
    }

    /// Create a filter whose displacement choices are reproducible
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: SmallRng) -> Self {
        let bucket_count = (capacity.next_power_of_two() / BUCKET_SIZE).max(1);
        Self {
            buckets: vec![Bucket::new(); bucket_count],
            count: 0,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            rng,
        }
    }

    /// Number of buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total fingerprint slots
    pub fn capacity(&self) -> usize {
        self.buckets.len() * BUCKET_SIZE
    }

    /// Number of fingerprints currently stored
    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Membership test; records a hit or a miss
    pub fn contains(&self, data: &[u8]) -> bool {
        let (i1, i2, fp) = self.components(data);
        let found = self.buckets[i1].contains(fp) || self.buckets[i2].contains(fp);
        if found {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Insert a fingerprint for `data`. Returns `false` when the filter is
    /// considered full (relocation rounds exhausted).
    pub fn add(&mut self, data: &[u8]) -> bool {
        let (i1, i2, fp) = self.components(data);
        if self.buckets[i1].insert(fp) || self.buckets[i2].insert(fp) {
            self.count += 1;
            return true;
        }

        let mut index = if self.rng.gen::<bool>() { i1 } else { i2 };
        let mut fp = fp;
        for _ in 0..MAX_CUCKOO_KICKS {
            let slot = self.rng.gen_range(0..BUCKET_SIZE);
            fp = self.buckets[index].swap(slot, fp);
            index = self.alt_index(fp, index);
            if self.buckets[index].insert(fp) {
                self.count += 1;
                return true;
            }
        }

        false
    }

    /// Insert only when `data` is not already (probably) present
    pub fn add_unique(&mut self, data: &[u8]) -> bool {
        if self.contains(data) {
            return false;
        }
        self.add(data)
    }

    /// Remove one fingerprint for `data` from either candidate bucket
    pub fn delete(&mut self, data: &[u8]) -> bool {
        let (i1, i2, fp) = self.components(data);
        if self.buckets[i1].delete(fp) || self.buckets[i2].delete(fp) {
            self.count -= 1;
            return true;
        }
        false
    }

    /// Empty every bucket and zero count and stats
    pub fn reset(&mut self) {
        let bucket_count = self.buckets.len();
        self.buckets = vec![Bucket::new(); bucket_count];
        self.count = 0;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> FilterStats {
        FilterStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    #[inline]
    fn components(&self, data: &[u8]) -> (usize, usize, u8) {
        let fp = fingerprint(data);
        let i1 = (hash_with_seed(data, KEY_SEED) % self.buckets.len() as u64) as usize;
        let i2 = self.alt_index(fp, i1);
        (i1, i2, fp)
    }

    #[inline]
    fn alt_index(&self, fp: u8, index: usize) -> usize {
        let h = hash_with_seed(&[fp], KEY_SEED);
        ((index as u64 ^ h) % self.buckets.len() as u64) as usize
    }
}

impl std::fmt::Debug for CuckooFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CuckooFilter")
            .field("buckets", &self.buckets.len())
            .field("count", &self.count)
            .field("stats", &self.stats())
            .finish()
    }
}

/// One-byte fingerprint in `1..=255`
#[inline]
fn fingerprint(data: &[u8]) -> u8 {
    (hash_with_seed(data, FINGERPRINT_SEED) % 255 + 1) as u8
}

// =============================================================================
// Tests
// =============================================================================
