//! Per-shard counters and the aggregated snapshot

use std::ops::AddAssign;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters owned by one shard
#[derive(Debug, Default)]
pub struct ShardStats {
    hits: AtomicU64,
    misses: AtomicU64,
    delete_hits: AtomicU64,
    delete_misses: AtomicU64,
    collisions: AtomicU64,
    evictions: AtomicU64,
}

impl ShardStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete_hit(&self) {
        self.delete_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete_miss(&self) {
        self.delete_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_collision(&self) {
        self.collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            delete_hits: self.delete_hits.load(Ordering::Relaxed),
            delete_misses: self.delete_misses.load(Ordering::Relaxed),
            collisions: self.collisions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.delete_hits.store(0, Ordering::Relaxed);
        self.delete_misses.store(0, Ordering::Relaxed);
        self.collisions.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time counters, summed across shards by the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub hits: u64,
    pub misses: u64,
    pub delete_hits: u64,
    pub delete_misses: u64,
    pub collisions: u64,
    pub evictions: u64,
}

impl Stats {
    /// Hit ratio over all lookups, 0.0 when nothing was looked up
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses + self.collisions;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl AddAssign for Stats {
    fn add_assign(&mut self, other: Self) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.delete_hits += other.delete_hits;
        self.delete_misses += other.delete_misses;
        self.collisions += other.collisions;
        self.evictions += other.evictions;
    }
}

// =============================================================================
// Tests
// =============================================================================
