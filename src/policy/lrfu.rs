//! LRFU recency/frequency policy
//!
//! Every access ticks a policy-wide logical clock and refreshes the entry's
//! combined recency/frequency (CRF) score:
//!
//! ```text
//!   crf(now) = decay(now - last) * crf(last) + decay(0)
//!   decay(x) = (1/2)^(lambda * x)
//! ```
//!
//! Entries are kept in recency order; the tail is the victim on overflow.
//! The CRF score is tracked per entry and exposed through [`Lrfu::score`].

use bytes::Bytes;

use super::list::{NodeId, RecencyList};
use super::{EvictedFn, EvictionPolicy};
use crate::error::Result;
use crate::index::TrieIndex;

/// Default decay exponent
pub const DEFAULT_LAMBDA: f64 = 0.5;

#[derive(Debug)]
struct Entry {
    key: u64,
    value: Bytes,
    last_reference: u64,
    crf: f64,
}

/// Recency list plus trie index, with CRF bookkeeping
pub struct Lrfu {
    max_entries: usize,
    lambda: f64,
    counter: u64,
    list: RecencyList<Entry>,
    index: TrieIndex<NodeId>,
    on_evicted: Option<EvictedFn>,
}

impl Lrfu {
    /// Create a policy. `max_entries == 0` means unbounded by count.
    pub fn new(max_entries: usize, lambda: f64) -> Self {
        Self {
            max_entries,
            lambda,
            counter: 0,
            list: RecencyList::new(),
            index: TrieIndex::new(),
            on_evicted: None,
        }
    }

    /// Builder-style eviction callback
    pub fn with_evicted_fn(mut self, f: EvictedFn) -> Self {
        self.on_evicted = Some(f);
        self
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Current value of the logical clock
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// CRF score of `key` as of the current clock, without touching it
    pub fn score(&self, key: u64) -> Option<f64> {
        let id = self.index.get(key).ok()?;
        let entry = self.list.get(id)?;
        Some(self.weight(self.counter - entry.last_reference) * entry.crf)
    }

    /// Keys from most to least recently used
    pub fn keys(&self) -> Vec<u64> {
        self.list.iter().map(|entry| entry.key).collect()
    }

    #[inline]
    fn weight(&self, delta: u64) -> f64 {
        0.5f64.powf(self.lambda * delta as f64)
    }

    fn tick(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    /// Refresh recency and CRF of an existing node
    fn touch(&mut self, id: NodeId, now: u64) {
        self.list.move_to_front(id);
        let lambda = self.lambda;
        if let Some(entry) = self.list.get_mut(id) {
            let delta = now - entry.last_reference;
            entry.crf = 0.5f64.powf(lambda * delta as f64) * entry.crf + 1.0;
            entry.last_reference = now;
        }
    }
}

impl EvictionPolicy for Lrfu {
    fn get(&mut self, key: u64) -> Option<Bytes> {
        let now = self.tick();
        let id = self.index.get(key).ok()?;
        self.touch(id, now);
        self.list.get(id).map(|entry| entry.value.clone())
    }

    fn set(&mut self, key: u64, value: Bytes) -> Result<Option<Bytes>> {
        let now = self.tick();

        if let Ok(id) = self.index.get(key) {
            self.touch(id, now);
            let old = self
                .list
                .get_mut(id)
                .map(|entry| std::mem::replace(&mut entry.value, value));
            return Ok(old);
        }

        let id = self.list.push_front(Entry {
            key,
            value,
            last_reference: now,
            crf: 1.0,
        });
        if let Err(e) = self.index.set(key, id) {
            self.list.remove(id);
            return Err(e);
        }

        if self.max_entries != 0 && self.list.len() > self.max_entries {
            self.remove_oldest();
        }
        Ok(None)
    }

    fn remove(&mut self, key: u64) -> Option<Bytes> {
        let id = self.index.delete(key).ok()?;
        self.list.remove(id).map(|entry| entry.value)
    }

    fn remove_oldest(&mut self) -> Option<(u64, Bytes)> {
        let entry = self.list.pop_back()?;
        // Index and list are updated together; a missing leaf is not an error here
        let _ = self.index.delete(entry.key);
        if let Some(f) = self.on_evicted.as_mut() {
            f(entry.key, &entry.value);
        }
        Some((entry.key, entry.value))
    }

    fn len(&self) -> usize {
        self.list.len()
    }

    fn clear(&mut self) {
        self.list.clear();
        self.index.clear();
        self.counter = 0;
    }

    fn set_evicted_fn(&mut self, f: EvictedFn) {
        self.on_evicted = Some(f);
    }
}

impl std::fmt::Debug for Lrfu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lrfu")
            .field("max_entries", &self.max_entries)
            .field("lambda", &self.lambda)
            .field("counter", &self.counter)
            .field("len", &self.list.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
