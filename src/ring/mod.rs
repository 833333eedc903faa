//! Consistent Hash Ring with Bounded Load
//!
//! Maps keys to peer names on a ring of virtual nodes. A lookup walks
//! clockwise from the key's position and skips any peer whose load would
//! exceed 125% of the fleet average.
//!
//! ```text
//!          vnode(0A)   vnode(3B)
//!               ●─────────●
//!             ╱             ╲        key ─► first vnode >= hash(key)
//!   vnode(1B)●               ●vnode(2A)      └─► walk on while over cap
//!             ╲             ╱
//!               ●─────────●
//! ```
//!
//! Loads are plain atomics read under the shared lock; rebuilding the ring
//! takes the exclusive lock and resets every counter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

use crate::hash::key_hash;

/// Share of the fleet average a single peer may carry
pub const LOAD_FACTOR: f64 = 1.25;

/// Default virtual nodes per peer
pub const DEFAULT_REPLICAS: usize = 10;

/// Peer name and its current load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub name: String,
    pub load: u64,
}

#[derive(Debug, Default)]
struct RingState {
    hosts: HashMap<u64, String>,
    keys: Vec<u64>,
    loads: HashMap<String, AtomicU64>,
    total: AtomicU64,
}

impl RingState {
    fn is_loadable(&self, peer: &str) -> bool {
        let Some(load) = self.loads.get(peer) else {
            return false;
        };
        let total = self.total.load(Ordering::Relaxed);
        let cap = (LOAD_FACTOR * (total + 1) as f64 / self.loads.len() as f64).ceil();
        (load.load(Ordering::Relaxed) + 1) as f64 <= cap
    }

    /// Index of the first virtual node at or after `hash`, wrapping to 0
    fn search(&self, hash: u64) -> usize {
        let idx = self.keys.partition_point(|k| *k < hash);
        if idx >= self.keys.len() {
            0
        } else {
            idx
        }
    }
}

/// Virtual-node ring with per-peer load accounting
#[derive(Debug)]
pub struct HashRing {
    replicas: usize,
    state: RwLock<RingState>,
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}

impl HashRing {
    pub fn new(replicas: usize) -> Self {
        Self {
            replicas,
            state: RwLock::new(RingState::default()),
        }
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().hosts.is_empty()
    }

    /// Replace the ring with `peers`; previous nodes and loads are discarded
    pub fn add<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next = RingState::default();
        for peer in peers {
            let peer = peer.as_ref();
            if next.loads.contains_key(peer) {
                continue;
            }
            next.loads.insert(peer.to_string(), AtomicU64::new(0));
            for i in 0..self.replicas {
                let hash = key_hash(&format!("{i}{peer}"));
                if next.hosts.insert(hash, peer.to_string()).is_none() {
                    next.keys.push(hash);
                }
            }
        }
        next.keys.sort_unstable();

        *self.state.write() = next;
    }

    /// Owner of `key`, honouring the load cap. `None` when the ring is empty.
    pub fn get(&self, key: &str) -> Option<String> {
        let state = self.state.read();
        if state.keys.is_empty() {
            return None;
        }

        let start = state.search(key_hash(key));
        let len = state.keys.len();
        for step in 0..len {
            let peer = state.hosts.get(&state.keys[(start + step) % len])?;
            if state.is_loadable(peer) {
                return Some(peer.clone());
            }
        }

        // Every peer is at the cap; fall back to the plain ring owner
        state.hosts.get(&state.keys[start]).cloned()
    }

    /// Count one more entry on `peer`. Unknown peers are ignored.
    pub fn increment(&self, peer: &str) {
        let state = self.state.read();
        if let Some(load) = state.loads.get(peer) {
            load.fetch_add(1, Ordering::Relaxed);
            state.total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count one entry leaving `peer`, flooring at zero
    pub fn decrement(&self, peer: &str) {
        let state = self.state.read();
        if let Some(load) = state.loads.get(peer) {
            let dec = |v: u64| v.checked_sub(1);
            if load.fetch_update(Ordering::Relaxed, Ordering::Relaxed, dec).is_ok() {
                let _ = state
                    .total
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, dec);
            }
        }
    }

    pub fn load(&self, peer: &str) -> u64 {
        self.state
            .read()
            .loads
            .get(peer)
            .map_or(0, |l| l.load(Ordering::Relaxed))
    }

    pub fn loads(&self) -> HashMap<String, u64> {
        self.state
            .read()
            .loads
            .iter()
            .map(|(name, load)| (name.clone(), load.load(Ordering::Relaxed)))
            .collect()
    }

    /// Peers sorted by name
    pub fn hosts(&self) -> Vec<Host> {
        let mut hosts: Vec<Host> = self
            .loads()
            .into_iter()
            .map(|(name, load)| Host { name, load })
            .collect();
        hosts.sort_by(|a, b| a.name.cmp(&b.name));
        hosts
    }

    pub fn total_load(&self) -> u64 {
        self.state.read().total.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================
