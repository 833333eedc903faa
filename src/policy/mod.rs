//! Eviction policies
//!
//! A policy owns the resident entries of one shard, keyed by 64-bit key hash,
//! and decides which entry leaves when the shard is over budget.

mod list;
mod lrfu;

pub use list::{NodeId, RecencyList};
pub use lrfu::{Lrfu, DEFAULT_LAMBDA};

use bytes::Bytes;

use crate::error::Result;

/// Callback fired with `(key_hash, value)` when a policy evicts an entry
pub type EvictedFn = Box<dyn FnMut(u64, &Bytes) + Send>;

/// Interface every eviction policy implements
pub trait EvictionPolicy: Send {
    /// Look up an entry, marking it as used
    fn get(&mut self, key: u64) -> Option<Bytes>;

    /// Insert or overwrite, returning the replaced value.
    ///
    /// An insert that pushes the policy past its entry limit evicts the
    /// least recently used entry through the eviction callback.
    fn set(&mut self, key: u64, value: Bytes) -> Result<Option<Bytes>>;

    /// Remove an entry without firing the eviction callback
    fn remove(&mut self, key: u64) -> Option<Bytes>;

    /// Evict the least recently used entry, firing the eviction callback
    fn remove_oldest(&mut self) -> Option<(u64, Bytes)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry without firing callbacks
    fn clear(&mut self);

    fn set_evicted_fn(&mut self, f: EvictedFn);
}
