//! Cache shard
//!
//! One lock domain of the keyspace. The shard frames entries, keeps an exact
//! running byte total and owns the eviction policy that stores the frames.
//! Callers serialize access (the cache wraps each shard in a mutex).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::entry;
use super::stats::{ShardStats, Stats};
use crate::error::{Error, Result};
use crate::hash::key_hash;
use crate::policy::EvictionPolicy;

/// Fired with the evicted entry's key after the shard has accounted for it
pub type EvictionHook = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Single partition of the cache
pub struct Shard {
    id: usize,
    max_size: u64,
    size: Arc<AtomicU64>,
    stats: Arc<ShardStats>,
    policy: Option<Box<dyn EvictionPolicy>>,
}

impl Shard {
    /// Create a shard with a byte budget. A policy must be attached before use.
    pub fn new(id: usize, max_size: u64) -> Self {
        Self {
            id,
            max_size,
            size: Arc::new(AtomicU64::new(0)),
            stats: Arc::new(ShardStats::new()),
            policy: None,
        }
    }

    /// Install the eviction policy and wire its callback to this shard.
    ///
    /// Every eviction subtracts the framed length from the running total and
    /// is then reported to `hook`.
    pub fn attach_policy(&mut self, mut policy: Box<dyn EvictionPolicy>, hook: Option<EvictionHook>) {
        let id = self.id;
        let size = self.size.clone();
        let stats = self.stats.clone();
        policy.set_evicted_fn(Box::new(move |_, frame: &Bytes| {
            size.fetch_sub(frame.len() as u64, Ordering::Relaxed);
            stats.record_eviction();
            let key = entry::key_of(frame);
            debug!(
                shard = id,
                key = %String::from_utf8_lossy(key),
                bytes = frame.len(),
                "Evicted entry"
            );
            if let Some(hook) = &hook {
                hook(key);
            }
        }));
        self.policy = Some(policy);
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Current framed bytes resident in this shard
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Relaxed)
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.policy.as_ref().map_or(0, |p| p.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    /// Look up `key`, detecting hash collisions against the framed key
    pub fn get(&mut self, key: &str) -> Result<Bytes> {
        let policy = self.policy.as_mut().ok_or(Error::PolicyNotInitialized)?;

        let frame = match policy.get(key_hash(key)) {
            Some(frame) => frame,
            None => {
                self.stats.record_miss();
                return Err(Error::KeyNotFound {
                    key: key.to_string(),
                    shard: self.id,
                });
            }
        };

        if entry::key_of(&frame) != key.as_bytes() {
            self.stats.record_collision();
            return Err(Error::HashCollision {
                key: key.to_string(),
                shard: self.id,
            });
        }

        self.stats.record_hit();
        Ok(entry::value_of(&frame))
    }

    /// Frame and store `value`, evicting one entry first if over budget.
    ///
    /// Returns `true` when a new entry was inserted, `false` when an
    /// existing one was overwritten.
    pub fn set(&mut self, key: &str, value: &[u8]) -> Result<bool> {
        let policy = self.policy.as_mut().ok_or(Error::PolicyNotInitialized)?;

        let hash = key_hash(key);
        let frame = entry::frame(entry::now_timestamp(), hash, key, value)?;
        let framed = frame.len() as u64;

        let total = self.size.fetch_add(framed, Ordering::Relaxed) + framed;
        if total > self.max_size {
            policy.remove_oldest();
        }

        match policy.set(hash, frame) {
            Ok(Some(old)) => {
                self.size.fetch_sub(old.len() as u64, Ordering::Relaxed);
                Ok(false)
            }
            Ok(None) => Ok(true),
            Err(e) => {
                self.size.fetch_sub(framed, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Remove whatever entry occupies `key`'s hash slot
    pub fn delete(&mut self, key: &str) -> Result<()> {
        let policy = self.policy.as_mut().ok_or(Error::PolicyNotInitialized)?;

        match policy.remove(key_hash(key)) {
            Some(frame) => {
                self.size.fetch_sub(frame.len() as u64, Ordering::Relaxed);
                self.stats.record_delete_hit();
                Ok(())
            }
            None => {
                self.stats.record_delete_miss();
                Err(Error::KeyNotFound {
                    key: key.to_string(),
                    shard: self.id,
                })
            }
        }
    }

    /// Drop every entry and zero the counters. Eviction hooks do not fire.
    pub fn clear(&mut self) {
        if let Some(policy) = self.policy.as_mut() {
            policy.clear();
        }
        self.size.store(0, Ordering::Relaxed);
        self.stats.reset();
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("id", &self.id)
            .field("size", &self.size())
            .field("max_size", &self.max_size)
            .field("len", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Lrfu, DEFAULT_LAMBDA};
    use assert_matches::assert_matches;
    use std::sync::Mutex;

    fn shard(max_size: u64, max_entries: usize) -> Shard {
        let mut shard = Shard::new(0, max_size);
        shard.attach_policy(Box::new(Lrfu::new(max_entries, DEFAULT_LAMBDA)), None);
        shard
    }

    #[test]
    fn test_requires_policy() {
        let mut shard = Shard::new(0, 1024);
        assert_matches!(shard.get("a"), Err(Error::PolicyNotInitialized));
        assert_matches!(shard.set("a", b"v"), Err(Error::PolicyNotInitialized));
        assert_matches!(shard.delete("a"), Err(Error::PolicyNotInitialized));
        assert_eq!(shard.len(), 0);
    }

    #[test]
    fn test_set_get_delete() {
        let mut shard = shard(1024, 0);
        shard.set("alpha", b"one").unwrap();
        assert_eq!(shard.get("alpha").unwrap(), Bytes::from_static(b"one"));
        assert_eq!(shard.size(), entry::framed_len(5, 3) as u64);

        shard.delete("alpha").unwrap();
        assert_eq!(shard.size(), 0);
        assert_matches!(shard.get("alpha"), Err(Error::KeyNotFound { shard: 0, .. }));
        assert_matches!(shard.delete("alpha"), Err(Error::KeyNotFound { .. }));

        let stats = shard.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.delete_hits, 1);
        assert_eq!(stats.delete_misses, 1);
    }

    #[test]
    fn test_overwrite_replaces_accounting() {
        let mut shard = shard(1024, 0);
        assert!(shard.set("k", b"short").unwrap());
        assert!(!shard.set("k", b"a much longer value").unwrap());
        assert_eq!(shard.len(), 1);
        assert_eq!(shard.size(), entry::framed_len(1, 19) as u64);
        assert_eq!(shard.get("k").unwrap(), Bytes::from_static(b"a much longer value"));
    }

    #[test]
    fn test_byte_budget_evicts_oldest_before_insert() {
        // Room for two 20-byte frames
        let mut shard = shard(40, 0);
        shard.set("a", b"x").unwrap();
        shard.set("b", b"x").unwrap();
        assert_eq!(shard.size(), 40);

        shard.set("c", b"x").unwrap();
        assert_eq!(shard.len(), 2);
        assert_eq!(shard.size(), 40);
        assert_matches!(shard.get("a"), Err(Error::KeyNotFound { .. }));
        assert!(shard.get("b").is_ok());
        assert!(shard.get("c").is_ok());
        assert_eq!(shard.stats().evictions, 1);
    }

    #[test]
    fn test_collision_is_distinct_from_miss() {
        let mut shard = shard(1024, 0);
        let frame = entry::frame(0, key_hash("wanted"), "other", b"v").unwrap();
        shard.policy.as_mut().unwrap().set(key_hash("wanted"), frame).unwrap();

        assert_matches!(shard.get("wanted"), Err(Error::HashCollision { .. }));
        assert_eq!(shard.stats().collisions, 1);
        assert_eq!(shard.stats().misses, 0);
    }

    #[test]
    fn test_eviction_hook_receives_key() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut shard = Shard::new(3, u64::MAX);
        shard.attach_policy(
            Box::new(Lrfu::new(1, DEFAULT_LAMBDA)),
            Some(Arc::new(move |key: &[u8]| sink.lock().unwrap().push(key.to_vec()))),
        );

        shard.set("first", b"1").unwrap();
        shard.set("second", b"2").unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![b"first".to_vec()]);
        assert_eq!(shard.size(), entry::framed_len(6, 1) as u64);
    }

    #[test]
    fn test_key_too_long_leaves_size_untouched() {
        let mut shard = shard(u64::MAX, 0);
        let key = "k".repeat(entry::MAX_KEY_LEN + 1);
        assert_matches!(shard.set(&key, b"v"), Err(Error::KeyTooLong { .. }));
        assert_eq!(shard.size(), 0);
    }

    #[test]
    fn test_clear() {
        let mut shard = shard(1024, 0);
        shard.set("a", b"1").unwrap();
        shard.get("a").unwrap();
        shard.clear();
        assert!(shard.is_empty());
        assert_eq!(shard.size(), 0);
        assert_eq!(shard.stats(), Stats::default());
    }
}
