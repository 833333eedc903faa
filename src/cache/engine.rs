//! Cache orchestrator
//!
//! Routes each key either to the remote peer that owns it or to one of the
//! local shards, gating writes through the optional admission filter.
//!
//! # Locking
//!
//! ```text
//!   shard mutex ──► filter mutex      (never the reverse)
//! ```
//!
//! Eviction hooks run while the shard mutex is held and take the filter
//! mutex themselves, so a caller must release the filter before touching
//! the shard's policy. No lock is held across a peer round trip.

use std::sync::Arc;

use bytes::Bytes;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::shard::{EvictionHook, Shard};
use super::stats::Stats;
use crate::error::{Error, Result};
use crate::filter::{CuckooFilter, FilterStats};
use crate::hash::{bytes_to_mb, key_hash, mb_to_bytes};
use crate::peers::{NoPeers, PeerPicker};
use crate::policy::{Lrfu, DEFAULT_LAMBDA};

type PeerCell = Arc<OnceCell<Arc<dyn PeerPicker>>>;

/// Cache construction parameters
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Number of shards, a power of two
    pub shards: usize,
    /// Total byte budget, split evenly over the shards
    pub max_bytes: u64,
    /// LRFU decay exponent
    pub lambda: f64,
    /// Per-shard entry cap, 0 for none
    pub max_entries_per_shard: usize,
    /// Admission filter capacity; `None` disables the filter
    pub filter_items: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shards: 16,
            max_bytes: mb_to_bytes(64),
            lambda: DEFAULT_LAMBDA,
            max_entries_per_shard: 0,
            filter_items: None,
        }
    }
}

impl CacheConfig {
    /// Byte budget of `mb` rounded up to a power of two mebibytes
    pub fn with_size_mb(mut self, mb: u64) -> Self {
        self.max_bytes = mb_to_bytes(mb.max(1).next_power_of_two());
        self
    }
}

/// Sharded local store plus cluster routing
pub struct Cache {
    shards: Vec<Mutex<Shard>>,
    mask: u64,
    filter: Option<Arc<Mutex<CuckooFilter>>>,
    peers: PeerCell,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("shards", &self.shards.len())
            .field("mask", &self.mask)
            .finish_non_exhaustive()
    }
}

impl Cache {
    /// Build every shard and wire eviction back into the filter and ring load.
    pub fn new(config: CacheConfig) -> Result<Self> {
        if config.shards == 0 {
            return Err(Error::ShardsNotInitialized);
        }
        if !config.shards.is_power_of_two() {
            return Err(Error::Config(format!(
                "shard count must be a power of two, got {}",
                config.shards
            )));
        }

        let filter = config
            .filter_items
            .map(|items| Arc::new(Mutex::new(CuckooFilter::new(items))));
        let peers: PeerCell = Arc::new(OnceCell::new());

        let hook: EvictionHook = {
            let filter = filter.clone();
            let peers = peers.clone();
            Arc::new(move |key: &[u8]| {
                if let Some(filter) = &filter {
                    filter.lock().delete(key);
                }
                if let Some(peers) = peers.get() {
                    peers.decrement_load();
                }
            })
        };

        let per_shard = config.max_bytes / config.shards as u64;
        let shards = (0..config.shards)
            .map(|id| {
                let mut shard = Shard::new(id, per_shard);
                shard.attach_policy(
                    Box::new(Lrfu::new(config.max_entries_per_shard, config.lambda)),
                    Some(hook.clone()),
                );
                Mutex::new(shard)
            })
            .collect();

        info!(
            shards = config.shards,
            max_bytes = config.max_bytes,
            lambda = config.lambda,
            filter = config.filter_items.is_some(),
            "Cache initialized"
        );

        Ok(Self {
            shards,
            mask: config.shards as u64 - 1,
            filter,
            peers,
        })
    }

    /// Inject the peer picker at construction
    pub fn with_peers(self, peers: Arc<dyn PeerPicker>) -> Self {
        if self.peers.set(peers).is_err() {
            warn!("Peer picker already resolved, keeping the existing one");
        }
        self
    }

    /// Register the peer picker after construction.
    ///
    /// Fails once routing has been resolved, either by an earlier
    /// registration or by the first operation defaulting to [`NoPeers`].
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers
            .set(peers)
            .map_err(|_| Error::PeersAlreadyRegistered)
    }

    fn peers(&self) -> &Arc<dyn PeerPicker> {
        self.peers.get_or_init(|| Arc::new(NoPeers))
    }

    // =========================================================================
    // Routed operations
    // =========================================================================

    /// Read `key` from its owner
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        if let Some(peer) = self.peers().pick_peer(key) {
            debug!(key, peer = peer.addr(), "Forwarding get to peer");
            return peer.get(key).await;
        }
        self.get_local(key)
    }

    /// Write `key` on its owner
    pub async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        if let Some(peer) = self.peers().pick_peer(key) {
            debug!(key, peer = peer.addr(), "Forwarding set to peer");
            return peer.set(key, value).await;
        }
        self.set_local(key, value)
    }

    /// Delete `key` on its owner
    pub async fn delete(&self, key: &str) -> Result<()> {
        if let Some(peer) = self.peers().pick_peer(key) {
            debug!(key, peer = peer.addr(), "Forwarding delete to peer");
            return peer.delete(key).await;
        }
        self.delete_local(key)
    }

    // =========================================================================
    // Local operations
    // =========================================================================

    /// Read from the local shard, ignoring ownership
    pub fn get_local(&self, key: &str) -> Result<Bytes> {
        self.shard_for(key)?.lock().get(key)
    }

    /// Write to the local shard, ignoring ownership.
    ///
    /// With the filter enabled the first write of a key only records it and
    /// fails with [`Error::FilterFirstInstance`].
    pub fn set_local(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut shard = self.shard_for(key)?.lock();

        if let Some(filter) = &self.filter {
            let mut filter = filter.lock();
            if !filter.contains(key.as_bytes()) {
                filter.add(key.as_bytes());
                return Err(Error::FilterFirstInstance {
                    key: key.to_string(),
                });
            }
        }

        if shard.set(key, value)? {
            self.peers().increment_load();
        }
        Ok(())
    }

    /// Delete from the local shard, ignoring ownership
    pub fn delete_local(&self, key: &str) -> Result<()> {
        let mut shard = self.shard_for(key)?.lock();
        shard.delete(key)?;

        // Cuckoo deletes are only sound for members
        if let Some(filter) = &self.filter {
            filter.lock().delete(key.as_bytes());
        }
        self.peers().decrement_load();
        Ok(())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Counters summed over all shards
    pub fn stats(&self) -> Stats {
        let mut total = Stats::default();
        for shard in &self.shards {
            total += shard.lock().stats();
        }
        total
    }

    /// Filter hit/miss counters, zero when the filter is disabled
    pub fn filter_stats(&self) -> FilterStats {
        self.filter
            .as_ref()
            .map(|f| f.lock().stats())
            .unwrap_or_default()
    }

    pub fn reset_filter(&self) {
        if let Some(filter) = &self.filter {
            filter.lock().reset();
        }
    }

    /// Membership test against the admission filter; false when disabled
    pub fn contains(&self, key: &str) -> bool {
        self.filter
            .as_ref()
            .is_some_and(|f| f.lock().contains(key.as_bytes()))
    }

    /// Fingerprints held by the filter
    pub fn filter_count(&self) -> u64 {
        self.filter.as_ref().map_or(0, |f| f.lock().len())
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Resident entries across all shards
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resident framed bytes
    pub fn size(&self) -> u64 {
        self.shards.iter().map(|s| s.lock().size()).sum()
    }

    /// Byte budget
    pub fn max_size(&self) -> u64 {
        self.shards.iter().map(|s| s.lock().max_size()).sum()
    }

    pub fn size_mb(&self) -> u64 {
        bytes_to_mb(self.size())
    }

    pub fn max_size_mb(&self) -> u64 {
        bytes_to_mb(self.max_size())
    }

    /// Drop every local entry and reset the filter
    pub fn clear(&self) {
        let peers = self.peers();
        for shard in &self.shards {
            let mut shard = shard.lock();
            for _ in 0..shard.len() {
                peers.decrement_load();
            }
            shard.clear();
        }
        self.reset_filter();
        info!("Cache cleared");
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard a key routes to locally
    pub fn shard_index(&self, key: &str) -> usize {
        (key_hash(key) & self.mask) as usize
    }

    fn shard_for(&self, key: &str) -> Result<&Mutex<Shard>> {
        self.shards
            .get(self.shard_index(key))
            .ok_or(Error::ShardsNotInitialized)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::RemotePeer;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn config() -> CacheConfig {
        CacheConfig {
            shards: 4,
            ..Default::default()
        }
    }

    /// Counts load hooks, always local
    #[derive(Default)]
    struct CountingPeers {
        load: AtomicU64,
    }

    impl PeerPicker for CountingPeers {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn RemotePeer>> {
            None
        }

        fn increment_load(&self) {
            self.load.fetch_add(1, Ordering::SeqCst);
        }

        fn decrement_load(&self) {
            let _ = self
                .load
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |l| l.checked_sub(1));
        }

        fn load(&self) -> u64 {
            self.load.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_construction_guards() {
        let zero = CacheConfig {
            shards: 0,
            ..Default::default()
        };
        assert_matches!(Cache::new(zero), Err(Error::ShardsNotInitialized));

        let odd = CacheConfig {
            shards: 3,
            ..Default::default()
        };
        assert_matches!(Cache::new(odd), Err(Error::Config(_)));
    }

    #[test]
    fn test_size_mb_rounds_to_power_of_two() {
        let config = CacheConfig::default().with_size_mb(100);
        assert_eq!(config.max_bytes, mb_to_bytes(128));

        let cache = Cache::new(config).unwrap();
        assert_eq!(cache.max_size_mb(), 128);
        assert_eq!(cache.size_mb(), 0);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let cache = Cache::new(config()).unwrap();
        cache.set("greeting", b"hello").await.unwrap();
        assert_eq!(cache.get("greeting").await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(cache.len(), 1);

        cache.delete("greeting").await.unwrap();
        assert!(cache.get("greeting").await.unwrap_err().is_not_found());
        assert!(cache.is_empty());
        assert_eq!(cache.size(), 0);
    }

    #[tokio::test]
    async fn test_filter_two_phase_admission() {
        let cache = Cache::new(CacheConfig {
            filter_items: Some(16),
            ..config()
        })
        .unwrap();

        assert_matches!(
            cache.set("x", b"v1").await,
            Err(Error::FilterFirstInstance { key }) if key == "x"
        );
        assert!(cache.contains("x"));
        assert_eq!(cache.filter_count(), 1);

        cache.set("x", b"v1").await.unwrap();
        assert_eq!(cache.get("x").await.unwrap(), Bytes::from_static(b"v1"));

        cache.delete("x").await.unwrap();
        assert_eq!(cache.filter_count(), 0);
    }

    #[tokio::test]
    async fn test_load_hooks() {
        let peers = Arc::new(CountingPeers::default());
        let cache = Cache::new(CacheConfig {
            shards: 1,
            max_entries_per_shard: 2,
            ..Default::default()
        })
        .unwrap()
        .with_peers(peers.clone());

        cache.set("a", b"1").await.unwrap();
        cache.set("b", b"2").await.unwrap();
        assert_eq!(peers.load(), 2);

        // Overflow evicts "a" through the hook
        cache.set("c", b"3").await.unwrap();
        assert_eq!(peers.load(), 2);

        cache.delete("b").await.unwrap();
        assert_eq!(peers.load(), 1);

        cache.clear();
        assert_eq!(peers.load(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_counts_load_once() {
        let peers = Arc::new(CountingPeers::default());
        let cache = Cache::new(CacheConfig {
            shards: 1,
            ..Default::default()
        })
        .unwrap()
        .with_peers(peers.clone());

        for i in 0..5u8 {
            cache.set("a", &[i]).await.unwrap();
        }
        assert_eq!(cache.len(), 1);
        assert_eq!(peers.load(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(peers.load(), 0);
    }

    #[tokio::test]
    async fn test_delete_of_absent_key_keeps_filter_membership() {
        let cache = Cache::new(CacheConfig {
            filter_items: Some(16),
            ..config()
        })
        .unwrap();

        let _ = cache.set("x", b"v").await;
        cache.set("x", b"v").await.unwrap();
        assert_eq!(cache.filter_count(), 1);

        // Small filter: many absent keys share buckets and fingerprints with "x"
        for i in 0..1000 {
            assert!(cache.delete(&format!("y{i}")).await.unwrap_err().is_not_found());
        }
        assert_eq!(cache.filter_count(), 1);
        assert!(cache.contains("x"));
        assert_eq!(cache.get("x").await.unwrap(), Bytes::from_static(b"v"));
    }

    #[tokio::test]
    async fn test_register_peers_once() {
        let cache = Cache::new(config()).unwrap();
        cache
            .register_peers(Arc::new(CountingPeers::default()))
            .unwrap();
        assert_matches!(
            cache.register_peers(Arc::new(NoPeers)),
            Err(Error::PeersAlreadyRegistered)
        );

        // Resolution defaults to NoPeers on first use
        let cache = Cache::new(config()).unwrap();
        let _ = cache.get("anything").await;
        assert_matches!(
            cache.register_peers(Arc::new(NoPeers)),
            Err(Error::PeersAlreadyRegistered)
        );
    }

    #[test]
    fn test_shard_index_uses_mask() {
        let cache = Cache::new(config()).unwrap();
        for key in ["a", "b", "c", "d", "e"] {
            assert_eq!(cache.shard_index(key), (key_hash(key) & 3) as usize);
        }
        assert_eq!(cache.shard_count(), 4);
    }

    #[test]
    fn test_stats_aggregate_across_shards() {
        let cache = Cache::new(config()).unwrap();
        for i in 0..20 {
            cache.set_local(&format!("k{i}"), b"v").unwrap();
        }
        for i in 0..20 {
            cache.get_local(&format!("k{i}")).unwrap();
        }
        let _ = cache.get_local("missing");
        let _ = cache.delete_local("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 20);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.delete_misses, 1);
        assert_eq!(cache.filter_stats(), FilterStats::default());
    }
}
