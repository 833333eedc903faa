//! HTTP peer pool
//!
//! Owns the cluster ring and one [`HttpPeer`] per member, and answers the
//! cache's ownership questions from this node's point of view.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::Client;
use tracing::{debug, info};

use super::client::HttpPeer;
use crate::error::{Error, Result};
use crate::peers::{PeerPicker, RemotePeer};
use crate::ring::{HashRing, Host, DEFAULT_REPLICAS};

/// Route the peer service is mounted under
pub const DEFAULT_BASE_PATH: &str = "/_ringcache/";

/// Canonical form of a member address, without trailing slashes
pub fn normalize_addr(addr: &str) -> &str {
    addr.trim_end_matches('/')
}

/// Pool options
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub base_path: String,
    pub replicas: usize,
    pub request_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Ring-backed [`PeerPicker`] speaking HTTP to the other members
pub struct HttpPool {
    self_addr: String,
    options: PoolOptions,
    ring: HashRing,
    peers: DashMap<String, Arc<HttpPeer>>,
    client: Client,
}

impl HttpPool {
    /// Create a pool for the node reachable at `self_addr`
    pub fn new(self_addr: impl Into<String>, options: PoolOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        let self_addr: String = self_addr.into();

        Ok(Self {
            self_addr: normalize_addr(&self_addr).to_string(),
            ring: HashRing::new(options.replicas),
            options,
            peers: DashMap::new(),
            client,
        })
    }

    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    pub fn base_path(&self) -> &str {
        &self.options.base_path
    }

    /// Replace the member list. Ring positions and loads start over.
    pub fn set_peers<S: AsRef<str>>(&self, peers: &[S]) {
        let peers: Vec<&str> = peers.iter().map(|p| normalize_addr(p.as_ref())).collect();
        self.ring.add(&peers);
        self.peers.clear();
        for &addr in &peers {
            self.peers.insert(
                addr.to_string(),
                Arc::new(HttpPeer::new(self.client.clone(), addr, &self.options.base_path)),
            );
        }
        info!(count = peers.len(), "Peer set updated");
    }

    /// Members with their current loads
    pub fn hosts(&self) -> Vec<Host> {
        self.ring.hosts()
    }

    /// Owner of `key` from this node's ring, if any members are known
    pub fn owner(&self, key: &str) -> Option<String> {
        self.ring.get(key)
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn RemotePeer>> {
        let owner = self.ring.get(key)?;
        if owner == self.self_addr {
            return None;
        }
        // A member missing here is mid-rebuild; serve locally until it lands
        let peer = self.peers.get(&owner)?.clone();
        debug!(key, owner = %owner, "Key owned by peer");
        Some(peer)
    }

    fn increment_load(&self) {
        self.ring.increment(&self.self_addr);
    }

    fn decrement_load(&self) {
        self.ring.decrement(&self.self_addr);
    }

    fn load(&self) -> u64 {
        self.ring.load(&self.self_addr)
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_addr", &self.self_addr)
            .field("options", &self.options)
            .field("peers", &self.peers.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
