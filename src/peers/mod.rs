//! Peer routing seams
//!
//! The cache asks a [`PeerPicker`] who owns a key. A returned [`RemotePeer`]
//! means another node owns it and the operation is forwarded there; `None`
//! means this node owns it. Load hooks feed the bounded-load ring.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Decides key ownership across the cluster
pub trait PeerPicker: Send + Sync {
    /// Remote owner of `key`, or `None` when the key is local
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn RemotePeer>>;

    /// Record one more entry stored on this node
    fn increment_load(&self);

    /// Record one entry leaving this node
    fn decrement_load(&self);

    /// Entries currently attributed to this node
    fn load(&self) -> u64;
}

/// One network round trip to the node that owns a key
#[async_trait]
pub trait RemotePeer: Send + Sync {
    /// Address used in logs
    fn addr(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Bytes>;

    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Single-node routing: every key is local and load is not tracked
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPeers;

impl PeerPicker for NoPeers {
    fn pick_peer(&self, _key: &str) -> Option<Arc<dyn RemotePeer>> {
        None
    }

    fn increment_load(&self) {}

    fn decrement_load(&self) {}

    fn load(&self) -> u64 {
        0
    }
}
