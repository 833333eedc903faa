//! ringcache - Distributed In-Memory Key/Value Cache
//!
//! Each node keeps a shard-partitioned local store with admission filtering
//! and recency/frequency-aware eviction. Nodes share a bounded-load
//! consistent-hash ring so every key has exactly one owner, and forward
//! operations for keys they do not own.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── node ─────────────────────────────┐
//! │  REST API ──► Cache ──► ring owner? ──► HttpPeer ──► other node │
//! │                 │                                              │
//! │                 ▼ local                                        │
//! │   CuckooFilter ◄┤ Shard[hash & mask] ─ Lrfu ─ TrieIndex        │
//! │                 │        ▲                                     │
//! │                 └─ eviction hook ─► filter delete, ring load   │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`filter`] - Cuckoo admission filter
//! - [`index`] - Compact trie from key hash to list node
//! - [`policy`] - Recency list and the LRFU eviction policy
//! - [`cache`] - Entry framing, shards and the cache orchestrator
//! - [`ring`] - Consistent hash ring with bounded load
//! - [`peers`] - Routing seams between the cache and the cluster
//! - [`transport`] - HTTP peer protocol and its binary envelope
//! - [`cluster`] - Membership feed into the peer pool
//! - [`server`] - REST API and the shared accept loop
//! - [`config`] - YAML configuration
//! - [`metrics`] - Prometheus exposition
//! - [`error`] - Error types

pub mod cache;
pub mod cluster;
pub mod config;
pub mod error;
pub mod filter;
pub mod hash;
pub mod index;
pub mod metrics;
pub mod peers;
pub mod policy;
pub mod ring;
pub mod server;
pub mod transport;

// Re-export commonly used types
pub use cache::{Cache, CacheConfig, Stats};
pub use error::{Error, Result};
pub use filter::{CuckooFilter, FilterStats};
pub use peers::{NoPeers, PeerPicker, RemotePeer};
pub use ring::HashRing;
