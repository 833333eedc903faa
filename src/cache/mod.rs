//! Local Cache Engine
//!
//! Shard-partitioned store composed from the admission filter, the trie
//! index and the LRFU policy.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!   get/set/del ─►│            Cache             │── owner elsewhere ─► RemotePeer
//!                 │  hash(key) & (shards - 1)    │
//!                 └──────┬────────────┬──────────┘
//!                        ▼            ▼
//!                 ┌──────────┐  ┌──────────┐
//!                 │ Shard 0  │  │ Shard N  │   Mutex each
//!                 │  Lrfu    │  │  Lrfu    │
//!                 │  Trie    │  │  Trie    │
//!                 └────┬─────┘  └──────────┘
//!                      │ eviction hook
//!                      ▼
//!               filter.delete + ring load decrement
//! ```

pub mod entry;
mod engine;
mod proptest;
mod shard;
mod stats;

pub use engine::{Cache, CacheConfig};
pub use shard::{EvictionHook, Shard};
pub use stats::{ShardStats, Stats};
