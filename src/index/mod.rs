//! Compact Trie Index
//!
//! Nearly O(1), memory-frugal map from a 64-bit key hash to a recency-list
//! node id. Inner tables store only occupied slots.
//!
//! # Layout
//!
//! ```text
//!   root [64 slots] ── bits 0..6
//!     │
//!     └─ Table { bitmap, children } ── bits 6..12
//!          │  offset = popcount(bitmap & (bit - 1))
//!          └─ Table ... ── up to depth 10 (bits 60..64)
//! ```
//!
//! Leaves hold the full key, so a lookup that lands on a leaf only matches
//! when every bit agrees.

mod table;
mod trie;

pub use trie::{TrieIndex, MAX_DEPTH};
