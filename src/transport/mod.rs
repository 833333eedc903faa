//! Peer Transport
//!
//! HTTP plumbing between cluster members: a ring-backed peer picker, a
//! `reqwest` client per member and the `hyper` handler that answers them.
//!
//! ```text
//!   node A                                   node B
//!   Cache ─► HttpPool.pick_peer ─► HttpPeer ──HTTP──► peer_service ─► Cache::*_local
//!                                  GET    <base><key> GetRequest    200 GetResponse
//!                                  PUT    <base><key> SetRequest    201
//!                                  DELETE <base><key> DeleteRequest 202
//! ```

mod client;
pub mod envelope;
mod handler;
mod pool;

pub use client::HttpPeer;
pub use handler::peer_service;
pub use pool::{normalize_addr, HttpPool, PoolOptions, DEFAULT_BASE_PATH};
