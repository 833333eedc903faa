//! Cluster membership feed
//!
//! Turns raw member lists (static nodes, or whatever a discovery layer
//! reports) into ring updates. The pool is only rebuilt when the sorted,
//! deduplicated set actually changes, since a rebuild resets every load.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::transport::{normalize_addr, HttpPool};

/// Pushes member changes into an [`HttpPool`]
pub struct Membership {
    pool: Arc<HttpPool>,
    current: Mutex<Vec<String>>,
}

impl Membership {
    pub fn new(pool: Arc<HttpPool>) -> Self {
        Self {
            pool,
            current: Mutex::new(Vec::new()),
        }
    }

    /// Apply a member list. Returns whether the pool was rebuilt.
    pub fn update<I, S>(&self, members: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next: Vec<String> = members
            .into_iter()
            .map(Into::into)
            .map(|addr: String| normalize_addr(&addr).to_string())
            .filter(|addr| !addr.is_empty())
            .collect();
        next.sort();
        next.dedup();

        let mut current = self.current.lock();
        if *current == next {
            return false;
        }

        info!(self_addr = self.pool.self_addr(), peers = ?next, "Membership changed");
        self.pool.set_peers(next.as_slice());
        *current = next;
        true
    }

    /// Members last pushed to the pool
    pub fn members(&self) -> Vec<String> {
        self.current.lock().clone()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::PeerPicker;
    use crate::transport::PoolOptions;

    fn membership() -> (Arc<HttpPool>, Membership) {
        let pool = Arc::new(HttpPool::new("http://10.0.0.1:9000", PoolOptions::default()).unwrap());
        (pool.clone(), Membership::new(pool))
    }

    #[test]
    fn test_dedup_and_sort() {
        let (_, membership) = membership();
        assert!(membership.update([
            "http://10.0.0.2:9000",
            "http://10.0.0.1:9000/",
            "http://10.0.0.2:9000",
            "",
        ]));
        assert_eq!(
            membership.members(),
            vec!["http://10.0.0.1:9000", "http://10.0.0.2:9000"]
        );
    }

    #[test]
    fn test_unchanged_set_keeps_loads() {
        let (pool, membership) = membership();
        membership.update(["http://10.0.0.1:9000", "http://10.0.0.2:9000"]);
        pool.increment_load();

        // Same set in another order is not a change
        assert!(!membership.update(["http://10.0.0.2:9000", "http://10.0.0.1:9000"]));
        assert_eq!(pool.load(), 1);

        assert!(membership.update(["http://10.0.0.1:9000"]));
        assert_eq!(pool.load(), 0);
    }
}
