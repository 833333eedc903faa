//! Property-Based Tests for Shard Accounting and Eviction Order
//!
//! # Test Properties
//!
//! 1. **Exact Byte Accounting**: a shard's running size equals the sum of the
//!    framed lengths of its resident entries after every operation
//! 2. **Least-Recent Victim**: on entry-count overflow the evicted key is the
//!    least recently touched one
//! 3. **No Stale Reads**: through the cache front end a key reads back as
//!    its last written value or as a miss, never an older value

#![cfg(test)]

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use proptest::prelude::*;

use super::engine::{Cache, CacheConfig};
use super::entry::framed_len;
use super::shard::Shard;
use crate::policy::{EvictionPolicy, Lrfu, DEFAULT_LAMBDA};

const KEYS: [&str; 8] = ["a", "bb", "ccc", "dddd", "e", "ff", "ggg", "hhhh"];

#[derive(Debug, Clone)]
enum Op {
    Set(usize, usize),
    Get(usize),
    Delete(usize),
}

// =============================================================================
// Property Strategies
// =============================================================================

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..KEYS.len(), 0..64usize).prop_map(|(k, len)| Op::Set(k, len)),
        1 => (0..KEYS.len()).prop_map(Op::Get),
        1 => (0..KEYS.len()).prop_map(Op::Delete),
    ]
}

fn resident_bytes(shard: &mut Shard) -> u64 {
    KEYS.iter()
        .filter_map(|key| {
            shard
                .get(key)
                .ok()
                .map(|value| framed_len(key.len(), value.len()) as u64)
        })
        .sum()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: size is exact across sets, overwrites, deletes and evictions.
    #[test]
    fn prop_exact_byte_accounting(
        ops in prop::collection::vec(op(), 1..200),
        max_size in 40u64..400,
        max_entries in 0usize..5,
    ) {
        let mut shard = Shard::new(0, max_size);
        shard.attach_policy(Box::new(Lrfu::new(max_entries, DEFAULT_LAMBDA)), None);

        for op in ops {
            match op {
                Op::Set(k, len) => { shard.set(KEYS[k], &vec![b'x'; len]).unwrap(); }
                Op::Get(k) => { let _ = shard.get(KEYS[k]); }
                Op::Delete(k) => { let _ = shard.delete(KEYS[k]); }
            }
            prop_assert_eq!(shard.size(), resident_bytes(&mut shard));
        }
    }

    /// Property: overflow always evicts the least recently touched key.
    #[test]
    fn prop_overflow_evicts_least_recent(
        touches in prop::collection::vec((0u64..10, any::<bool>()), 1..300),
        max_entries in 1usize..6,
    ) {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = evicted.clone();
        let mut policy = Lrfu::new(max_entries, DEFAULT_LAMBDA)
            .with_evicted_fn(Box::new(move |k, _| sink.lock().unwrap().push(k)));

        // Model: most recent at the back
        let mut model: Vec<u64> = Vec::new();

        for (key, write) in touches {
            let resident = model.contains(&key);
            if write {
                policy.set(key, Bytes::from_static(b"v")).unwrap();
            } else {
                policy.get(key);
                if !resident {
                    continue;
                }
            }
            model.retain(|k| *k != key);
            model.push(key);

            if model.len() > max_entries {
                let victim = model.remove(0);
                prop_assert_eq!(evicted.lock().unwrap().pop(), Some(victim));
            }
            prop_assert!(evicted.lock().unwrap().is_empty());
            prop_assert_eq!(policy.len(), model.len());
        }
    }

    /// Property: reads never observe an overwritten or deleted value.
    #[test]
    fn prop_no_stale_reads(
        ops in prop::collection::vec(op(), 1..150),
        max_entries in 1usize..4,
    ) {
        let cache = Cache::new(CacheConfig {
            shards: 2,
            max_bytes: 512,
            max_entries_per_shard: max_entries,
            ..CacheConfig::default()
        })
        .unwrap();
        let mut last: Vec<Option<Vec<u8>>> = vec![None; KEYS.len()];

        for (step, op) in ops.into_iter().enumerate() {
            match op {
                Op::Set(k, len) => {
                    let value = vec![(step % 251) as u8; len];
                    tokio_test::block_on(cache.set(KEYS[k], &value)).unwrap();
                    last[k] = Some(value);
                }
                Op::Delete(k) => {
                    let _ = tokio_test::block_on(cache.delete(KEYS[k]));
                    last[k] = None;
                }
                Op::Get(k) => match tokio_test::block_on(cache.get(KEYS[k])) {
                    Ok(value) => prop_assert_eq!(Some(value.to_vec()), last[k].clone()),
                    Err(e) => prop_assert!(e.is_not_found()),
                },
            }
        }
    }
}
