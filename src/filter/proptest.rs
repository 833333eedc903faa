//! Property-Based Tests for the Cuckoo Filter
//!
//! # Test Properties
//!
//! 1. **No False Negatives**: every key added while under half load is found
//! 2. **Count Tracking**: `len()` equals successful adds minus successful deletes
//! 3. **Delete Symmetry**: deleting each added key once empties the filter

#![cfg(test)]

use std::collections::HashSet;

use proptest::prelude::*;

use super::cuckoo::CuckooFilter;

// =============================================================================
// Property Strategies
// =============================================================================

/// Strategy for distinct keys, at most `max` of them.
fn distinct_keys(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[a-z0-9]{1,24}", 1..max)
        .prop_map(|set: HashSet<String>| set.into_iter().collect())
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: no false negatives while at most half of the slots are used.
    #[test]
    fn prop_no_false_negatives(keys in distinct_keys(512), seed in any::<u64>()) {
        let mut filter = CuckooFilter::with_seed(2048, seed);
        for key in &keys {
            prop_assert!(filter.add(key.as_bytes()));
        }
        for key in &keys {
            prop_assert!(filter.contains(key.as_bytes()), "false negative for {}", key);
        }
    }

    /// Property: the live counter tracks successful adds and deletes.
    #[test]
    fn prop_count_tracks_operations(
        keys in distinct_keys(256),
        delete_mask in prop::collection::vec(any::<bool>(), 256),
    ) {
        let mut filter = CuckooFilter::with_seed(1024, 42);
        let mut expected = 0u64;
        for key in &keys {
            if filter.add(key.as_bytes()) {
                expected += 1;
            }
        }
        for (key, delete) in keys.iter().zip(delete_mask.iter()) {
            if *delete && filter.delete(key.as_bytes()) {
                expected -= 1;
            }
        }
        prop_assert_eq!(filter.len(), expected);
    }

    /// Property: deleting every added key once leaves the filter empty.
    #[test]
    fn prop_delete_all_empties(keys in distinct_keys(256)) {
        let mut filter = CuckooFilter::with_seed(1024, 9);
        for key in &keys {
            prop_assert!(filter.add(key.as_bytes()));
        }
        for key in &keys {
            prop_assert!(filter.delete(key.as_bytes()));
        }
        prop_assert!(filter.is_empty());
    }
}
