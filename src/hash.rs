//! Seeded 64-bit hashing shared by the index, the filter and the ring.
//!
//! Every component must agree on the same function: the shard a key lands
//! in, the trie slot it occupies and the node that owns it all derive from
//! `key_hash`.

use std::hash::Hasher;

use twox_hash::XxHash64;

/// Seed used for key hashes (shard routing, trie index, ring positions).
pub const KEY_SEED: u64 = 0;

/// Seed used to derive cuckoo fingerprints, independent of `KEY_SEED`.
pub const FINGERPRINT_SEED: u64 = 1335;

/// Hash `bytes` with an explicit seed.
#[inline]
pub fn hash_with_seed(bytes: &[u8], seed: u64) -> u64 {
    let mut hasher = XxHash64::with_seed(seed);
    hasher.write(bytes);
    hasher.finish()
}

/// Hash of a cache key; the identity the index and shards are keyed by.
#[inline]
pub fn key_hash(key: &str) -> u64 {
    hash_with_seed(key.as_bytes(), KEY_SEED)
}

/// Convert mebibytes to bytes
pub fn mb_to_bytes(mb: u64) -> u64 {
    mb * 1024 * 1024
}

/// Convert bytes to whole mebibytes (truncating)
pub fn bytes_to_mb(bytes: u64) -> u64 {
    bytes / 1024 / 1024
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(key_hash("alpha"), key_hash("alpha"));
        assert_ne!(key_hash("alpha"), key_hash("beta"));
    }

    #[test]
    fn test_seeds_are_independent() {
        let data = b"same input";
        assert_ne!(
            hash_with_seed(data, KEY_SEED),
            hash_with_seed(data, FINGERPRINT_SEED)
        );
    }

    #[test]
    fn test_size_conversions() {
        assert_eq!(mb_to_bytes(2), 2 * 1024 * 1024);
        assert_eq!(bytes_to_mb(mb_to_bytes(64)), 64);
        assert_eq!(bytes_to_mb(1024 * 1024 - 1), 0);
    }
}
