//! Fingerprint bucket
//!
//! Fixed array of four one-byte fingerprints. Zero marks an empty slot, so
//! fingerprints are always drawn from `1..=255`.

/// Number of fingerprint slots per bucket
pub const BUCKET_SIZE: usize = 4;

/// Fingerprint value reserved for "empty"
pub const EMPTY_FINGERPRINT: u8 = 0;

/// Four fingerprint slots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bucket([u8; BUCKET_SIZE]);

impl Bucket {
    /// Create an empty bucket
    pub const fn new() -> Self {
        Self([EMPTY_FINGERPRINT; BUCKET_SIZE])
    }

    /// Store `fp` in the first free slot. Returns `false` when full.
    pub fn insert(&mut self, fp: u8) -> bool {
        match self.0.iter().position(|&slot| slot == EMPTY_FINGERPRINT) {
            Some(i) => {
                self.0[i] = fp;
                true
            }
            None => false,
        }
    }

    /// Clear one occurrence of `fp`. Returns `false` when absent.
    pub fn delete(&mut self, fp: u8) -> bool {
        match self.index_of(fp) {
            Some(i) => {
                self.0[i] = EMPTY_FINGERPRINT;
                true
            }
            None => false,
        }
    }

    /// Slot holding `fp`, if any
    #[inline]
    pub fn index_of(&self, fp: u8) -> Option<usize> {
        self.0.iter().position(|&slot| slot == fp)
    }

    #[inline]
    pub fn contains(&self, fp: u8) -> bool {
        self.index_of(fp).is_some()
    }

    /// Replace the fingerprint at `slot`, returning the one displaced.
    #[inline]
    pub fn swap(&mut self, slot: usize, fp: u8) -> u8 {
        std::mem::replace(&mut self.0[slot], fp)
    }

    /// Number of occupied slots
    pub fn occupied(&self) -> usize {
        self.0.iter().filter(|&&slot| slot != EMPTY_FINGERPRINT).count()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_fills_then_rejects() {
        let mut bucket = Bucket::new();
        for fp in 1..=4 {
            assert!(bucket.insert(fp));
        }
        assert!(!bucket.insert(5));
        assert_eq!(bucket.occupied(), 4);
    }

    #[test]
    fn test_bucket_delete_frees_slot() {
        let mut bucket = Bucket::new();
        bucket.insert(7);
        bucket.insert(9);
        assert_eq!(bucket.index_of(9), Some(1));

        assert!(bucket.delete(7));
        assert!(!bucket.delete(7));
        assert!(!bucket.contains(7));

        // Freed slot is reused first
        assert!(bucket.insert(11));
        assert_eq!(bucket.index_of(11), Some(0));
    }

    #[test]
    fn test_bucket_duplicates_are_separate_slots() {
        let mut bucket = Bucket::new();
        bucket.insert(3);
        bucket.insert(3);
        assert_eq!(bucket.occupied(), 2);
        bucket.delete(3);
        assert!(bucket.contains(3));
    }

    #[test]
    fn test_bucket_swap() {
        let mut bucket = Bucket::new();
        bucket.insert(1);
        assert_eq!(bucket.swap(0, 42), 1);
        assert_eq!(bucket.index_of(42), Some(0));
    }
}
