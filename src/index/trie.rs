//! Trie index root
//!
//! The root is a full 64-slot array addressed by the low six bits of the
//! key. Colliding leaves push down into bitmap-compacted tables, each level
//! consuming the next six bits.

use crate::error::{Error, Result};

use super::table::{Removal, Table};

/// Bits of the key consumed per level
pub(super) const FANOUT_BITS: usize = 6;

/// Slots per level
pub(super) const ROOT_SLOTS: usize = 1 << FANOUT_BITS;

pub(super) const SLOT_MASK: u64 = (ROOT_SLOTS as u64) - 1;

/// Deepest inner table: `ceil((64 - 6) / 6)`. At this depth every bit of
/// the key has been consumed.
pub const MAX_DEPTH: usize = (64 - FANOUT_BITS).div_ceil(FANOUT_BITS);

/// A trie slot
#[derive(Debug)]
pub(super) enum Slot<V> {
    Empty,
    Leaf {
        key: u64,
        value: V,
    },
    Table(Box<Table<V>>),
}

/// Compact trie from a 64-bit key hash to a small copyable handle
#[derive(Debug)]
pub struct TrieIndex<V> {
    root: Vec<Slot<V>>,
    len: usize,
}

impl<V: Copy> Default for TrieIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Copy> TrieIndex<V> {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            root: (0..ROOT_SLOTS).map(|_| Slot::Empty).collect(),
            len: 0,
        }
    }

    /// Number of keys stored
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Look up `key`
    pub fn get(&self, key: u64) -> Result<V> {
        let found = match &self.root[(key & SLOT_MASK) as usize] {
            Slot::Leaf { key: k, value } if *k == key => Some(*value),
            Slot::Table(table) => table.get(key, 1),
            _ => None,
        };
        found.ok_or(Error::EntryNotFound)
    }

    /// Insert or replace `key`. Returns the replaced value, if any.
    pub fn set(&mut self, key: u64, value: V) -> Result<Option<V>> {
        let slot = &mut self.root[(key & SLOT_MASK) as usize];
        let replaced = match slot {
            Slot::Empty => {
                *slot = Slot::Leaf { key, value };
                None
            }
            Slot::Leaf { key: k, value: v } if *k == key => Some(std::mem::replace(v, value)),
            Slot::Leaf { key: k, value: v } => {
                let mut table = Table::with_leaf(*k, *v, 1);
                table.set(key, value, 1)?;
                *slot = Slot::Table(Box::new(table));
                None
            }
            Slot::Table(table) => table.set(key, value, 1)?,
        };
        if replaced.is_none() {
            self.len += 1;
        }
        Ok(replaced)
    }

    /// Remove `key`, returning its value
    pub fn delete(&mut self, key: u64) -> Result<V> {
        let slot = &mut self.root[(key & SLOT_MASK) as usize];
        let removed = match slot {
            Slot::Leaf { key: k, value } if *k == key => {
                let value = *value;
                *slot = Slot::Empty;
                value
            }
            Slot::Table(table) => {
                let (value, removal) = table.delete(key, 1)?;
                match removal {
                    Removal::Kept => {}
                    Removal::Emptied => *slot = Slot::Empty,
                    Removal::Collapse(k, v) => *slot = Slot::Leaf { key: k, value: v },
                }
                value
            }
            _ => return Err(Error::EntryNotFound),
        };
        self.len -= 1;
        Ok(removed)
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        for slot in self.root.iter_mut() {
            *slot = Slot::Empty;
        }
        self.len = 0;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    /// Keys that agree on the low `levels * 6` bits
    fn colliding(levels: usize, count: u64) -> Vec<u64> {
        let shift = levels * FANOUT_BITS;
        (0..count).map(|i| 0x2a | (i << shift)).collect()
    }

    #[test]
    fn test_max_depth() {
        assert_eq!(MAX_DEPTH, 10);
    }

    #[test]
    fn test_set_get_delete() {
        let mut index = TrieIndex::new();
        assert_eq!(index.set(42, 1usize).unwrap(), None);
        assert_eq!(index.get(42).unwrap(), 1);
        assert_eq!(index.len(), 1);

        assert_eq!(index.set(42, 2).unwrap(), Some(1));
        assert_eq!(index.len(), 1);

        assert_eq!(index.delete(42).unwrap(), 2);
        assert!(index.is_empty());
        assert_matches!(index.get(42), Err(Error::EntryNotFound));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let mut index: TrieIndex<usize> = TrieIndex::new();
        assert_matches!(index.delete(7), Err(Error::EntryNotFound));

        index.set(7, 0).unwrap();
        // Same root slot, different key
        assert_matches!(index.delete(7 + 64), Err(Error::EntryNotFound));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_root_collision_splits_into_table() {
        let mut index = TrieIndex::new();
        let keys = colliding(1, 5);
        for (i, key) in keys.iter().enumerate() {
            index.set(*key, i).unwrap();
        }
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(index.get(*key).unwrap(), i);
        }
        match &index.root[0x2a] {
            Slot::Table(table) => assert_eq!(table.child_count(), 5),
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_deep_collision_chain() {
        let mut index = TrieIndex::new();
        // Identical in the low 60 bits: forces a chain of tables down to depth 10
        let a = 0x003f_ffff_ffff_ffffu64;
        let b = a | (1 << 60);
        index.set(a, 'a').unwrap();
        index.set(b, 'b').unwrap();
        assert_eq!(index.get(a).unwrap(), 'a');
        assert_eq!(index.get(b).unwrap(), 'b');

        assert_eq!(index.delete(a).unwrap(), 'a');
        assert_eq!(index.get(b).unwrap(), 'b');
        // Chain collapsed back into a root leaf
        assert_matches!(&index.root[(b & SLOT_MASK) as usize], Slot::Leaf { key, .. } if *key == b);
    }

    #[test]
    fn test_keys_differing_only_in_top_bits() {
        let mut index = TrieIndex::new();
        let a = 0x0fff_ffff_ffff_ffffu64;
        let b = 0xffff_ffff_ffff_ffffu64;
        index.set(a, 1).unwrap();
        index.set(b, 2).unwrap();
        assert_eq!(index.get(a).unwrap(), 1);
        assert_eq!(index.get(b).unwrap(), 2);
    }

    #[test]
    fn test_compaction_keeps_order() {
        let mut index = TrieIndex::new();
        // Same root slot, children inserted out of order
        for i in [9u64, 3, 60, 0, 31] {
            index.set((i << 6) | 5, i).unwrap();
        }
        for i in [9u64, 3, 60, 0, 31] {
            assert_eq!(index.get((i << 6) | 5).unwrap(), i);
        }
        index.delete((3 << 6) | 5).unwrap();
        index.delete((60 << 6) | 5).unwrap();
        for i in [9u64, 0, 31] {
            assert_eq!(index.get((i << 6) | 5).unwrap(), i);
        }
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_clear() {
        let mut index = TrieIndex::new();
        for key in 0..1000u64 {
            index.set(key.wrapping_mul(0x9e37_79b9_7f4a_7c15), key).unwrap();
        }
        assert_eq!(index.len(), 1000);
        index.clear();
        assert!(index.is_empty());
        assert_matches!(index.get(0), Err(Error::EntryNotFound));
    }

    #[test]
    fn test_many_random_keys() {
        let mut index = TrieIndex::new();
        let keys: Vec<u64> = (0..10_000u64)
            .map(|i| crate::hash::hash_with_seed(&i.to_le_bytes(), 0))
            .collect();
        for (i, key) in keys.iter().enumerate() {
            index.set(*key, i).unwrap();
        }
        for (i, key) in keys.iter().enumerate().step_by(2) {
            assert_eq!(index.delete(*key).unwrap(), i);
        }
        for (i, key) in keys.iter().enumerate() {
            if i % 2 == 0 {
                assert!(index.get(*key).is_err());
            } else {
                assert_eq!(index.get(*key).unwrap(), i);
            }
        }
    }
}
