//! Bitmap-compacted inner table
//!
//! An inner table has 64 logical slots but stores only the occupied ones.
//! Bit `i` of `bitmap` says whether logical slot `i` is present; its
//! position in `children` is the number of set bits below `i`.

use crate::error::{Error, Result};

use super::trie::{Slot, FANOUT_BITS, MAX_DEPTH, SLOT_MASK};

#[derive(Debug)]
pub(super) struct Table<V> {
    bitmap: u64,
    children: Vec<Slot<V>>,
}

/// Outcome of a delete one level down, telling the parent how to tidy up
pub(super) enum Removal<V> {
    /// Table still holds more than one child
    Kept,
    /// Table is now empty and can be dropped
    Emptied,
    /// Table holds a single leaf that can move up into the parent slot
    Collapse(u64, V),
}

#[inline]
fn logical_slot(key: u64, depth: usize) -> u64 {
    (key >> (FANOUT_BITS * depth)) & SLOT_MASK
}

impl<V: Copy> Table<V> {
    /// New table at `depth` holding a single leaf
    pub(super) fn with_leaf(key: u64, value: V, depth: usize) -> Self {
        Self {
            bitmap: 1u64 << logical_slot(key, depth),
            children: vec![Slot::Leaf { key, value }],
        }
    }

    #[inline]
    fn locate(&self, key: u64, depth: usize) -> (u64, usize) {
        let flag = 1u64 << logical_slot(key, depth);
        let offset = (self.bitmap & (flag - 1)).count_ones() as usize;
        (flag, offset)
    }

    pub(super) fn get(&self, key: u64, depth: usize) -> Option<V> {
        let (flag, offset) = self.locate(key, depth);
        if self.bitmap & flag == 0 {
            return None;
        }
        match &self.children[offset] {
            Slot::Leaf { key: k, value } if *k == key => Some(*value),
            Slot::Table(deeper) if depth < MAX_DEPTH => deeper.get(key, depth + 1),
            _ => None,
        }
    }

    /// Insert or replace. Returns the replaced value, if any.
    pub(super) fn set(&mut self, key: u64, value: V, depth: usize) -> Result<Option<V>> {
        let (flag, offset) = self.locate(key, depth);
        if self.bitmap & flag == 0 {
            self.children.insert(offset, Slot::Leaf { key, value });
            self.bitmap |= flag;
            return Ok(None);
        }

        match &mut self.children[offset] {
            Slot::Leaf { key: k, value: v } if *k == key => Ok(Some(std::mem::replace(v, value))),
            Slot::Leaf { key: k, value: v } => {
                if depth + 1 > MAX_DEPTH {
                    return Err(Error::DepthExceeded);
                }
                let mut deeper = Table::with_leaf(*k, *v, depth + 1);
                deeper.set(key, value, depth + 1)?;
                self.children[offset] = Slot::Table(Box::new(deeper));
                Ok(None)
            }
            Slot::Table(deeper) => {
                if depth + 1 > MAX_DEPTH {
                    return Err(Error::DepthExceeded);
                }
                deeper.set(key, value, depth + 1)
            }
            Slot::Empty => unreachable!("compacted tables never store empty slots"),
        }
    }

    /// Remove `key`, returning its value and how the parent should tidy up.
    pub(super) fn delete(&mut self, key: u64, depth: usize) -> Result<(V, Removal<V>)> {
        let (flag, offset) = self.locate(key, depth);
        if self.bitmap & flag == 0 {
            return Err(Error::EntryNotFound);
        }

        let removed = match &mut self.children[offset] {
            Slot::Leaf { key: k, value } if *k == key => {
                let value = *value;
                self.children.remove(offset);
                self.bitmap &= !flag;
                value
            }
            Slot::Table(deeper) if depth < MAX_DEPTH => {
                let (value, removal) = deeper.delete(key, depth + 1)?;
                match removal {
                    Removal::Kept => {}
                    Removal::Emptied => {
                        self.children.remove(offset);
                        self.bitmap &= !flag;
                    }
                    Removal::Collapse(k, v) => {
                        self.children[offset] = Slot::Leaf { key: k, value: v };
                    }
                }
                value
            }
            _ => return Err(Error::EntryNotFound),
        };

        let removal = match self.children.as_slice() {
            [] => Removal::Emptied,
            [Slot::Leaf { key, value }] => Removal::Collapse(*key, *value),
            _ => Removal::Kept,
        };
        Ok((removed, removal))
    }

    #[cfg(test)]
    pub(super) fn child_count(&self) -> usize {
        self.children.len()
    }
}
