//! Compact sets of binding indices.
//!
//! Records use a [`BindingSet`] as their dirty set: the bindings assigned
//! since the last successful insert or flush.

/// A bitset over the binding indices `0..capacity` of one record class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingSet {
    capacity: usize,
    bits: Box<[u64]>,
}

impl BindingSet {
    /// Create an empty set for a class with `capacity` bindings.
    pub fn empty(capacity: usize) -> Self {
        Self {
            capacity,
            bits: vec![0u64; capacity.div_ceil(64)].into_boxed_slice(),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Adds `idx`; returns `true` if it was not present before.
    ///
    /// Indices outside `0..capacity` are ignored.
    pub fn insert(&mut self, idx: usize) -> bool {
        if idx >= self.capacity {
            return false;
        }
        let (word, bit) = (idx / 64, 1u64 << (idx % 64));
        match self.bits.get_mut(word) {
            Some(w) if *w & bit == 0 => {
                *w |= bit;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, idx: usize) {
        if let Some(w) = self.bits.get_mut(idx / 64) {
            *w &= !(1u64 << (idx % 64));
        }
    }

    pub fn contains(&self, idx: usize) -> bool {
        idx < self.capacity
            && self
                .bits
                .get(idx / 64)
                .is_some_and(|w| w & (1u64 << (idx % 64)) != 0)
    }

    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Members in ascending index order, which is declaration order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.capacity).filter(|idx| self.contains(*idx))
    }
}
