//! # Signatures
//!
//! Fixed-width bitmask over [`ComponentId`]s. One bit per registered kind,
//! packed into `u64` blocks.
//!
//! ```text
//! block 0: [ id 0 .. id 63  ]
//! block 1: [ id 64 .. id 127 ]
//! ...
//! ```

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use super::component::{ComponentId, MAX_COMPONENT_COUNT};

/// Bits per block.
const BLOCK_BITS: usize = 64;

/// Blocks needed to cover [`MAX_COMPONENT_COUNT`].
const BLOCK_COUNT: usize = MAX_COMPONENT_COUNT.div_ceil(BLOCK_BITS);

/// The set of component kinds an archetype stores or a query requires.
///
/// Equality and hashing are structural over every block, so equal sets are
/// interchangeable map keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    blocks: [u64; BLOCK_COUNT],
}

impl Signature {
    /// The empty set.
    pub const EMPTY: Self = Self {
        blocks: [0; BLOCK_COUNT],
    };

    /// Builds a signature with exactly the given ids set.
    #[must_use]
    pub fn from_ids(ids: &[ComponentId]) -> Self {
        let mut out = Self::EMPTY;
        for &id in ids {
            out.set(id, true);
        }
        out
    }

    #[inline]
    fn locate(id: ComponentId) -> (usize, u64) {
        let id = id as usize;
        debug_assert!(id < MAX_COMPONENT_COUNT, "component id {id} out of range");
        (id / BLOCK_BITS, 1u64 << (id % BLOCK_BITS))
    }

    /// Sets or clears the bit for `id`.
    #[inline]
    pub fn set(&mut self, id: ComponentId, value: bool) {
        let (block, mask) = Self::locate(id);
        if value {
            self.blocks[block] |= mask;
        } else {
            self.blocks[block] &= !mask;
        }
    }

    /// Returns a copy with `id` added.
    #[inline]
    #[must_use]
    pub fn with(mut self, id: ComponentId) -> Self {
        self.set(id, true);
        self
    }

    /// Returns a copy with `id` removed.
    #[inline]
    #[must_use]
    pub fn without(mut self, id: ComponentId) -> Self {
        self.set(id, false);
        self
    }

    /// Tests the bit for `id`.
    #[inline]
    #[must_use]
    pub fn test(&self, id: ComponentId) -> bool {
        let (block, mask) = Self::locate(id);
        self.blocks[block] & mask != 0
    }

    /// Superset test: every bit set in `other` is also set in `self`.
    #[inline]
    #[must_use]
    pub fn includes(&self, other: &Self) -> bool {
        self.blocks
            .iter()
            .zip(other.blocks.iter())
            .all(|(mine, theirs)| mine | theirs == *mine)
    }

    /// Non-disjoint test: the two sets share at least one bit.
    #[inline]
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.blocks
            .iter()
            .zip(other.blocks.iter())
            .any(|(mine, theirs)| mine & theirs != 0)
    }

    /// Bitwise OR of two signatures.
    #[inline]
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut out = *self;
        out |= *other;
        out
    }

    /// True if any bit is set.
    #[inline]
    #[must_use]
    pub fn any(&self) -> bool {
        self.blocks.iter().any(|block| *block != 0)
    }

    /// True if no bit is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.any()
    }

    /// Number of set bits.
    #[must_use]
    pub fn count(&self) -> usize {
        self.blocks.iter().map(|block| block.count_ones() as usize).sum()
    }

    /// Iterates the set ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .flat_map(|(index, &block)| {
                let base = index * BLOCK_BITS;
                (0..BLOCK_BITS)
                    .filter(move |bit| block & (1u64 << bit) != 0)
                    // Lossless: bounded by MAX_COMPONENT_COUNT.
                    .map(move |bit| {
                        #[allow(clippy::cast_possible_truncation)]
                        let id = (base + bit) as ComponentId;
                        id
                    })
            })
    }
}

impl BitOr for Signature {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(&rhs)
    }
}

impl BitOrAssign for Signature {
    fn bitor_assign(&mut self, rhs: Self) {
        for (mine, theirs) in self.blocks.iter_mut().zip(rhs.blocks) {
            *mine |= theirs;
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_test() {
        let mut sig = Signature::EMPTY;
        assert!(sig.is_empty());
        sig.set(3, true);
        sig.set(700, true);
        assert!(sig.test(3));
        assert!(sig.test(700));
        assert!(!sig.test(4));
        sig.set(3, false);
        assert!(!sig.test(3));
        assert_eq!(sig.count(), 1);
    }

    #[test]
    fn test_includes_is_superset() {
        let big = Signature::from_ids(&[0, 1, 2, 130]);
        let small = Signature::from_ids(&[1, 130]);
        assert!(big.includes(&small));
        assert!(!small.includes(&big));
        assert!(big.includes(&Signature::EMPTY));
    }

    #[test]
    fn test_matches_is_non_disjoint() {
        let a = Signature::from_ids(&[1, 2]);
        let b = Signature::from_ids(&[2, 900]);
        let c = Signature::from_ids(&[5]);
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
        assert!(!a.matches(&Signature::EMPTY));
    }

    #[test]
    fn test_union_and_equality() {
        let a = Signature::from_ids(&[1]);
        let b = Signature::from_ids(&[65]);
        let both = a | b;
        assert_eq!(both, Signature::from_ids(&[65, 1]));
        assert_eq!(a.union(&a), a);
        assert_eq!(both.ids().collect::<Vec<_>>(), vec![1, 65]);
        assert_eq!(both.without(65), a);
    }
}
