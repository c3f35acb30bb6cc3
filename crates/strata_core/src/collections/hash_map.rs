//! # Open-Addressing Hash Map
//!
//! Exact-key associative container used for the entity location index and
//! the signature → archetype lookup.
//!
//! ## Layout
//!
//! ```text
//! nodes: [(k0, v0), (k1, v1), (k2, v2)]          <- dense, iteration order
//! slots: [ _ | 2 | x | 0 | _ | _ | 1 | _ | _ ]    <- sparse, 3x larger
//!          _ = empty, x = tombstone, n = node index (+ cached hash)
//! ```
//!
//! Removal swaps the doomed node with the last one so `nodes` never has
//! holes; the slot that pointed at the last node is repointed and the doomed
//! slot becomes a tombstone. Lookups walk through tombstones and stop at the
//! first empty slot.
//!
//! ## Sizing
//!
//! - Grow 3x when live entries exceed a third of the slots.
//! - Shrink 3x (never below the initial size) when live entries drop under a
//!   ninth of the slots, releasing spare node capacity as well.
//! - Rehash in place when tombstones exceed a third of the slots.
//!
//! Rehashing rebuilds `slots` only; node order is left untouched.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// Growth/shrink multiplier and load denominator.
const REHASH_FACTOR: usize = 3;

/// Slot count of a fresh map.
const MIN_SLOTS: usize = REHASH_FACTOR;

/// Probe sequence used on collision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStrategy {
    /// `h + i`
    Linear,
    /// `h + i²`
    Quadratic,
    /// `h + i * (7 - h % 7)`
    #[default]
    DoubleHash,
}

impl ProbeStrategy {
    const PRIME_FACTOR: u64 = 7;

    /// Unreduced position for the `attempt`-th probe. Attempt 0 is the home slot.
    #[inline]
    fn offset(self, hash: u64, attempt: u64) -> u64 {
        match self {
            Self::Linear => hash.wrapping_add(attempt),
            Self::Quadratic => hash.wrapping_add(attempt.wrapping_mul(attempt)),
            Self::DoubleHash => {
                let step = Self::PRIME_FACTOR - hash % Self::PRIME_FACTOR;
                hash.wrapping_add(attempt.wrapping_mul(step))
            }
        }
    }

    /// Slot positions to inspect for `hash`, in order.
    ///
    /// The strategy's own sequence may cycle before touching every slot
    /// (e.g. a double-hash step sharing a factor with the slot count), so it
    /// is followed by a linear sweep from the home slot. Insertions and
    /// lookups walk the same sequence, which keeps them consistent.
    fn positions(self, hash: u64, slot_count: usize) -> impl Iterator<Item = usize> {
        let n = slot_count as u64;
        let home = hash % n;
        // Lossless: every value is reduced modulo `slot_count`.
        #[allow(clippy::cast_possible_truncation)]
        let strategy = (0..n).map(move |attempt| (self.offset(hash, attempt) % n) as usize);
        #[allow(clippy::cast_possible_truncation)]
        let sweep = (0..n).map(move |k| ((home + k) % n) as usize);
        strategy.chain(sweep)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Empty,
    Tombstone,
    Occupied { node: usize, hash: u64 },
}

/// Open-addressing hash map with a dense node array.
///
/// References returned by lookups are invalidated by any insertion or
/// removal; the borrow checker enforces this.
#[derive(Clone)]
pub struct OpenHashMap<K, V, S = FxBuildHasher> {
    nodes: Vec<(K, V)>,
    slots: Vec<Slot>,
    tombstones: usize,
    hasher: S,
    probe: ProbeStrategy,
}

impl<K, V> OpenHashMap<K, V, FxBuildHasher> {
    /// Creates an empty map with the default probe strategy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_probe(ProbeStrategy::default())
    }

    /// Creates an empty map with the given probe strategy.
    #[must_use]
    pub fn with_probe(probe: ProbeStrategy) -> Self {
        Self::with_hasher(FxBuildHasher, probe)
    }
}

impl<K, V, S> OpenHashMap<K, V, S> {
    /// Creates an empty map with a custom hasher.
    #[must_use]
    pub fn with_hasher(hasher: S, probe: ProbeStrategy) -> Self {
        Self {
            nodes: Vec::new(),
            slots: vec![Slot::Empty; MIN_SLOTS],
            tombstones: 0,
            hasher,
            probe,
        }
    }

    /// Number of live entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the map holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocated node capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    /// Size of the sparse slot array.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The probe strategy in use.
    #[must_use]
    pub fn probe(&self) -> ProbeStrategy {
        self.probe
    }

    /// Removes every entry and returns to the initial slot count.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.slots.clear();
        self.slots.resize(MIN_SLOTS, Slot::Empty);
        self.tombstones = 0;
    }

    /// Iterates entries in dense (insertion, modulo swap-removal) order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.nodes.iter().map(|(k, v)| (k, v))
    }

    /// Iterates entries with mutable values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        self.nodes.iter_mut().map(|(k, v)| (&*k, v))
    }

    /// Iterates keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.nodes.iter().map(|(k, _)| k)
    }

    /// Iterates values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.nodes.iter().map(|(_, v)| v)
    }

    fn needs_expand(&self) -> bool {
        self.len() > self.slots.len() / REHASH_FACTOR
    }

    fn needs_shrink(&self) -> bool {
        self.slots.len() > MIN_SLOTS
            && self.len() * REHASH_FACTOR < self.slots.len() / REHASH_FACTOR
    }

    /// Too few empty slots left to end unsuccessful lookups early.
    fn needs_purge(&self) -> bool {
        self.tombstones > self.slots.len() / REHASH_FACTOR
    }

    fn free_position(slots: &[Slot], probe: ProbeStrategy, hash: u64) -> usize {
        probe
            .positions(hash, slots.len())
            .find(|&pos| !matches!(slots[pos], Slot::Occupied { .. }))
            .unwrap_or_else(|| unreachable!("load factor keeps at least one free slot"))
    }

    fn rehash(&mut self, slot_count: usize) {
        let mut slots = vec![Slot::Empty; slot_count];
        for slot in &self.slots {
            if let Slot::Occupied { hash, .. } = *slot {
                let pos = Self::free_position(&slots, self.probe, hash);
                slots[pos] = *slot;
            }
        }
        tracing::debug!(
            from = self.slots.len(),
            to = slot_count,
            entries = self.nodes.len(),
            "open hash map rehashed"
        );
        self.slots = slots;
        self.tombstones = 0;
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> OpenHashMap<K, V, S> {
    #[inline]
    fn hash_of<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.hasher.hash_one(key)
    }

    fn find_position<Q>(&self, key: &Q, hash: u64) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        for pos in self.probe.positions(hash, self.slots.len()) {
            match self.slots[pos] {
                Slot::Empty => return None,
                Slot::Tombstone => {}
                Slot::Occupied { node, hash: stored } => {
                    if stored == hash && self.nodes[node].0.borrow() == key {
                        return Some(pos);
                    }
                }
            }
        }
        None
    }

    fn find_node<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.nodes.is_empty() {
            return None;
        }
        let pos = self.find_position(key, self.hash_of(key))?;
        match self.slots[pos] {
            Slot::Occupied { node, .. } => Some(node),
            _ => None,
        }
    }

    /// Inserts `value` under `key`, returning the previous value if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_of(&key);
        if let Some(pos) = self.find_position(&key, hash) {
            if let Slot::Occupied { node, .. } = self.slots[pos] {
                return Some(std::mem::replace(&mut self.nodes[node].1, value));
            }
        }

        let pos = Self::free_position(&self.slots, self.probe, hash);
        if self.slots[pos] == Slot::Tombstone {
            self.tombstones -= 1;
        }
        self.slots[pos] = Slot::Occupied {
            node: self.nodes.len(),
            hash,
        };
        self.nodes.push((key, value));

        if self.needs_expand() {
            self.rehash(self.slots.len() * REHASH_FACTOR);
        }
        None
    }

    /// Returns the value for `key`, if present.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_node(key).map(|node| &self.nodes[node].1)
    }

    /// Returns the value for `key` mutably, if present.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_node(key).map(|node| &mut self.nodes[node].1)
    }

    /// Checked lookup.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::KeyNotFound`] if `key` is absent.
    pub fn at<Q>(&self, key: &Q) -> EcsResult<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).ok_or(EcsError::KeyNotFound)
    }

    /// Checked mutable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::KeyNotFound`] if `key` is absent.
    pub fn at_mut<Q>(&mut self, key: &Q) -> EcsResult<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_mut(key).ok_or(EcsError::KeyNotFound)
    }

    /// Returns the stored entry for `key`, or `None` as the not-found sentinel.
    #[must_use]
    pub fn find<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_node(key).map(|node| {
            let (k, v) = &self.nodes[node];
            (k, v)
        })
    }

    /// True if `key` is present.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_node(key).is_some()
    }

    /// Returns the value for `key`, inserting `V::default()` first if absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let node = match self.find_node(&key) {
            Some(node) => node,
            None => {
                self.insert(key, V::default());
                self.nodes.len() - 1
            }
        };
        &mut self.nodes[node].1
    }

    /// Removes `key`, returning its value. Absent keys are a no-op.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.nodes.is_empty() {
            return None;
        }
        let pos = self.find_position(key, self.hash_of(key))?;
        let Slot::Occupied { node, .. } = self.slots[pos] else {
            return None;
        };

        let last = self.nodes.len() - 1;
        if node != last {
            let last_key = &self.nodes[last].0;
            let last_pos = self.find_position::<K>(last_key, self.hash_of(last_key));
            if let Some(last_pos) = last_pos {
                if let Slot::Occupied { node: moved, .. } = &mut self.slots[last_pos] {
                    *moved = node;
                }
            }
        }
        self.slots[pos] = Slot::Tombstone;
        self.tombstones += 1;
        let (_, value) = self.nodes.swap_remove(node);

        if self.needs_shrink() {
            self.rehash((self.slots.len() / REHASH_FACTOR).max(MIN_SLOTS));
            self.nodes.shrink_to_fit();
        } else if self.needs_purge() {
            self.rehash(self.slots.len());
        }
        Some(value)
    }

    /// Makes room for `additional` more entries, rehashing at most once.
    pub fn reserve(&mut self, additional: usize) {
        self.nodes.reserve(additional);
        let wanted = self.len() + additional;
        let mut slot_count = self.slots.len();
        while wanted > slot_count / REHASH_FACTOR {
            slot_count *= REHASH_FACTOR;
        }
        if slot_count != self.slots.len() {
            self.rehash(slot_count);
        }
    }
}

impl<K, V, S: Default> Default for OpenHashMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default(), ProbeStrategy::default())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for OpenHashMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> Extend<(K, V)> for OpenHashMap<K, V, S> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Hash + Eq, V> FromIterator<(K, V)> for OpenHashMap<K, V, FxBuildHasher> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Deterministic xorshift stream.
    fn xorshift(seed: u64) -> impl Iterator<Item = u64> {
        let mut state = seed;
        std::iter::repeat_with(move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        })
    }

    #[test]
    fn test_insert_get_remove() {
        let mut map = OpenHashMap::new();
        assert_eq!(map.insert(1u64, "one"), None);
        assert_eq!(map.insert(2, "two"), None);
        assert_eq!(map.insert(1, "uno"), Some("one"));

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&1), Some(&"uno"));
        assert_eq!(map.find(&2), Some((&2, &"two")));
        assert_eq!(map.find(&3), None);

        assert_eq!(map.remove(&1), Some("uno"));
        assert_eq!(map.remove(&1), None);
        assert!(!map.contains_key(&1));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_at_reports_missing_key() {
        let mut map: OpenHashMap<u32, u32> = OpenHashMap::new();
        assert_eq!(map.at(&9), Err(EcsError::KeyNotFound));
        map.insert(9, 90);
        assert_eq!(map.at(&9), Ok(&90));
        *map.at_mut(&9).unwrap() += 1;
        assert_eq!(map.get(&9), Some(&91));
    }

    #[test]
    fn test_get_or_insert_default() {
        let mut map: OpenHashMap<&str, u32> = OpenHashMap::new();
        *map.get_or_insert_default("hits") += 1;
        *map.get_or_insert_default("hits") += 1;
        assert_eq!(map.get("hits"), Some(&2));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_growth_and_shrink_keep_entries() {
        let mut map = OpenHashMap::new();
        for i in 0..1000u64 {
            map.insert(i, i * 10);
        }
        assert!(map.slot_count() >= 3 * map.len());
        for i in 0..1000u64 {
            assert_eq!(map.get(&i), Some(&(i * 10)));
        }

        let grown = map.slot_count();
        for i in 0..990u64 {
            assert_eq!(map.remove(&i), Some(i * 10));
        }
        assert!(map.slot_count() < grown);
        for i in 990..1000u64 {
            assert_eq!(map.get(&i), Some(&(i * 10)));
        }

        for i in 990..1000u64 {
            map.remove(&i);
        }
        assert!(map.is_empty());
        assert_eq!(map.slot_count(), MIN_SLOTS);
    }

    /// Sends every key to the same home slot.
    #[derive(Clone, Copy, Default)]
    struct Collide;

    struct CollideHasher;

    impl std::hash::Hasher for CollideHasher {
        fn finish(&self) -> u64 {
            42
        }

        fn write(&mut self, _bytes: &[u8]) {}
    }

    impl BuildHasher for Collide {
        type Hasher = CollideHasher;

        fn build_hasher(&self) -> CollideHasher {
            CollideHasher
        }
    }

    #[test]
    fn test_lookup_walks_past_tombstones() {
        for probe in [
            ProbeStrategy::Linear,
            ProbeStrategy::Quadratic,
            ProbeStrategy::DoubleHash,
        ] {
            let mut map = OpenHashMap::with_hasher(Collide, probe);
            for i in 0..8u64 {
                map.insert(i, i);
            }
            map.remove(&3);
            map.remove(&5);
            for i in (0..8u64).filter(|i| *i != 3 && *i != 5) {
                assert_eq!(map.get(&i), Some(&i), "{probe:?}");
            }

            // Reuses a tombstone without hiding later entries.
            map.insert(100, 100);
            assert_eq!(map.get(&100), Some(&100));
            assert_eq!(map.get(&7), Some(&7));
            assert_eq!(map.get(&3), None);
            assert_eq!(map.len(), 7);
        }
    }

    #[test]
    fn test_churn_purges_tombstones() {
        let mut map = OpenHashMap::new();
        for i in 0..20u64 {
            map.insert(i, i);
        }
        let slots = map.slot_count();
        for key in 20..2020u64 {
            map.insert(key, key);
            map.remove(&(key - 20));
            assert!(map.tombstones <= map.slot_count() / REHASH_FACTOR);
        }
        assert_eq!(map.len(), 20);
        assert_eq!(map.slot_count(), slots);
        assert_eq!(map.get(&2019), Some(&2019));
        assert_eq!(map.get(&1999), None);
    }

    #[test]
    fn test_remove_by_borrowed_key_relinks_last_node() {
        let mut map: OpenHashMap<String, usize> = OpenHashMap::new();
        for i in 0..12 {
            map.insert(format!("k{i}"), i);
        }
        assert_eq!(map.remove("k0"), Some(0));
        assert_eq!(map.remove("k5"), Some(5));
        assert_eq!(map.remove("k5"), None);
        assert_eq!(map.len(), 10);
        for i in (1..12).filter(|&i| i != 5) {
            assert_eq!(map.get(format!("k{i}").as_str()), Some(&i));
        }
    }

    #[test]
    fn test_removal_keeps_nodes_dense() {
        let mut map = OpenHashMap::new();
        for i in 0..10u32 {
            map.insert(i, i);
        }
        map.remove(&0);
        // Last node moved into the hole.
        assert_eq!(map.iter().next(), Some((&9, &9)));
        assert_eq!(map.get(&9), Some(&9));
        assert_eq!(map.len(), 9);
    }

    #[test]
    fn test_matches_std_hash_map_for_every_probe() {
        for probe in [
            ProbeStrategy::Linear,
            ProbeStrategy::Quadratic,
            ProbeStrategy::DoubleHash,
        ] {
            let mut ours = OpenHashMap::with_probe(probe);
            let mut reference = HashMap::new();

            for value in xorshift(0xDEAD_BEEF).take(5000) {
                let key = value % 512;
                if value % 3 == 0 {
                    assert_eq!(ours.remove(&key), reference.remove(&key), "{probe:?}");
                } else {
                    assert_eq!(ours.insert(key, value), reference.insert(key, value), "{probe:?}");
                }
                assert_eq!(ours.len(), reference.len());
            }

            for key in 0..512u64 {
                assert_eq!(ours.get(&key), reference.get(&key), "{probe:?} key {key}");
            }
        }
    }

    #[test]
    fn test_reserve_then_clear() {
        let mut map: OpenHashMap<u64, ()> = OpenHashMap::new();
        map.reserve(100);
        assert!(map.slot_count() >= 300);
        assert!(map.capacity() >= 100);
        map.insert(1, ());
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.slot_count(), MIN_SLOTS);
    }

    #[test]
    fn test_collect_and_iterate() {
        let map: OpenHashMap<u8, u8> = (0..5).map(|i| (i, i * 2)).collect();
        let mut pairs: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(0, 0), (1, 2), (2, 4), (3, 6), (4, 8)]);
        assert_eq!(map.keys().count(), 5);
        assert_eq!(map.values().map(|v| u32::from(*v)).sum::<u32>(), 20);
    }
}
