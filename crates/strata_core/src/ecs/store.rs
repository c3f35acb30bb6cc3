//! # Archetype Store
//!
//! Owns every [`Archetype`] of a world and resolves signatures to them.
//!
//! Tables live in a `Vec` and are addressed by [`ArchetypeId`], an index that
//! stays valid for the lifetime of the store: tables are appended, never
//! removed or reordered (short of [`ArchetypeStore::clear`]). Empty tables
//! are kept around so a signature keeps resolving to the same instance.

use std::fmt;

use tracing::debug;

use super::archetype::Archetype;
use super::signature::Signature;
use crate::collections::OpenHashMap;

/// Stable handle to an archetype inside its store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// Handle for the table at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in a `u32`.
    #[inline]
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        let index = u32::try_from(index)
            .unwrap_or_else(|_| panic!("archetype index {index} overflows u32"));
        Self(index)
    }

    /// Position of the table in the store.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Signature-keyed collection of archetype tables.
#[derive(Clone, Default)]
pub struct ArchetypeStore {
    archetypes: Vec<Archetype>,
    by_signature: OpenHashMap<Signature, ArchetypeId>,
}

impl ArchetypeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tables, empty ones included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// True if no table has been created yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Table behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this store.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id.index()]
    }

    /// Mutable variant of [`ArchetypeStore::get`].
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this store.
    #[inline]
    pub fn get_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id.index()]
    }

    /// Handle of the table storing exactly `signature`, if one exists.
    #[must_use]
    pub fn find(&self, signature: &Signature) -> Option<ArchetypeId> {
        self.by_signature.get(signature).copied()
    }

    /// Handle of the table storing exactly `signature`, creating it with
    /// `make` on first request.
    ///
    /// # Panics
    ///
    /// Panics (in debug builds) if `make` builds a table with another
    /// signature.
    pub fn get_or_insert_with(
        &mut self,
        signature: Signature,
        make: impl FnOnce() -> Archetype,
    ) -> ArchetypeId {
        if let Some(id) = self.find(&signature) {
            return id;
        }
        let archetype = make();
        debug_assert_eq!(
            *archetype.signature(),
            signature,
            "archetype built for the wrong signature"
        );
        let id = ArchetypeId::from_index(self.archetypes.len());
        self.archetypes.push(archetype);
        self.by_signature.insert(signature, id);
        debug!(
            archetype = id.index(),
            components = signature.count(),
            "created archetype"
        );
        id
    }

    /// Two distinct tables at once, for migrating rows between them.
    ///
    /// # Panics
    ///
    /// Panics if `a == b`.
    pub fn pair_mut(&mut self, a: ArchetypeId, b: ArchetypeId) -> (&mut Archetype, &mut Archetype) {
        let (a, b) = (a.index(), b.index());
        assert_ne!(a, b, "cannot borrow archetype {a} twice");
        if a < b {
            let (low, high) = self.archetypes.split_at_mut(b);
            (&mut low[a], &mut high[0])
        } else {
            let (low, high) = self.archetypes.split_at_mut(a);
            (&mut high[0], &mut low[b])
        }
    }

    /// All tables in creation order.
    #[inline]
    #[must_use]
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    /// All tables in creation order, mutably.
    #[inline]
    pub fn archetypes_mut(&mut self) -> &mut [Archetype] {
        &mut self.archetypes
    }

    /// Iterates `(handle, table)` pairs in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ArchetypeId, &Archetype)> {
        self.archetypes
            .iter()
            .enumerate()
            .map(|(index, archetype)| (ArchetypeId::from_index(index), archetype))
    }

    /// Total rows across all tables.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.archetypes.iter().map(Archetype::len).sum()
    }

    /// Drops every table. Previously issued handles become invalid.
    pub fn clear(&mut self) {
        self.archetypes.clear();
        self.by_signature.clear();
    }
}

impl fmt::Debug for ArchetypeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.archetypes.iter()).finish()
    }
}
