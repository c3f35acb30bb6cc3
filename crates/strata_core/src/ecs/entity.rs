//! # Entity Identity
//!
//! Entities are opaque 64-bit identifiers. The engine only compares and
//! hashes them; how they are manufactured is delegated to an
//! [`EntityIdGenerator`].

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::store::ArchetypeId;

/// Unique identifier for an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Null/invalid entity ID. Never handed out by a generator.
    pub const NULL: Self = Self(u64::MAX);

    /// Wraps a raw identifier.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Source of fresh entity identifiers.
///
/// Implementations must not return the same id twice during the lifetime of
/// the world that owns them. A world re-draws when a generator happens to
/// return [`EntityId::NULL`] or an id that is still alive.
pub trait EntityIdGenerator {
    /// Produces the next identifier.
    fn generate(&mut self) -> EntityId;
}

/// Hands out `1, 2, 3, ...`.
#[derive(Clone, Debug)]
pub struct SequentialIdGenerator {
    next: u64,
}

impl SequentialIdGenerator {
    /// Creates a generator whose first id is `start`.
    #[must_use]
    pub const fn starting_at(start: u64) -> Self {
        Self { next: start }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl EntityIdGenerator for SequentialIdGenerator {
    #[inline]
    fn generate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// Uniformly random 64-bit ids from a seeded ChaCha stream.
///
/// The same seed always yields the same id sequence.
#[derive(Clone, Debug)]
pub struct RandomIdGenerator {
    rng: ChaCha8Rng,
}

impl RandomIdGenerator {
    /// Creates a generator from a seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl EntityIdGenerator for RandomIdGenerator {
    #[inline]
    fn generate(&mut self) -> EntityId {
        EntityId(self.rng.gen())
    }
}

/// Where an entity's row lives.
///
/// `archetype` is `None` while the entity is unattached (created but holding
/// no components). The pair is only meaningful until the next structural
/// change of that archetype or of the entity itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityLocation {
    /// Owning archetype, resolved through the archetype store.
    pub archetype: Option<ArchetypeId>,
    /// Row inside the owning archetype.
    pub row: usize,
}

impl EntityLocation {
    /// Location of an entity with no components.
    pub const UNATTACHED: Self = Self {
        archetype: None,
        row: 0,
    };

    /// Location of a resident entity.
    #[inline]
    #[must_use]
    pub const fn resident(archetype: ArchetypeId, row: usize) -> Self {
        Self {
            archetype: Some(archetype),
            row,
        }
    }

    /// Whether the entity currently owns a row.
    #[inline]
    #[must_use]
    pub const fn is_resident(&self) -> bool {
        self.archetype.is_some()
    }
}
