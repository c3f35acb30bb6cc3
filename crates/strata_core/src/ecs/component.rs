//! # Component Kinds
//!
//! Components are plain data attached to entities. Every distinct Rust type
//! used as a component is given a small integer [`ComponentId`] by the
//! world's [`ComponentRegistry`], in the order the caller registers them.

use std::any::{type_name, TypeId};

use rustc_hash::FxHashMap;

use super::entity::EntityId;

/// Runtime identity of a component kind.
pub type ComponentId = u32;

/// Width of a [`Signature`](super::Signature) in bits.
///
/// Registering more distinct kinds than this is a configuration error.
pub const MAX_COMPONENT_COUNT: usize = 1024;

/// Id of the identity column every archetype carries.
///
/// The registry reserves it for [`EntityId`] at construction.
pub const ENTITY_COMPONENT_ID: ComponentId = 0;

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Clone`: entity duplication copies every value
/// - `Default`: migration moves a value out and leaves a default behind until
///   the stale row is erased
/// - `Send + Sync + 'static`: stored behind type-erased columns
///
/// Implemented for every type that satisfies the bounds.
pub trait Component: Clone + Default + Send + Sync + 'static {}

impl<T: Clone + Default + Send + Sync + 'static> Component for T {}

/// Assigns [`ComponentId`]s to component types.
///
/// Ids are handed out sequentially, so two programs that register the same
/// kinds in the same order observe the same ids.
#[derive(Clone, Debug)]
pub struct ComponentRegistry {
    /// `TypeId -> ComponentId`.
    by_type: FxHashMap<TypeId, ComponentId>,
    /// Type names indexed by `ComponentId`.
    names: Vec<&'static str>,
}

impl ComponentRegistry {
    /// Creates a registry holding only the identity kind.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            by_type: FxHashMap::default(),
            names: Vec::new(),
        };
        let id = registry.register::<EntityId>();
        debug_assert_eq!(id, ENTITY_COMPONENT_ID);
        registry
    }

    /// Returns the id of `T`, assigning the next free one on first use.
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_COMPONENT_COUNT`] kinds get registered.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        let next = self.names.len();
        let names = &mut self.names;
        *self.by_type.entry(TypeId::of::<T>()).or_insert_with(|| {
            assert!(
                next < MAX_COMPONENT_COUNT,
                "component limit of {MAX_COMPONENT_COUNT} exceeded while registering {}",
                type_name::<T>()
            );
            names.push(type_name::<T>());
            // Lossless: bounded by MAX_COMPONENT_COUNT.
            #[allow(clippy::cast_possible_truncation)]
            let id = next as ComponentId;
            id
        })
    }

    /// Returns the id of `T` if it has been registered.
    #[inline]
    #[must_use]
    pub fn id_of<T: Component>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the type name registered under `id`.
    #[must_use]
    pub fn name_of(&self, id: ComponentId) -> Option<&'static str> {
        self.names.get(id as usize).copied()
    }

    /// Number of registered kinds, identity kind included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false: the identity kind is registered at construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_reserved() {
        let registry = ComponentRegistry::new();
        assert_eq!(registry.id_of::<EntityId>(), Some(ENTITY_COMPONENT_ID));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register::<i32>();
        let b = registry.register::<f32>();
        assert_ne!(a, b);
        assert_eq!(registry.register::<i32>(), a);
        assert_eq!(registry.id_of::<f32>(), Some(b));
        assert_eq!(registry.id_of::<u8>(), None);
        assert_eq!(registry.name_of(a), Some("i32"));
    }

    #[test]
    fn test_registration_order_is_deterministic() {
        let mut first = ComponentRegistry::new();
        let mut second = ComponentRegistry::new();
        for registry in [&mut first, &mut second] {
            registry.register::<u16>();
            registry.register::<String>();
        }
        assert_eq!(first.id_of::<String>(), second.id_of::<String>());
        assert_eq!(first.id_of::<String>(), Some(2));
    }

    #[derive(Clone, Default)]
    struct Kind<const A: usize, const B: usize>;

    macro_rules! register_row {
        ($registry:ident, $a:literal, [$($b:literal)*]) => {
            $( $registry.register::<Kind<$a, $b>>(); )*
        };
    }

    macro_rules! register_grid {
        ($registry:ident; [$($a:literal)*] $bs:tt) => {
            $( register_row!($registry, $a, $bs); )*
        };
    }

    #[test]
    #[should_panic(expected = "component limit")]
    fn test_registering_past_the_limit_panics() {
        let mut registry = ComponentRegistry::new();
        // 31 x 33 = 1023 user kinds plus the identity kind.
        register_grid!(registry;
            [0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25 26 27 28 29 30]
            [0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25 26 27 28 29 30
             31 32]);
        assert_eq!(registry.len(), MAX_COMPONENT_COUNT);
        assert_eq!(registry.register::<Kind<0, 0>>(), 1);

        registry.register::<Kind<99, 99>>();
    }
}
