//! # ECS World
//!
//! The central container: owns the component registry, every archetype and
//! the entity location index.
//!
//! Each entity is in one of three states:
//!
//! ```text
//! create_entity          attach            destroy_entity
//!   ---------> Unattached ------> Resident ---------------> (gone)
//!                  ^                 |
//!                  +-----------------+
//!                  detach of the last component
//! ```
//!
//! Structural changes (attach, detach, destroy) move rows between
//! archetypes with swap-remove and repoint whichever entity got shifted
//! into the freed row.

use std::any::type_name;
use std::fmt;

use tracing::{debug, trace};

use super::archetype::Archetype;
use super::bundle::{bundle_signature, Bundle};
use super::component::{Component, ComponentId, ComponentRegistry, ENTITY_COMPONENT_ID};
use super::entity::{EntityId, EntityIdGenerator, EntityLocation, SequentialIdGenerator};
use super::query::{Query, View, ViewMut};
use super::signature::Signature;
use super::store::{ArchetypeId, ArchetypeStore};
use crate::collections::OpenHashMap;
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};

/// The ECS World - container for all entities and components.
///
/// # Example
///
/// ```rust
/// use strata_core::World;
///
/// let mut world = World::new();
/// let entity = world.spawn((17i32, 11.7f32)).unwrap();
///
/// for (count, weight) in world.view_mut::<(i32, f32)>() {
///     *count += 1;
///     *weight *= 2.0;
/// }
/// assert_eq!(world.get::<i32>(entity), Ok(&18));
/// ```
#[derive(Clone)]
pub struct World<G: EntityIdGenerator = SequentialIdGenerator> {
    registry: ComponentRegistry,
    store: ArchetypeStore,
    /// Entity location index: one entry per live entity.
    entities: OpenHashMap<EntityId, EntityLocation>,
    generator: G,
    config: WorldConfig,
}

impl World {
    /// Creates an empty world with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates an empty world with sequential entity ids.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self::with_generator(config, SequentialIdGenerator::default())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: EntityIdGenerator> World<G> {
    /// Creates an empty world drawing entity ids from `generator`.
    #[must_use]
    pub fn with_generator(config: WorldConfig, generator: G) -> Self {
        let mut entities = OpenHashMap::with_probe(config.probe);
        if config.initial_entity_capacity > 0 {
            entities.reserve(config.initial_entity_capacity);
        }
        Self {
            registry: ComponentRegistry::new(),
            store: ArchetypeStore::new(),
            entities,
            generator,
            config,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Component kinds known to this world.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Every archetype created so far.
    #[must_use]
    pub fn archetypes(&self) -> &ArchetypeStore {
        &self.store
    }

    /// Registers `T`, fixing its id ahead of first use.
    ///
    /// Registering kinds in a fixed order at startup makes ids identical
    /// across runs.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        self.registry.register::<T>()
    }

    // ========================================================================
    // ENTITY LIFECYCLE
    // ========================================================================

    /// Creates an entity with no components.
    pub fn create_entity(&mut self) -> EntityId {
        let id = self.fresh_id();
        self.entities.insert(id, EntityLocation::UNATTACHED);
        trace!(entity = %id, "created entity");
        id
    }

    /// Creates an entity and attaches `bundle` to it.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateComponent`] if the bundle names a kind
    /// twice; no entity is created in that case.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> EcsResult<EntityId> {
        let ids = B::register(&mut self.registry);
        bundle_signature::<B>(&ids)?;
        let id = self.create_entity();
        self.attach(id, bundle)?;
        Ok(id)
    }

    /// Removes an entity and all its components.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityNotFound`] if `id` is not alive.
    pub fn destroy_entity(&mut self, id: EntityId) -> EcsResult<()> {
        let location = self
            .entities
            .remove(&id)
            .ok_or(EcsError::EntityNotFound(id))?;
        if let Some(archetype) = location.archetype {
            let moved = self.store.get_mut(archetype).erase(location.row);
            self.repoint(moved, id, location.row);
        }
        trace!(entity = %id, "destroyed entity");
        Ok(())
    }

    /// Creates a new entity holding copies of every component of `id`.
    ///
    /// The copy lives in the same archetype and is fully independent.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityNotFound`] if `id` is not alive.
    pub fn copy_entity(&mut self, id: EntityId) -> EcsResult<EntityId> {
        let location = self.location_of(id)?;
        let copy = self.fresh_id();
        let copied = match location.archetype {
            Some(archetype) => {
                let row = self.store.get_mut(archetype).duplicate_row(location.row, copy);
                EntityLocation::resident(archetype, row)
            }
            None => EntityLocation::UNATTACHED,
        };
        self.entities.insert(copy, copied);
        trace!(source = %id, entity = %copy, "copied entity");
        Ok(copy)
    }

    /// Removes every entity and archetype. Registered kinds keep their ids.
    pub fn clear(&mut self) {
        debug!(
            entities = self.entities.len(),
            archetypes = self.store.len(),
            "clearing world"
        );
        self.entities.clear();
        self.store.clear();
    }

    // ========================================================================
    // STRUCTURAL CHANGES
    // ========================================================================

    /// Adds every component of `bundle` to `id`, migrating it to the
    /// archetype for its new component set.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityNotFound`] if `id` is not alive.
    /// - [`EcsError::DuplicateComponent`] if the bundle names a kind twice.
    /// - [`EcsError::ComponentAlreadyPresent`] if `id` already has one of the
    ///   kinds; the entity is left untouched.
    pub fn attach<B: Bundle>(&mut self, id: EntityId, bundle: B) -> EcsResult<()> {
        let location = self.location_of(id)?;
        let ids = B::register(&mut self.registry);
        let added = bundle_signature::<B>(&ids)?;

        let current = self.signature_at(location).with(ENTITY_COMPONENT_ID);
        if current.matches(&added) {
            let names = B::type_names();
            let position = ids.iter().position(|&c| current.test(c)).unwrap_or(0);
            return Err(EcsError::ComponentAlreadyPresent {
                entity: id,
                component: names[position],
            });
        }

        let shrink = self.config.column_shrink;
        let target = self.archetype_for(current.union(&added), |store| match location.archetype {
            Some(source) => Archetype::build_from::<B>(&ids, store.get(source)),
            None => Archetype::build::<B>(&ids, shrink),
        });

        let row = match location.archetype {
            Some(source) => self.migrate(id, source, location.row, target),
            None => self.store.get_mut(target).push_entity(id),
        };
        bundle.push_into(self.store.get_mut(target), &ids);
        self.entities.insert(id, EntityLocation::resident(target, row));
        Ok(())
    }

    /// Removes the `T` component of `id` and returns it.
    ///
    /// An entity losing its last component becomes unattached but stays
    /// alive.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityNotFound`] if `id` is not alive.
    /// - [`EcsError::ComponentMissing`] if `id` has no `T`.
    pub fn detach<T: Component>(&mut self, id: EntityId) -> EcsResult<T> {
        let location = self.location_of(id)?;
        let (source, component) = self
            .resolve::<T>(location)
            .filter(|&(_, component)| component != ENTITY_COMPONENT_ID)
            .ok_or_else(|| missing::<T>(id))?;

        let value = std::mem::take(
            self.store
                .get_mut(source)
                .get_component_mut::<T>(component, location.row),
        );

        let remaining = self.store.get(source).signature().without(component);
        if remaining == Signature::EMPTY.with(ENTITY_COMPONENT_ID) {
            let moved = self.store.get_mut(source).erase(location.row);
            self.repoint(moved, id, location.row);
            self.entities.insert(id, EntityLocation::UNATTACHED);
        } else {
            let target = self.archetype_for(remaining, |store| {
                Archetype::build_without(store.get(source), component)
            });
            let row = self.migrate(id, source, location.row, target);
            self.entities.insert(id, EntityLocation::resident(target, row));
        }
        Ok(value)
    }

    // ========================================================================
    // ACCESS
    // ========================================================================

    /// The `T` component of `id`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityNotFound`] if `id` is not alive.
    /// - [`EcsError::ComponentMissing`] if `id` has no `T`.
    pub fn get<T: Component>(&self, id: EntityId) -> EcsResult<&T> {
        let location = self.location_of(id)?;
        let (archetype, component) = self.resolve::<T>(location).ok_or_else(|| missing::<T>(id))?;
        Ok(self.store.get(archetype).get_component(component, location.row))
    }

    /// The `T` component of `id`, mutably.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityNotFound`] if `id` is not alive.
    /// - [`EcsError::ComponentMissing`] if `id` has no `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is [`EntityId`]: the identity column is read-only.
    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> EcsResult<&mut T> {
        let location = self.location_of(id)?;
        let (archetype, component) = self.resolve::<T>(location).ok_or_else(|| missing::<T>(id))?;
        assert_ne!(
            component, ENTITY_COMPONENT_ID,
            "the identity column cannot be borrowed mutably"
        );
        Ok(self
            .store
            .get_mut(archetype)
            .get_component_mut(component, location.row))
    }

    /// True if `id` is alive and has a `T`.
    #[must_use]
    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        self.entities
            .get(&id)
            .is_some_and(|&location| self.resolve::<T>(location).is_some())
    }

    /// True if `id` is alive, attached or not.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Where `id` currently lives. Stale after the next structural change.
    #[must_use]
    pub fn location(&self, id: EntityId) -> Option<EntityLocation> {
        self.entities.get(&id).copied()
    }

    /// Component set of `id`, identity bit included; empty while unattached.
    #[must_use]
    pub fn signature_of(&self, id: EntityId) -> Option<Signature> {
        self.location(id).map(|location| self.signature_at(location))
    }

    /// Number of live entities, unattached ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if no entity is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of archetypes, empty ones included.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.store.len()
    }

    /// Ids of every live entity, in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    // ========================================================================
    // VIEWS
    // ========================================================================

    /// Read-only rows of every entity carrying all kinds of `Q`.
    #[must_use]
    pub fn view<Q: Query>(&self) -> View<'_, Q> {
        View::new(&self.store, &self.registry)
    }

    /// Read-write rows of every entity carrying all kinds of `Q`.
    ///
    /// # Panics
    ///
    /// Panics if `Q` names a kind twice or includes [`EntityId`].
    #[must_use]
    pub fn view_mut<Q: Query>(&mut self) -> ViewMut<'_, Q> {
        ViewMut::new(&mut self.store, &self.registry)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn location_of(&self, id: EntityId) -> EcsResult<EntityLocation> {
        self.location(id).ok_or(EcsError::EntityNotFound(id))
    }

    fn signature_at(&self, location: EntityLocation) -> Signature {
        location
            .archetype
            .map_or(Signature::EMPTY, |archetype| *self.store.get(archetype).signature())
    }

    /// Archetype and column holding `T` for an entity at `location`.
    fn resolve<T: Component>(
        &self,
        location: EntityLocation,
    ) -> Option<(ArchetypeId, ComponentId)> {
        let archetype = location.archetype?;
        let component = self.registry.id_of::<T>()?;
        self.store
            .get(archetype)
            .signature()
            .test(component)
            .then_some((archetype, component))
    }

    fn fresh_id(&mut self) -> EntityId {
        loop {
            let id = self.generator.generate();
            if !id.is_null() && !self.entities.contains_key(&id) {
                return id;
            }
        }
    }

    /// Archetype for `signature`, built by `make` on first use.
    fn archetype_for(
        &mut self,
        signature: Signature,
        make: impl FnOnce(&ArchetypeStore) -> Archetype,
    ) -> ArchetypeId {
        if let Some(id) = self.store.find(&signature) {
            return id;
        }
        let mut archetype = make(&self.store);
        archetype.reserve(self.config.archetype_reserve);
        self.store.get_or_insert_with(signature, || archetype)
    }

    /// Moves `id` from `row` of `source` into a new row of `target` and
    /// returns that row. Only kinds present in both archetypes are carried.
    fn migrate(
        &mut self,
        id: EntityId,
        source: ArchetypeId,
        row: usize,
        target: ArchetypeId,
    ) -> usize {
        let (from, to) = self.store.pair_mut(source, target);
        let new_row = to.carry_entity(row, id, from);
        let moved = from.erase(row);
        self.repoint(moved, id, row);
        trace!(
            entity = %id,
            from = source.index(),
            to = target.index(),
            "migrated entity"
        );
        new_row
    }

    /// Points `moved` at `row` after a swap-remove, unless it is the entity
    /// that was just erased.
    fn repoint(&mut self, moved: EntityId, erased: EntityId, row: usize) {
        if moved == erased {
            return;
        }
        if let Some(location) = self.entities.get_mut(&moved) {
            location.row = row;
        }
    }
}

fn missing<T>(entity: EntityId) -> EcsError {
    EcsError::ComponentMissing {
        entity,
        component: type_name::<T>(),
    }
}

impl<G: EntityIdGenerator> fmt::Debug for World<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("archetypes", &self.store.len())
            .field("components", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
