//! # Entity Component System
//!
//! Archetype storage: entities with the same component set share one table,
//! one dense column per component kind.
//!
//! ## Layout
//!
//! - [`ComponentRegistry`] hands out [`ComponentId`]s.
//! - [`Signature`] is the bitmask of a component set.
//! - [`Archetype`] stores one row per entity, in type-erased [`Column`]s.
//! - [`ArchetypeStore`] resolves signatures to archetypes.
//! - [`World`] tracks where every entity lives and migrates rows.
//! - [`View`] / [`ViewMut`] iterate every archetype matching a query.

mod archetype;
mod bundle;
mod column;
mod component;
mod entity;
#[cfg(test)]
mod fixtures;
mod query;
mod signature;
mod store;
mod world;

pub use archetype::Archetype;
pub use bundle::{bundle_signature, Bundle};
pub use column::{Column, ErasedColumn, ShrinkPolicy};
pub use component::{
    Component, ComponentId, ComponentRegistry, ENTITY_COMPONENT_ID, MAX_COMPONENT_COUNT,
};
pub use entity::{
    EntityId, EntityIdGenerator, EntityLocation, RandomIdGenerator, SequentialIdGenerator,
};
pub use query::{ColumnRows, Query, View, ViewIter, ViewIterMut, ViewMut};
pub use signature::Signature;
pub use store::{ArchetypeId, ArchetypeStore};
pub use world::World;
