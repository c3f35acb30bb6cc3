//! # STRATA Core Engine
//!
//! Archetype-based Entity Component System storage engine:
//! - Entities with the same component set share one dense table
//! - Rows migrate between tables as components are attached and detached
//! - Views walk every matching table column by column
//!
//! ## Architecture Rules
//!
//! 1. **Dense storage** - Columns never have holes; removal is swap-remove
//! 2. **Index handles** - Entity locations name archetypes by index, never by pointer
//! 3. **Deterministic ids** - Component ids follow registration order
//!
//! ## Example
//!
//! ```rust
//! use strata_core::World;
//!
//! #[derive(Clone, Default)]
//! struct Altitude(f32);
//!
//! #[derive(Clone, Default)]
//! struct Climb(f32);
//!
//! let mut world = World::new();
//! let glider = world.spawn((Altitude(0.0), Climb(1.5))).unwrap();
//! let rock = world.spawn((Altitude(5.0),)).unwrap();
//!
//! for (altitude, climb) in world.view_mut::<(Altitude, Climb)>() {
//!     altitude.0 += climb.0;
//! }
//!
//! assert_eq!(world.get::<Altitude>(glider).unwrap().0, 1.5);
//! assert_eq!(world.get::<Altitude>(rock).unwrap().0, 5.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod collections;
pub mod config;
pub mod ecs;
pub mod error;

pub use collections::{OpenHashMap, ProbeStrategy};
pub use config::WorldConfig;
pub use ecs::{
    Archetype, ArchetypeId, ArchetypeStore, Bundle, Column, Component, ComponentId,
    ComponentRegistry, EntityId, EntityIdGenerator, EntityLocation, ErasedColumn, Query,
    RandomIdGenerator, SequentialIdGenerator, ShrinkPolicy, Signature, View, ViewMut, World,
};
pub use error::{EcsError, EcsResult};
