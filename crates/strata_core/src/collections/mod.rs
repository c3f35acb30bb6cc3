//! # Collections
//!
//! General-purpose containers used by the engine.

mod hash_map;

pub use hash_map::{OpenHashMap, ProbeStrategy};
