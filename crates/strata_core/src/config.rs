//! # World Configuration
//!
//! Tuning knobs for a [`World`](crate::World), loadable from TOML:
//!
//! ```toml
//! probe = "double_hash"
//! initial_entity_capacity = 100000
//! archetype_reserve = 1024
//! column_shrink = "never"
//! ```
//!
//! Missing keys take their defaults.

use serde::{Deserialize, Serialize};

use crate::collections::ProbeStrategy;
use crate::ecs::ShrinkPolicy;
use crate::error::{EcsError, EcsResult};

/// Storage tuning for a world.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Probe sequence of the entity location index.
    pub probe: ProbeStrategy,
    /// Entries reserved in the location index up front (0 = none).
    pub initial_entity_capacity: usize,
    /// Rows reserved in every newly created archetype.
    pub archetype_reserve: usize,
    /// Whether columns give memory back as they empty.
    pub column_shrink: ShrinkPolicy,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            probe: ProbeStrategy::DoubleHash,
            initial_entity_capacity: 0,
            archetype_reserve: 0,
            column_shrink: ShrinkPolicy::Never,
        }
    }
}

impl WorldConfig {
    /// Large, stable populations: reserve generously, never shrink.
    #[must_use]
    pub fn simulation() -> Self {
        Self {
            initial_entity_capacity: 1_000_000,
            archetype_reserve: 4096,
            ..Self::default()
        }
    }

    /// Churning populations on a memory budget.
    #[must_use]
    pub fn compact() -> Self {
        Self {
            archetype_reserve: 16,
            column_shrink: ShrinkPolicy::HalfCapacity,
            ..Self::default()
        }
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] on malformed input or unknown keys.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if serialization fails.
    pub fn to_toml_string(&self) -> EcsResult<String> {
        toml::to_string_pretty(self).map_err(|e| EcsError::InvalidConfig(e.to_string()))
    }
}
