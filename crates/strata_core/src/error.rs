//! # Engine Error Types
//!
//! Every recoverable failure the storage engine reports to its caller.
//!
//! Programming errors (out-of-range rows, mismatched column kinds, exceeding
//! the component limit) are not represented here: they panic at the point
//! of misuse.

use thiserror::Error;

use crate::ecs::EntityId;

/// Errors that can occur while operating on a world or its containers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The entity is not present in the location index.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The entity exists but does not carry the requested component kind.
    #[error("entity {entity} has no component {component}")]
    ComponentMissing {
        /// The entity that was queried.
        entity: EntityId,
        /// Type name of the missing component.
        component: &'static str,
    },

    /// Attach was asked to add a kind the entity already has.
    #[error("entity {entity} already has component {component}")]
    ComponentAlreadyPresent {
        /// The entity that was targeted.
        entity: EntityId,
        /// Type name of the offending component.
        component: &'static str,
    },

    /// A bundle named the same component kind more than once.
    #[error("bundle lists component {0} more than once")]
    DuplicateComponent(&'static str),

    /// Checked lookup on an absent key.
    #[error("key not found")]
    KeyNotFound,

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for engine operations.
pub type EcsResult<T> = Result<T, EcsError>;
