//! # Bundles
//!
//! A bundle is a tuple of component values attached in one step, e.g.
//! `(17i32, 11.7f32, String::from("tag"))`.
//! Implemented for tuples of one to eight component kinds.

use std::any::type_name;

use super::archetype::Archetype;
use super::column::{Column, ErasedColumn, ShrinkPolicy};
use super::component::{Component, ComponentId, ComponentRegistry};
use super::signature::Signature;
use crate::error::{EcsError, EcsResult};

/// A statically known set of component kinds, and values for them.
///
/// Every method that takes `ids` expects the slice returned by
/// [`Bundle::register`], in declaration order.
pub trait Bundle: Send + Sync + 'static {
    /// Registers every kind, returning ids in declaration order.
    fn register(registry: &mut ComponentRegistry) -> Vec<ComponentId>;

    /// Type names in declaration order.
    fn type_names() -> Vec<&'static str>;

    /// One empty column per kind.
    fn empty_columns(
        ids: &[ComponentId],
        shrink: ShrinkPolicy,
    ) -> Vec<(ComponentId, Box<dyn ErasedColumn>)>;

    /// Pushes each value onto the matching column of `archetype`.
    fn push_into(self, archetype: &mut Archetype, ids: &[ComponentId]);
}

/// Signature of a bundle's ids.
///
/// # Errors
///
/// Returns [`EcsError::DuplicateComponent`] if a kind appears twice.
pub fn bundle_signature<B: Bundle>(ids: &[ComponentId]) -> EcsResult<Signature> {
    let signature = Signature::from_ids(ids);
    if signature.count() == ids.len() {
        return Ok(signature);
    }
    let names = B::type_names();
    let duplicate = ids
        .iter()
        .enumerate()
        .find(|&(i, id)| ids[..i].contains(id))
        .map_or("<unknown>", |(i, _)| names[i]);
    Err(EcsError::DuplicateComponent(duplicate))
}

macro_rules! impl_bundle {
    ($(($name:ident, $index:tt)),+) => {
        impl<$($name: Component),+> Bundle for ($($name,)+) {
            fn register(registry: &mut ComponentRegistry) -> Vec<ComponentId> {
                vec![$(registry.register::<$name>()),+]
            }

            fn type_names() -> Vec<&'static str> {
                vec![$(type_name::<$name>()),+]
            }

            fn empty_columns(
                ids: &[ComponentId],
                shrink: ShrinkPolicy,
            ) -> Vec<(ComponentId, Box<dyn ErasedColumn>)> {
                vec![$(
                    (ids[$index], Box::new(Column::<$name>::new(shrink)) as Box<dyn ErasedColumn>)
                ),+]
            }

            fn push_into(self, archetype: &mut Archetype, ids: &[ComponentId]) {
                $(archetype.push_component::<$name>(ids[$index], self.$index);)+
            }
        }
    };
}

impl_bundle!((A, 0));
impl_bundle!((A, 0), (B, 1));
impl_bundle!((A, 0), (B, 1), (C, 2));
impl_bundle!((A, 0), (B, 1), (C, 2), (D, 3));
impl_bundle!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_bundle!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_bundle!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_bundle!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_in_declaration_order() {
        let mut registry = ComponentRegistry::new();
        let ids = <(i32, f32, u8)>::register(&mut registry);
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(<(u8, i32)>::register(&mut registry), vec![3, 1]);
    }

    #[test]
    fn test_duplicate_kinds_rejected() {
        let mut registry = ComponentRegistry::new();
        let ids = <(i32, f32, i32)>::register(&mut registry);
        assert_eq!(
            bundle_signature::<(i32, f32, i32)>(&ids),
            Err(EcsError::DuplicateComponent("i32"))
        );

        let ids = <(i32, f32)>::register(&mut registry);
        let signature = bundle_signature::<(i32, f32)>(&ids).unwrap();
        assert_eq!(signature.count(), 2);
    }

    #[test]
    fn test_empty_columns_match_ids() {
        let columns = <(i32, String)>::empty_columns(&[4, 9], ShrinkPolicy::Never);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].0, 4);
        assert_eq!(columns[1].1.component_name(), type_name::<String>());
        assert!(columns.iter().all(|(_, column)| column.is_empty()));
    }
}
