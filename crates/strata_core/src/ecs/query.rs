//! # Views
//!
//! A view selects every non-empty archetype whose signature includes the
//! requested kinds and walks their rows.
//!
//! ```text
//! view::<(Position, Velocity)>()
//!   archetype {id, pos, vel}        -> visited
//!   archetype {id, pos, vel, hp}    -> visited
//!   archetype {id, pos}             -> skipped
//! ```
//!
//! The candidate list is taken when the view is built. Per archetype, the
//! requested columns are resolved once into slice iterators, so stepping a
//! row is a handful of pointer bumps.
//!
//! A view borrows the world: no entity can be created, destroyed or migrated
//! while one is alive.

use std::any::type_name;
use std::marker::PhantomData;
use std::slice;

use super::archetype::Archetype;
use super::column::{Column, ErasedColumn};
use super::component::{Component, ComponentId, ComponentRegistry, ENTITY_COMPONENT_ID};
use super::signature::Signature;
use super::store::ArchetypeStore;

/// A tuple of component kinds that can be fetched row by row.
///
/// Implemented for tuples of one to eight kinds. [`EntityId`](super::EntityId)
/// is a valid kind for shared views and yields the owning entity of each row.
pub trait Query: 'static {
    /// Shared row, e.g. `(&Position, &Velocity)`.
    type Item<'a>;
    /// Mutable row, e.g. `(&mut Position, &mut Velocity)`.
    type ItemMut<'a>;
    /// Shared rows of one archetype.
    type Rows<'a>: Iterator<Item = Self::Item<'a>>;
    /// Mutable rows of one archetype.
    type RowsMut<'a>: Iterator<Item = Self::ItemMut<'a>>;

    /// Ids in declaration order, or `None` if some kind was never registered.
    fn ids(registry: &ComponentRegistry) -> Option<Vec<ComponentId>>;

    /// Type names in declaration order.
    fn type_names() -> Vec<&'static str>;

    /// Bits of every registered kind; unregistered kinds contribute nothing.
    fn signature(registry: &ComponentRegistry) -> Signature;

    /// Rows of `archetype`, which must store every kind in `ids`.
    fn rows<'a>(archetype: &'a Archetype, ids: &[ComponentId]) -> Self::Rows<'a>;

    /// Mutable rows of `archetype`. `ids` must be distinct.
    fn rows_mut<'a>(archetype: &'a mut Archetype, ids: &[ComponentId]) -> Self::RowsMut<'a>;
}

/// Lock-step iterator over one archetype's requested columns.
#[derive(Debug)]
pub struct ColumnRows<T>(T);

fn typed<T: Component>(archetype: &Archetype, id: ComponentId) -> &[T] {
    archetype.column::<T>(id).map_or(&[][..], Column::as_slice)
}

fn typed_mut<'a, T: Component>(column: Option<&'a mut dyn ErasedColumn>) -> &'a mut [T] {
    match column {
        Some(column) => Column::<T>::downcast_mut(column).as_mut_slice(),
        None => <&mut [T]>::default(),
    }
}

/// Splits the requested columns of `archetype` into disjoint borrows,
/// ordered like `ids`.
fn split_columns<'a>(
    archetype: &'a mut Archetype,
    ids: &[ComponentId],
) -> Vec<Option<&'a mut dyn ErasedColumn>> {
    let mut found: Vec<Option<&'a mut dyn ErasedColumn>> = ids.iter().map(|_| None).collect();
    for (id, column) in archetype.columns_mut() {
        if let Some(position) = ids.iter().position(|wanted| *wanted == id) {
            found[position] = Some(column);
        }
    }
    found
}

macro_rules! impl_query {
    ($(($name:ident, $index:tt)),+) => {
        impl<'a, $($name: Component),+> Iterator for ColumnRows<($(slice::Iter<'a, $name>,)+)> {
            type Item = ($(&'a $name,)+);

            #[inline]
            fn next(&mut self) -> Option<Self::Item> {
                Some(($(self.0.$index.next()?,)+))
            }

            fn size_hint(&self) -> (usize, Option<usize>) {
                (self.0).0.size_hint()
            }
        }

        impl<'a, $($name: Component),+> Iterator for ColumnRows<($(slice::IterMut<'a, $name>,)+)> {
            type Item = ($(&'a mut $name,)+);

            #[inline]
            fn next(&mut self) -> Option<Self::Item> {
                Some(($(self.0.$index.next()?,)+))
            }

            fn size_hint(&self) -> (usize, Option<usize>) {
                (self.0).0.size_hint()
            }
        }

        impl<$($name: Component),+> Query for ($($name,)+) {
            type Item<'a> = ($(&'a $name,)+);
            type ItemMut<'a> = ($(&'a mut $name,)+);
            type Rows<'a> = ColumnRows<($(slice::Iter<'a, $name>,)+)>;
            type RowsMut<'a> = ColumnRows<($(slice::IterMut<'a, $name>,)+)>;

            fn ids(registry: &ComponentRegistry) -> Option<Vec<ComponentId>> {
                Some(vec![$(registry.id_of::<$name>()?),+])
            }

            fn type_names() -> Vec<&'static str> {
                vec![$(type_name::<$name>()),+]
            }

            fn signature(registry: &ComponentRegistry) -> Signature {
                let mut signature = Signature::EMPTY;
                $(
                    if let Some(id) = registry.id_of::<$name>() {
                        signature.set(id, true);
                    }
                )+
                signature
            }

            fn rows<'a>(archetype: &'a Archetype, ids: &[ComponentId]) -> Self::Rows<'a> {
                ColumnRows(($(typed::<$name>(archetype, ids[$index]).iter(),)+))
            }

            fn rows_mut<'a>(
                archetype: &'a mut Archetype,
                ids: &[ComponentId],
            ) -> Self::RowsMut<'a> {
                let mut columns = split_columns(archetype, ids);
                ColumnRows(($(typed_mut::<$name>(columns[$index].take()).iter_mut(),)+))
            }
        }
    };
}

impl_query!((A, 0));
impl_query!((A, 0), (B, 1));
impl_query!((A, 0), (B, 1), (C, 2));
impl_query!((A, 0), (B, 1), (C, 2), (D, 3));
impl_query!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_query!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_query!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_query!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));

/// Candidate archetypes for `Q`, in store order.
fn candidates<Q: Query>(
    store: &ArchetypeStore,
    registry: &ComponentRegistry,
) -> (Vec<usize>, Vec<ComponentId>) {
    let Some(ids) = Q::ids(registry) else {
        return (Vec::new(), Vec::new());
    };
    let required = Signature::from_ids(&ids);
    let matched = store
        .archetypes()
        .iter()
        .enumerate()
        .filter(|(_, archetype)| !archetype.is_empty() && archetype.signature().includes(&required))
        .map(|(index, _)| index)
        .collect();
    (matched, ids)
}

// ============================================================================
// SHARED VIEW
// ============================================================================

/// Read-only view over every entity carrying all kinds of `Q`.
pub struct View<'w, Q: Query> {
    archetypes: Vec<&'w Archetype>,
    ids: Vec<ComponentId>,
    registry: &'w ComponentRegistry,
    _query: PhantomData<fn() -> Q>,
}

impl<'w, Q: Query> View<'w, Q> {
    pub(crate) fn new(store: &'w ArchetypeStore, registry: &'w ComponentRegistry) -> Self {
        let (matched, ids) = candidates::<Q>(store, registry);
        let archetypes = matched.into_iter().map(|index| &store.archetypes()[index]).collect();
        Self {
            archetypes,
            ids,
            registry,
            _query: PhantomData,
        }
    }

    /// Keeps archetypes that store at least one kind of `F`.
    #[must_use]
    pub fn include<F: Query>(mut self) -> Self {
        let filter = F::signature(self.registry);
        self.archetypes.retain(|archetype| archetype.signature().matches(&filter));
        self
    }

    /// Drops archetypes that store any kind of `F`.
    #[must_use]
    pub fn exclude<F: Query>(mut self) -> Self {
        let filter = F::signature(self.registry);
        self.archetypes.retain(|archetype| !archetype.signature().matches(&filter));
        self
    }

    /// Total rows across the candidate archetypes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.iter().map(|archetype| archetype.len()).sum()
    }

    /// True if there is no row to visit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of candidate archetypes.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Iterates every matching row.
    pub fn iter(&self) -> ViewIter<'_, Q> {
        ViewIter {
            archetypes: self.archetypes.clone().into_iter(),
            ids: self.ids.clone(),
            current: None,
        }
    }
}

impl<'w, Q: Query> IntoIterator for View<'w, Q> {
    type Item = Q::Item<'w>;
    type IntoIter = ViewIter<'w, Q>;

    fn into_iter(self) -> Self::IntoIter {
        ViewIter {
            archetypes: self.archetypes.into_iter(),
            ids: self.ids,
            current: None,
        }
    }
}

/// Row iterator of a [`View`].
pub struct ViewIter<'w, Q: Query> {
    archetypes: std::vec::IntoIter<&'w Archetype>,
    ids: Vec<ComponentId>,
    current: Option<Q::Rows<'w>>,
}

impl<'w, Q: Query> Iterator for ViewIter<'w, Q> {
    type Item = Q::Item<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(rows) = &mut self.current {
                if let Some(item) = rows.next() {
                    return Some(item);
                }
            }
            let archetype = self.archetypes.next()?;
            self.current = Some(Q::rows(archetype, &self.ids));
        }
    }
}

// ============================================================================
// MUTABLE VIEW
// ============================================================================

/// Read-write view over every entity carrying all kinds of `Q`.
pub struct ViewMut<'w, Q: Query> {
    archetypes: Vec<&'w mut Archetype>,
    ids: Vec<ComponentId>,
    registry: &'w ComponentRegistry,
    _query: PhantomData<fn() -> Q>,
}

impl<'w, Q: Query> ViewMut<'w, Q> {
    /// # Panics
    ///
    /// Panics if `Q` names a kind twice or asks for the identity column.
    pub(crate) fn new(store: &'w mut ArchetypeStore, registry: &'w ComponentRegistry) -> Self {
        let (matched, ids) = candidates::<Q>(store, registry);
        assert_distinct::<Q>(&ids);
        let mut matched = matched.into_iter().peekable();
        let archetypes = store
            .archetypes_mut()
            .iter_mut()
            .enumerate()
            .filter_map(|(index, archetype)| matched.next_if_eq(&index).map(|_| archetype))
            .collect();
        Self {
            archetypes,
            ids,
            registry,
            _query: PhantomData,
        }
    }

    /// Keeps archetypes that store at least one kind of `F`.
    #[must_use]
    pub fn include<F: Query>(mut self) -> Self {
        let filter = F::signature(self.registry);
        self.archetypes.retain(|archetype| archetype.signature().matches(&filter));
        self
    }

    /// Drops archetypes that store any kind of `F`.
    #[must_use]
    pub fn exclude<F: Query>(mut self) -> Self {
        let filter = F::signature(self.registry);
        self.archetypes.retain(|archetype| !archetype.signature().matches(&filter));
        self
    }

    /// Total rows across the candidate archetypes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.iter().map(|archetype| archetype.len()).sum()
    }

    /// True if there is no row to visit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of candidate archetypes.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Iterates every matching row mutably.
    pub fn iter_mut(&mut self) -> ViewIterMut<'_, Q> {
        let archetypes: Vec<&mut Archetype> =
            self.archetypes.iter_mut().map(|archetype| &mut **archetype).collect();
        ViewIterMut {
            archetypes: archetypes.into_iter(),
            ids: self.ids.clone(),
            current: None,
        }
    }

    /// Calls `f` on every matching row.
    pub fn for_each(self, mut f: impl FnMut(Q::ItemMut<'w>)) {
        for item in self {
            f(item);
        }
    }
}

impl<'w, Q: Query> IntoIterator for ViewMut<'w, Q> {
    type Item = Q::ItemMut<'w>;
    type IntoIter = ViewIterMut<'w, Q>;

    fn into_iter(self) -> Self::IntoIter {
        ViewIterMut {
            archetypes: self.archetypes.into_iter(),
            ids: self.ids,
            current: None,
        }
    }
}

/// Row iterator of a [`ViewMut`].
pub struct ViewIterMut<'w, Q: Query> {
    archetypes: std::vec::IntoIter<&'w mut Archetype>,
    ids: Vec<ComponentId>,
    current: Option<Q::RowsMut<'w>>,
}

impl<'w, Q: Query> Iterator for ViewIterMut<'w, Q> {
    type Item = Q::ItemMut<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(rows) = &mut self.current {
                if let Some(item) = rows.next() {
                    return Some(item);
                }
            }
            let archetype = self.archetypes.next()?;
            self.current = Some(Q::rows_mut(archetype, &self.ids));
        }
    }
}

fn assert_distinct<Q: Query>(ids: &[ComponentId]) {
    assert!(
        !ids.contains(&ENTITY_COMPONENT_ID),
        "the identity column cannot be borrowed mutably"
    );
    if let Some(position) = ids
        .iter()
        .enumerate()
        .position(|(i, id)| ids[..i].contains(id))
    {
        panic!(
            "query borrows component {} mutably more than once",
            Q::type_names()[position]
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::column::ShrinkPolicy;
    use crate::ecs::entity::EntityId;

    /// Store with `{i32}` x2, `{i32, f32}` x3, `{f32}` x1 and an empty `{i32, u8}`.
    fn fixture() -> (ArchetypeStore, ComponentRegistry) {
        let mut registry = ComponentRegistry::new();
        let mut store = ArchetypeStore::new();
        let int = registry.register::<i32>();
        let float = registry.register::<f32>();
        let byte = registry.register::<u8>();

        let mut next = 0u64;
        let mut fill = |store: &mut ArchetypeStore, table: Archetype, rows: i32| {
            let id = store.get_or_insert_with(*table.signature(), || table);
            let archetype = store.get_mut(id);
            for row in 0..rows {
                archetype.push_entity(EntityId::from_raw(next));
                next += 1;
                if archetype.signature().test(int) {
                    archetype.push_component(int, row);
                }
                if archetype.signature().test(float) {
                    #[allow(clippy::cast_precision_loss)]
                    let value = row as f32;
                    archetype.push_component(float, value);
                }
                if archetype.signature().test(byte) {
                    archetype.push_component(byte, 0u8);
                }
            }
        };

        let never = ShrinkPolicy::Never;
        fill(&mut store, Archetype::build::<(i32,)>(&[int], never), 2);
        fill(&mut store, Archetype::build::<(i32, f32)>(&[int, float], never), 3);
        fill(&mut store, Archetype::build::<(f32,)>(&[float], never), 1);
        fill(&mut store, Archetype::build::<(i32, u8)>(&[int, byte], never), 0);
        (store, registry)
    }

    #[test]
    fn test_view_visits_supersets_only() {
        let (store, registry) = fixture();
        let view = View::<(i32,)>::new(&store, &registry);
        assert_eq!(view.archetype_count(), 2);
        assert_eq!(view.len(), 5);
        let mut seen: Vec<i32> = view.iter().map(|(value,)| *value).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 0, 1, 1, 2]);

        let pairs = View::<(i32, f32)>::new(&store, &registry);
        assert_eq!(pairs.len(), 3);
        assert!(pairs.into_iter().all(|(i, f)| {
            #[allow(clippy::cast_precision_loss)]
            let expected = *i as f32;
            (*f - expected).abs() < f32::EPSILON
        }));
    }

    #[test]
    fn test_unregistered_kind_gives_empty_view() {
        let (store, registry) = fixture();
        let view = View::<(i32, u64)>::new(&store, &registry);
        assert!(view.is_empty());
        assert_eq!(view.iter().count(), 0);
    }

    #[test]
    fn test_include_and_exclude() {
        let (store, registry) = fixture();
        let only_pairs = View::<(i32,)>::new(&store, &registry).include::<(f32,)>();
        assert_eq!(only_pairs.len(), 3);

        let no_pairs = View::<(i32,)>::new(&store, &registry).exclude::<(f32,)>();
        assert_eq!(no_pairs.len(), 2);

        let unknown = View::<(i32,)>::new(&store, &registry).exclude::<(u64,)>();
        assert_eq!(unknown.len(), 5);
    }

    #[test]
    fn test_view_yields_entities() {
        let (store, registry) = fixture();
        let view = View::<(EntityId, f32)>::new(&store, &registry);
        let mut ids: Vec<u64> = view.iter().map(|(id, _)| id.to_raw()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_view_mut_writes_through() {
        let (mut store, registry) = fixture();
        for (i, f) in ViewMut::<(i32, f32)>::new(&mut store, &registry) {
            *i += 100;
            *f = -1.0;
        }
        ViewMut::<(f32,)>::new(&mut store, &registry)
            .exclude::<(i32,)>()
            .for_each(|(f,): (&mut f32,)| *f = 7.0);

        let view = View::<(i32, f32)>::new(&store, &registry);
        assert!(view.iter().all(|(i, f)| *i >= 100 && *f < 0.0));
        let untouched = View::<(i32,)>::new(&store, &registry).exclude::<(f32,)>();
        assert!(untouched.iter().all(|(i,)| *i < 100));
        let floats = View::<(f32,)>::new(&store, &registry).exclude::<(i32,)>();
        assert_eq!(floats.iter().map(|(f,)| *f).collect::<Vec<_>>(), vec![7.0]);
    }

    #[test]
    #[should_panic(expected = "more than once")]
    fn test_aliasing_mut_query_panics() {
        let (mut store, registry) = fixture();
        let _ = ViewMut::<(i32, f32, i32)>::new(&mut store, &registry);
    }

    #[test]
    #[should_panic(expected = "identity column")]
    fn test_identity_column_is_read_only() {
        let (mut store, registry) = fixture();
        let _ = ViewMut::<(EntityId, i32)>::new(&mut store, &registry);
    }
}
