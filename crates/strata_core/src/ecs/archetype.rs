//! # Archetype Tables
//!
//! One table per distinct component set. Every entity sharing that exact
//! set owns one row, and every column (identity column included) always has
//! the same length.
//!
//! ```text
//! Archetype {EntityId, Position, Velocity}:
//!   id  : [e7, e2, e9]
//!   pos : [p7, p2, p9]
//!   vel : [v7, v2, v9]
//! ```
//!
//! Rows are removed by swap-remove, so [`Archetype::erase`] reports which
//! entity got moved into the freed row. Fixing that entity's location is the
//! caller's job: a table knows nothing about the location index.

use std::fmt;

use rustc_hash::FxHashMap;

use super::bundle::Bundle;
use super::column::{Column, ErasedColumn, ShrinkPolicy};
use super::component::{Component, ComponentId, ENTITY_COMPONENT_ID};
use super::entity::EntityId;
use super::signature::Signature;

/// Dense row storage for every entity with one exact component set.
pub struct Archetype {
    signature: Signature,
    columns: FxHashMap<ComponentId, Box<dyn ErasedColumn>>,
    shrink: ShrinkPolicy,
}

impl Archetype {
    // ========================================================================
    // CONSTRUCTION
    // ========================================================================

    /// Creates a table holding only the identity column.
    #[must_use]
    pub fn new(shrink: ShrinkPolicy) -> Self {
        let mut columns: FxHashMap<ComponentId, Box<dyn ErasedColumn>> = FxHashMap::default();
        columns.insert(ENTITY_COMPONENT_ID, Box::new(Column::<EntityId>::new(shrink)));
        Self {
            signature: Signature::EMPTY.with(ENTITY_COMPONENT_ID),
            columns,
            shrink,
        }
    }

    /// Identity column plus one empty column per kind of `B`.
    #[must_use]
    pub fn build<B: Bundle>(ids: &[ComponentId], shrink: ShrinkPolicy) -> Self {
        let mut archetype = Self::new(shrink);
        archetype.add_columns(B::empty_columns(ids, shrink));
        archetype
    }

    /// Empty table with every kind of `source` plus every kind of `B`.
    #[must_use]
    pub fn build_from<B: Bundle>(ids: &[ComponentId], source: &Self) -> Self {
        let mut archetype = Self::clone_structure(source, None);
        archetype.add_columns(B::empty_columns(ids, source.shrink));
        archetype
    }

    /// Empty table with every kind of `source` except `without`.
    ///
    /// # Panics
    ///
    /// Panics if `without` is the identity column.
    #[must_use]
    pub fn build_without(source: &Self, without: ComponentId) -> Self {
        assert_ne!(
            without, ENTITY_COMPONENT_ID,
            "the identity column cannot be removed"
        );
        Self::clone_structure(source, Some(without))
    }

    fn clone_structure(source: &Self, skip: Option<ComponentId>) -> Self {
        let columns = source
            .columns
            .iter()
            .filter(|(id, _)| Some(**id) != skip)
            .map(|(&id, column)| (id, column.clone_structure()))
            .collect();
        let signature = match skip {
            Some(id) => source.signature.without(id),
            None => source.signature,
        };
        Self {
            signature,
            columns,
            shrink: source.shrink,
        }
    }

    fn add_columns(&mut self, columns: Vec<(ComponentId, Box<dyn ErasedColumn>)>) {
        for (id, column) in columns {
            self.signature.set(id, true);
            self.columns.insert(id, column);
        }
    }

    // ========================================================================
    // INSPECTION
    // ========================================================================

    /// The component set stored here, identity bit included.
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.identity().len()
    }

    /// True if there are no rows.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row capacity of the identity column.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.identity().capacity()
    }

    /// Ids of every stored kind, identity included, in ascending order.
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.signature.ids()
    }

    /// Entity owning each row, in row order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        self.identity().as_slice()
    }

    /// Entity owning `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    #[inline]
    #[must_use]
    pub fn entity_at(&self, row: usize) -> EntityId {
        *self.identity().get(row)
    }

    /// True if every column has the same length as the identity column.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let rows = self.len();
        self.columns.values().all(|column| column.len() == rows)
            && self.columns.len() == self.signature.count()
    }

    // ========================================================================
    // TYPED ACCESS
    // ========================================================================

    /// Typed column for `id`, if this table stores it.
    ///
    /// # Panics
    ///
    /// Panics if the column for `id` does not store `T`.
    #[must_use]
    pub fn column<T: Component>(&self, id: ComponentId) -> Option<&Column<T>> {
        self.columns.get(&id).map(|column| Column::downcast(&**column))
    }

    /// Mutable variant of [`Archetype::column`].
    ///
    /// # Panics
    ///
    /// Panics if the column for `id` does not store `T`.
    pub fn column_mut<T: Component>(&mut self, id: ComponentId) -> Option<&mut Column<T>> {
        self.columns
            .get_mut(&id)
            .map(|column| Column::downcast_mut(&mut **column))
    }

    /// Value of kind `T` at `row`.
    ///
    /// # Panics
    ///
    /// Panics if the kind is not stored here or `row` is out of range.
    #[must_use]
    pub fn get_component<T: Component>(&self, id: ComponentId, row: usize) -> &T {
        self.column::<T>(id)
            .unwrap_or_else(|| missing_column(id))
            .get(row)
    }

    /// Mutable variant of [`Archetype::get_component`].
    ///
    /// # Panics
    ///
    /// Panics if the kind is not stored here or `row` is out of range.
    pub fn get_component_mut<T: Component>(&mut self, id: ComponentId, row: usize) -> &mut T {
        self.column_mut::<T>(id)
            .unwrap_or_else(|| missing_column(id))
            .get_mut(row)
    }

    /// Every column, for callers that need several of them mutably at once.
    pub(crate) fn columns_mut(
        &mut self,
    ) -> impl Iterator<Item = (ComponentId, &mut dyn ErasedColumn)> + '_ {
        self.columns
            .iter_mut()
            .map(|(&id, column)| (id, &mut **column as &mut dyn ErasedColumn))
    }

    // ========================================================================
    // ROW OPERATIONS
    // ========================================================================

    /// Appends a row to the identity column only and returns its index.
    ///
    /// The row is incomplete until a value has been pushed to every other
    /// column.
    pub fn push_entity(&mut self, id: EntityId) -> usize {
        let identity = self.identity_mut();
        identity.push(id);
        identity.as_slice().len() - 1
    }

    /// Appends `value` to the column for `id`.
    ///
    /// # Panics
    ///
    /// Panics if the kind is not stored here.
    pub fn push_component<T: Component>(&mut self, id: ComponentId, value: T) {
        self.column_mut::<T>(id)
            .unwrap_or_else(|| missing_column(id))
            .push(value);
    }

    /// Appends the value built by `make` to the column for `id`.
    ///
    /// # Panics
    ///
    /// Panics if the kind is not stored here.
    pub fn emplace_component_with<T: Component>(
        &mut self,
        id: ComponentId,
        make: impl FnOnce() -> T,
    ) {
        self.push_component(id, make());
    }

    /// Swap-removes `row` from every column.
    ///
    /// Returns the entity now stored at `row` (the former last row). When
    /// `row` was already last, that is the erased entity itself.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    pub fn erase(&mut self, row: usize) -> EntityId {
        let len = self.len();
        assert!(row < len, "row {row} out of range for archetype of {len} rows");
        let last = len - 1;
        let moved = self.entity_at(last);
        for column in self.columns.values_mut() {
            if row != last {
                column.swap(row, last);
            }
            column.pop_last();
        }
        moved
    }

    /// Appends a row for `id` and moves into it every value `from` stores at
    /// `row` for kinds both tables share.
    ///
    /// The source row is left holding defaults and must be erased by the
    /// caller afterwards.
    pub fn carry_entity(&mut self, row: usize, id: EntityId, from: &mut Self) -> usize {
        let new_row = self.push_entity(id);
        for (component, column) in &mut self.columns {
            if *component == ENTITY_COMPONENT_ID {
                continue;
            }
            if let Some(source) = from.columns.get_mut(component) {
                column.append_move(row, &mut **source);
            }
        }
        new_row
    }

    /// Like [`Archetype::carry_entity`], but copies and leaves `from` intact.
    pub fn copy_entity(&mut self, row: usize, id: EntityId, from: &Self) -> usize {
        let new_row = self.push_entity(id);
        for (component, column) in &mut self.columns {
            if *component == ENTITY_COMPONENT_ID {
                continue;
            }
            if let Some(source) = from.columns.get(component) {
                column.append_copy(row, &**source);
            }
        }
        new_row
    }

    /// Appends a copy of `row` owned by `id` and returns the new row.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    pub fn duplicate_row(&mut self, row: usize, id: EntityId) -> usize {
        let len = self.len();
        assert!(row < len, "row {row} out of range for archetype of {len} rows");
        let new_row = self.push_entity(id);
        for (component, column) in &mut self.columns {
            if *component != ENTITY_COMPONENT_ID {
                column.append_duplicate(row);
            }
        }
        new_row
    }

    // ========================================================================
    // HOUSEKEEPING
    // ========================================================================

    /// Drops every row. Columns are kept.
    pub fn clear(&mut self) {
        for column in self.columns.values_mut() {
            column.clear();
        }
    }

    /// Reserves room for `additional` more rows in every column.
    pub fn reserve(&mut self, additional: usize) {
        for column in self.columns.values_mut() {
            column.reserve(additional);
        }
    }

    /// Moves every row into a new table, leaving `self` empty with the same
    /// structure.
    #[must_use]
    pub fn take(&mut self) -> Self {
        let columns = self
            .columns
            .iter_mut()
            .map(|(&id, column)| (id, column.take()))
            .collect();
        Self {
            signature: self.signature,
            columns,
            shrink: self.shrink,
        }
    }

    fn identity(&self) -> &Column<EntityId> {
        self.column(ENTITY_COMPONENT_ID)
            .unwrap_or_else(|| missing_column(ENTITY_COMPONENT_ID))
    }

    fn identity_mut(&mut self) -> &mut Column<EntityId> {
        self.column_mut(ENTITY_COMPONENT_ID)
            .unwrap_or_else(|| missing_column(ENTITY_COMPONENT_ID))
    }
}

impl Clone for Archetype {
    fn clone(&self) -> Self {
        Self {
            signature: self.signature,
            columns: self
                .columns
                .iter()
                .map(|(&id, column)| (id, column.deep_copy()))
                .collect(),
            shrink: self.shrink,
        }
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("signature", &self.signature)
            .field("rows", &self.len())
            .finish_non_exhaustive()
    }
}

#[cold]
#[inline(never)]
fn missing_column(id: ComponentId) -> ! {
    panic!("archetype has no column for component {id}")
}
