//! # Columns
//!
//! Dense storage for one component kind inside an archetype.
//!
//! An archetype holds columns of different types side by side, so it only
//! ever sees them through [`ErasedColumn`]. Typed access goes through a
//! downcast to [`Column<T>`], which is always valid because columns are keyed
//! by the [`ComponentId`](super::ComponentId) of the type they store.

use std::any::{type_name, Any};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::component::Component;

/// Whether a column hands memory back as it empties.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShrinkPolicy {
    /// Capacity only grows.
    #[default]
    Never,
    /// Halve capacity whenever length drops under half of it.
    HalfCapacity,
}

/// Capability set an archetype needs from a column, independent of the
/// concrete component type.
///
/// Methods taking another column (`append_copy`, `append_move`) require both
/// columns to store the same kind and panic otherwise.
pub trait ErasedColumn: Any + Send + Sync {
    /// Returns an immutable type-erased reference for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable type-erased reference for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Human-readable name of the stored type.
    fn component_name(&self) -> &'static str;

    /// Appends a copy of `source[index]`.
    fn append_copy(&mut self, index: usize, source: &dyn ErasedColumn);

    /// Appends `source[index]`, leaving a default value in its place.
    ///
    /// The source row is expected to be erased right after.
    fn append_move(&mut self, index: usize, source: &mut dyn ErasedColumn);

    /// Appends a copy of this column's own element at `index`.
    fn append_duplicate(&mut self, index: usize);

    /// Swaps two elements.
    fn swap(&mut self, a: usize, b: usize);

    /// Drops the last element.
    fn pop_last(&mut self);

    /// Number of stored elements.
    fn len(&self) -> usize;

    /// True if no element is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserves room for `additional` more elements.
    fn reserve(&mut self, additional: usize);

    /// Allocated element capacity.
    fn capacity(&self) -> usize;

    /// Drops every element.
    fn clear(&mut self);

    /// New empty column of the same concrete type and policy.
    fn clone_structure(&self) -> Box<dyn ErasedColumn>;

    /// Independent copy of the whole column.
    fn deep_copy(&self) -> Box<dyn ErasedColumn>;

    /// Moves every element into a new column, leaving `self` empty.
    fn take(&mut self) -> Box<dyn ErasedColumn>;
}

/// A homogeneous, densely packed sequence of one component kind.
#[derive(Clone)]
pub struct Column<T: Component> {
    data: Vec<T>,
    shrink: ShrinkPolicy,
}

impl<T: Component> Column<T> {
    /// Creates an empty column.
    #[must_use]
    pub fn new(shrink: ShrinkPolicy) -> Self {
        Self {
            data: Vec::new(),
            shrink,
        }
    }

    /// Downcasts an erased column.
    ///
    /// # Panics
    ///
    /// Panics if `column` does not store `T`.
    #[must_use]
    pub fn downcast(column: &dyn ErasedColumn) -> &Self {
        let found = column.component_name();
        column
            .as_any()
            .downcast_ref::<Self>()
            .unwrap_or_else(|| kind_mismatch::<T>(found))
    }

    /// Mutable variant of [`Column::downcast`].
    ///
    /// # Panics
    ///
    /// Panics if `column` does not store `T`.
    pub fn downcast_mut(column: &mut dyn ErasedColumn) -> &mut Self {
        let found = column.component_name();
        column
            .as_any_mut()
            .downcast_mut::<Self>()
            .unwrap_or_else(|| kind_mismatch::<T>(found))
    }

    /// Appends a value.
    #[inline]
    pub fn push(&mut self, value: T) {
        self.data.push(value);
    }

    /// Returns the element at `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize) -> &T {
        let len = self.data.len();
        self.data
            .get(row)
            .unwrap_or_else(|| row_out_of_range::<T>(row, len))
    }

    /// Returns the element at `row` mutably.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    #[inline]
    pub fn get_mut(&mut self, row: usize) -> &mut T {
        let len = self.data.len();
        self.data
            .get_mut(row)
            .unwrap_or_else(|| row_out_of_range::<T>(row, len))
    }

    /// Moves the value at `row` out, leaving a default in its place.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    pub fn take_at(&mut self, row: usize) -> T {
        std::mem::take(self.get_mut(row))
    }

    /// All elements, in row order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// All elements, mutably.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Iterates over all elements.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    fn maybe_shrink(&mut self) {
        if self.shrink == ShrinkPolicy::HalfCapacity && self.data.len() < self.data.capacity() / 2 {
            self.data.shrink_to(self.data.capacity() / 2);
        }
    }
}

impl<T: Component> Default for Column<T> {
    fn default() -> Self {
        Self::new(ShrinkPolicy::default())
    }
}

impl<T: Component> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("component", &type_name::<T>())
            .field("len", &self.data.len())
            .field("capacity", &self.data.capacity())
            .finish()
    }
}

impl<T: Component> ErasedColumn for Column<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn component_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn append_copy(&mut self, index: usize, source: &dyn ErasedColumn) {
        let value = Self::downcast(source).get(index).clone();
        self.data.push(value);
    }

    fn append_move(&mut self, index: usize, source: &mut dyn ErasedColumn) {
        let value = Self::downcast_mut(source).take_at(index);
        self.data.push(value);
    }

    fn append_duplicate(&mut self, index: usize) {
        let value = self.get(index).clone();
        self.data.push(value);
    }

    #[inline]
    fn swap(&mut self, a: usize, b: usize) {
        self.data.swap(a, b);
    }

    #[inline]
    fn pop_last(&mut self) {
        self.data.pop();
        self.maybe_shrink();
    }

    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }

    fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional);
    }

    fn capacity(&self) -> usize {
        self.data.capacity()
    }

    fn clear(&mut self) {
        self.data.clear();
        self.maybe_shrink();
    }

    fn clone_structure(&self) -> Box<dyn ErasedColumn> {
        Box::new(Self::new(self.shrink))
    }

    fn deep_copy(&self) -> Box<dyn ErasedColumn> {
        Box::new(self.clone())
    }

    fn take(&mut self) -> Box<dyn ErasedColumn> {
        Box::new(Self {
            data: std::mem::take(&mut self.data),
            shrink: self.shrink,
        })
    }
}

#[cold]
#[inline(never)]
fn kind_mismatch<T>(found: &str) -> ! {
    panic!("column kind mismatch: expected {}, found {found}", type_name::<T>())
}

#[cold]
#[inline(never)]
fn row_out_of_range<T>(row: usize, len: usize) -> ! {
    panic!("row {row} out of range for column {} of length {len}", type_name::<T>())
}
