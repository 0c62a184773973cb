//! Arena storage for expression nodes.
//!
//! Provides dense, total-orderable index newtypes (`NodeIndex` for input
//! expressions, `MergedIndex` for merged expressions) and `NodeArena`
//! (contiguous, append-only storage). Nodes reference each other by index,
//! never by pointer, so signature tables and mappings can be plain vectors
//! keyed by index.
//!
//! There is no removal and no free list. An expression is built once and
//! then only read, so a slot index is also a stable identity for the
//! lifetime of the expression, and parallel vectors (signatures, parents,
//! ranks) can be indexed by it without bounds bookkeeping beyond `len`.
//!
//! # Determinism
//! - Index ordering is by the inner `u32`.
//! - Iteration order over slots is by index (0..len).
//! - Allocation is append-only: the same sequence of allocations always
//!   yields the same indices.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Dense index types usable as arena keys.
pub trait ArenaIndex: Copy + Eq + Ord + Hash + fmt::Debug {
    /// Builds an index from a raw slot number.
    fn from_raw(raw: u32) -> Self;

    /// Returns the raw slot number.
    fn as_u32(&self) -> u32;

    /// Returns the slot number as a `usize` for vector indexing.
    #[inline]
    fn as_usize(&self) -> usize {
        self.as_u32() as usize
    }
}

macro_rules! arena_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Creates an index from a raw `u32`.
            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Returns the raw `u32` index.
            #[inline]
            pub const fn get(&self) -> u32 {
                self.0
            }

            /// Maximum possible index (sentinel use only).
            pub const MAX: $name = $name(u32::MAX);
        }

        impl ArenaIndex for $name {
            #[inline]
            fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            fn as_u32(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "[{}]", self.0)
            }
        }
    };
}

arena_index!(
    /// Position of a node within its own input expression.
    ///
    /// Indices are tree-local: `NodeIndex(3)` in the reference expression has
    /// nothing to do with `NodeIndex(3)` in the comparison expression.
    NodeIndex
);

arena_index!(
    /// Position of a node within a merged expression.
    MergedIndex
);

/// Contiguous, append-only storage for node data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeArena<I, T> {
    slots: Vec<T>,
    _index: PhantomData<I>,
}

impl<I: ArenaIndex, T> NodeArena<I, T> {
    /// Creates a new empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            _index: PhantomData,
        }
    }

    /// Creates an empty arena with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            _index: PhantomData,
        }
    }

    /// Index the next call to [`allocate`](Self::allocate) will return.
    #[inline]
    pub fn next_index(&self) -> I {
        I::from_raw(self.slots.len() as u32)
    }

    /// Appends `data` and returns its index.
    pub fn allocate(&mut self, data: T) -> I {
        let id = self.next_index();
        self.slots.push(data);
        id
    }

    /// Returns a reference to the data stored at `id`, if present.
    #[inline]
    pub fn get(&self, id: I) -> Option<&T> {
        self.slots.get(id.as_usize())
    }

    /// Returns a mutable reference to the data stored at `id`, if present.
    #[inline]
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots.get_mut(id.as_usize())
    }

    /// Returns `true` if `id` addresses a live slot.
    #[inline]
    pub fn contains(&self, id: I) -> bool {
        id.as_usize() < self.slots.len()
    }

    /// Number of stored nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the arena holds no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates over all nodes in deterministic order (by index).
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, data)| (I::from_raw(idx as u32), data))
    }

    /// Iterates over all indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = I> {
        (0..self.slots.len() as u32).map(I::from_raw)
    }
}

impl<I: ArenaIndex, T> Default for NodeArena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_basic() {
        let mut arena: NodeArena<NodeIndex, &'static str> = NodeArena::new();
        assert!(arena.is_empty());
        assert_eq!(arena.next_index(), NodeIndex::new(0));

        let a = arena.allocate("hello");
        let b = arena.allocate("world");
        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 1);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a), Some(&"hello"));
        assert_eq!(arena.get(NodeIndex::new(7)), None);
        assert!(!arena.contains(NodeIndex::new(2)));

        *arena.get_mut(b).unwrap() = "there";
        assert_eq!(arena.get(b), Some(&"there"));
    }

    #[test]
    fn deterministic_iteration() {
        let mut arena: NodeArena<MergedIndex, i32> = NodeArena::new();
        for value in [30, 10, 20] {
            arena.allocate(value);
        }
        let collected: Vec<_> = arena.iter().map(|(id, &v)| (id.get(), v)).collect();
        assert_eq!(collected, vec![(0, 30), (1, 10), (2, 20)]);
        let ids: Vec<_> = arena.indices().collect();
        assert_eq!(ids, vec![MergedIndex::new(0), MergedIndex::new(1), MergedIndex::new(2)]);
    }

    #[test]
    fn index_display() {
        assert_eq!(NodeIndex::new(12).to_string(), "[12]");
        assert!(NodeIndex::new(1) < NodeIndex::MAX);
    }
}
