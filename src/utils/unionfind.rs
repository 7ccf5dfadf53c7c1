//! A disjoint-set forest for equivalence classes.
//!
//! Reaching-definitions uses this to collapse the placeholder φ it installs at a loop header
//! with the real φ it creates once the loop body has been walked.
//!
//! # Example
//!
//! ```rust
//! use fpy_core::utils::UnionFind;
//!
//! let mut uf = UnionFind::new();
//! uf.add(1);
//! uf.add(2);
//! uf.add(3);
//! uf.union(&1, &2);
//!
//! assert_eq!(uf.find(&2), Some(1));
//! assert_eq!(uf.find(&3), Some(3));
//! assert_eq!(uf.representatives().len(), 2);
//! ```

use std::{
    collections::{hash_map::Entry, HashMap},
    hash::Hash,
};

/// Disjoint sets over hashable elements, with path compression.
///
/// Elements are kept in insertion order so iteration and the representative list are
/// deterministic.
#[derive(Debug, Clone)]
pub struct UnionFind<T> {
    /// Element to its slot.
    index: HashMap<T, usize>,
    /// Slot to element.
    elements: Vec<T>,
    /// Slot to parent slot; roots point at themselves.
    parent: Vec<usize>,
}

impl<T> Default for UnionFind<T> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            elements: Vec::new(),
            parent: Vec::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> UnionFind<T> {
    /// Creates an empty forest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `x` as a singleton class. Adding an element twice is a no-op.
    ///
    /// # Returns
    ///
    /// The representative of `x`'s class.
    pub fn add(&mut self, x: T) -> T {
        let slot = match self.index.entry(x) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let slot = self.elements.len();
                self.elements.push(entry.key().clone());
                self.parent.push(slot);
                entry.insert(slot);
                slot
            }
        };
        let root = self.root(slot);
        self.elements[root].clone()
    }

    fn root(&mut self, slot: usize) -> usize {
        let mut root = slot;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = slot;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Returns the representative of `x`'s class, or `None` if `x` was never added.
    pub fn find(&mut self, x: &T) -> Option<T> {
        let slot = *self.index.get(x)?;
        let root = self.root(slot);
        Some(self.elements[root].clone())
    }

    /// Merges the classes of `a` and `b`, adding either if missing.
    ///
    /// The representative of `a`'s class becomes the representative of the merged class.
    ///
    /// # Returns
    ///
    /// The representative of the merged class.
    pub fn union(&mut self, a: &T, b: &T) -> T {
        self.add(a.clone());
        self.add(b.clone());
        let (sa, sb) = (self.index[a], self.index[b]);
        let ra = self.root(sa);
        let rb = self.root(sb);
        if ra != rb {
            self.parent[rb] = ra;
        }
        self.elements[ra].clone()
    }

    /// Returns `true` if `a` and `b` are in the same class.
    pub fn same(&mut self, a: &T, b: &T) -> bool {
        match (self.find(a), self.find(b)) {
            (Some(ra), Some(rb)) => ra == rb,
            _ => false,
        }
    }

    /// All members of `x`'s class, in insertion order. Empty if `x` was never added.
    pub fn component(&mut self, x: &T) -> Vec<T> {
        let Some(&slot) = self.index.get(x) else {
            return Vec::new();
        };
        let root = self.root(slot);
        let mut members = Vec::new();
        for i in 0..self.elements.len() {
            if self.root(i) == root {
                members.push(self.elements[i].clone());
            }
        }
        members
    }

    /// One representative per class, in order of first insertion of the class's root.
    pub fn representatives(&mut self) -> Vec<T> {
        let mut reps = Vec::new();
        for i in 0..self.elements.len() {
            if self.root(i) == i {
                reps.push(self.elements[i].clone());
            }
        }
        reps
    }

    /// Iterates over every element in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.iter()
    }

    /// Number of elements (not classes).
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if no element was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
