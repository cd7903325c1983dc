//! Densely numbered entity references as mapping keys.

use crate::EntityRef;
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};
use core::slice;

/// A primary mapping `K -> V` allocating dense entity references.
///
/// A `PrimaryMap` owns the storage for a given kind of entity, and is
/// responsible for allocating the `K` keys handed out to the rest of the
/// compiler — callers can only obtain a `K` by calling `push`.
#[derive(Debug, Clone)]
pub struct PrimaryMap<K: EntityRef, V> {
    elems: Vec<V>,
    unused: PhantomData<K>,
}

impl<K: EntityRef, V> PrimaryMap<K, V> {
    /// Create a new empty map.
    pub fn new() -> Self {
        Self {
            elems: Vec::new(),
            unused: PhantomData,
        }
    }

    /// Create a new empty map with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elems: Vec::with_capacity(capacity),
            unused: PhantomData,
        }
    }

    /// Check if `k` is a valid key in the map.
    pub fn is_valid(&self, k: K) -> bool {
        k.index() < self.elems.len()
    }

    /// Get the element at `k` if it exists.
    pub fn get(&self, k: K) -> Option<&V> {
        self.elems.get(k.index())
    }

    /// Get the element at `k` mutably if it exists.
    pub fn get_mut(&mut self, k: K) -> Option<&mut V> {
        self.elems.get_mut(k.index())
    }

    /// Number of elements in the map.
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Is the map empty?
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Append `v` and return a fresh key for it.
    pub fn push(&mut self, v: V) -> K {
        let k = K::new(self.elems.len());
        self.elems.push(v);
        k
    }

    /// Iterate over the keys and values, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.elems
            .iter()
            .enumerate()
            .map(|(i, v)| (K::new(i), v))
    }

    /// Iterate over the keys and values mutably, in key order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> {
        self.elems
            .iter_mut()
            .enumerate()
            .map(|(i, v)| (K::new(i), v))
    }

    /// Iterate over the values only.
    pub fn values(&self) -> slice::Iter<V> {
        self.elems.iter()
    }

    /// Iterate over the values mutably.
    pub fn values_mut(&mut self) -> slice::IterMut<V> {
        self.elems.iter_mut()
    }

    /// The next key that `push` would hand out.
    pub fn next_key(&self) -> K {
        K::new(self.elems.len())
    }
}

impl<K: EntityRef, V> Default for PrimaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef, V> Index<K> for PrimaryMap<K, V> {
    type Output = V;

    fn index(&self, k: K) -> &V {
        &self.elems[k.index()]
    }
}

impl<K: EntityRef, V> IndexMut<K> for PrimaryMap<K, V> {
    fn index_mut(&mut self, k: K) -> &mut V {
        &mut self.elems[k.index()]
    }
}

/// A mapping `K -> V` for densely indexed entity references, with a default
/// value standing in for any key that was never explicitly set.
///
/// Unlike `PrimaryMap`, a `SecondaryMap` can't allocate keys — it's used to
/// attach secondary information (liveness, register assignment, scheduling
/// state, ...) to entities allocated elsewhere.
#[derive(Debug, Clone)]
pub struct SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    elems: Vec<V>,
    default: V,
    unused: PhantomData<K>,
}

impl<K, V> SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone + Default,
{
    /// Create a new empty map using `V::default()` as the default value.
    pub fn new() -> Self {
        Self {
            elems: Vec::new(),
            default: V::default(),
            unused: PhantomData,
        }
    }
}

impl<K, V> Default for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    /// Create a new empty map with an explicit default value.
    ///
    /// Useful when `V` doesn't implement `Default`, or the default isn't
    /// `V::default()` (e.g. a `RegMask` whose "empty" value is all-ones).
    pub fn with_default(default: V) -> Self {
        Self {
            elems: Vec::new(),
            default,
            unused: PhantomData,
        }
    }

    /// Get the element at `k`; returns the default if it was never set.
    pub fn get(&self, k: K) -> &V {
        self.elems.get(k.index()).unwrap_or(&self.default)
    }

    /// Resize the backing storage (with clones of the default) so that `k`
    /// is a valid index, then return a mutable reference to it.
    pub fn get_mut(&mut self, k: K) -> &mut V {
        let i = k.index();
        if i >= self.elems.len() {
            self.elems.resize(i + 1, self.default.clone());
        }
        &mut self.elems[i]
    }

    /// Number of elements actually stored (not necessarily in sync with any
    /// corresponding `PrimaryMap`'s length).
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Is the map completely empty?
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Remove all explicitly-set entries.
    pub fn clear(&mut self) {
        self.elems.clear();
    }
}

impl<K, V> Index<K> for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    type Output = V;

    fn index(&self, k: K) -> &V {
        self.get(k)
    }
}

impl<K, V> IndexMut<K> for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    fn index_mut(&mut self, k: K) -> &mut V {
        self.get_mut(k)
    }
}
