//! Densely numbered entity references, in the style of a small compiler IR:
//! every entity in the datapath engine (source entities, nodes, arrays) is a
//! `u32` index into an arena `Vec`, never a pointer or a `Rc`.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A type that can be used as a dense key into a [`PrimaryMap`] or
/// [`SecondaryMap`].
pub trait EntityRef: Copy + Eq {
    fn new(index: usize) -> Self;
    fn index(self) -> usize;
}

/// Defines a newtype wrapping a `u32` and implements [`EntityRef`], `Debug`
/// and `Display` for it. Mirrors the `entity_impl!` macro used throughout
/// compiler-IR crates to avoid writing this boilerplate by hand for every
/// entity kind.
macro_rules! entity_impl {
    ($entity:ident, $display_prefix:expr) => {
        impl $crate::entity::EntityRef for $entity {
            fn new(index: usize) -> Self {
                debug_assert!(index < (u32::MAX as usize));
                $entity(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $entity {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}{}", $display_prefix, self.0)
            }
        }

        impl fmt::Debug for $entity {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }
    };
}
pub(crate) use entity_impl;

/// An append-only arena mapping `K -> V`; `K` values are handed out in
/// insertion order by [`PrimaryMap::push`]. This is the only way to create
/// new keys of type `K`.
#[derive(Debug, Clone)]
pub struct PrimaryMap<K: EntityRef, V> {
    elems: Vec<V>,
    unused: PhantomData<K>,
}

impl<K: EntityRef, V> PrimaryMap<K, V> {
    pub fn new() -> Self {
        Self { elems: Vec::new(), unused: PhantomData }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self { elems: Vec::with_capacity(cap), unused: PhantomData }
    }

    pub fn push(&mut self, value: V) -> K {
        let k = K::new(self.elems.len());
        self.elems.push(value);
        k
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn get(&self, k: K) -> Option<&V> {
        self.elems.get(k.index())
    }

    pub fn get_mut(&mut self, k: K) -> Option<&mut V> {
        self.elems.get_mut(k.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.elems.iter().enumerate().map(|(i, v)| (K::new(i), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> {
        self.elems.iter_mut().enumerate().map(|(i, v)| (K::new(i), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.elems.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> {
        (0..self.elems.len()).map(K::new)
    }

    pub fn clear(&mut self) {
        self.elems.clear()
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

/// A map `K -> V` that behaves as if every key already has a default entry;
/// used to attach secondary information (e.g. scheduling state) to entities
/// allocated by a [`PrimaryMap`] without growing the primary arena's value
/// type.
#[derive(Debug, Clone)]
pub struct SecondaryMap<K: EntityRef, V: Clone> {
    elems: Vec<V>,
    default: V,
    unused: PhantomData<K>,
}

impl<K: EntityRef, V: Clone + Default> SecondaryMap<K, V> {
    pub fn new() -> Self {
        Self { elems: Vec::new(), default: V::default(), unused: PhantomData }
    }
}

impl<K: EntityRef, V: Clone + Default> Default for SecondaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef, V: Clone> SecondaryMap<K, V> {
    pub fn with_default(default: V) -> Self {
        Self { elems: Vec::new(), default, unused: PhantomData }
    }

    pub fn get(&self, k: K) -> &V {
        self.elems.get(k.index()).unwrap_or(&self.default)
    }

    pub fn clear(&mut self) {
        self.elems.clear()
    }

    fn ensure(&mut self, i: usize) {
        if i >= self.elems.len() {
            self.elems.resize(i + 1, self.default.clone());
        }
    }
}

impl<K: EntityRef, V: Clone> Index<K> for SecondaryMap<K, V> {
    type Output = V;
    fn index(&self, k: K) -> &V {
        self.get(k)
    }
}

impl<K: EntityRef, V: Clone> IndexMut<K> for SecondaryMap<K, V> {
    fn index_mut(&mut self, k: K) -> &mut V {
        self.ensure(k.index());
        &mut self.elems[k.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, PartialEq, Eq)]
    struct E(u32);
    entity_impl!(E, "e");

    #[test]
    fn primary_map_hands_out_increasing_keys() {
        let mut m: PrimaryMap<E, &str> = PrimaryMap::new();
        let a = m.push("a");
        let b = m.push("b");
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(m[a], "a");
        assert_eq!(m[b], "b");
    }

    #[test]
    fn secondary_map_defaults_untouched_keys() {
        let mut m: SecondaryMap<E, u32> = SecondaryMap::new();
        let k = E::new(5);
        assert_eq!(m[k], 0);
        m[k] = 42;
        assert_eq!(m[k], 42);
        assert_eq!(m[E::new(0)], 0);
    }
}
