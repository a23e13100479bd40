//! Binder: the public copy-on-write facade over a shared [`SeqMap`] payload.

use crate::seq_map::{Iter as SeqIter, SeqMap};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::rc::Rc;
use thiserror::Error;

/// Failure modes of [`Binder`] operations.
///
/// Precondition failures are detected before any payload copying, so a
/// failed call never clones and never changes what the binder shares with
/// its copies.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum BinderError {
    #[error("key already present")]
    DuplicateKey,
    /// `insert_after` given an absent predecessor key or a duplicate new key.
    #[error("invalid key")]
    InvalidKey,
    #[error("key not found")]
    KeyNotFound,
    #[error("binder is empty")]
    Empty,
}

/// An insertion-ordered key-value map with O(1) copy-on-write sharing.
///
/// `Clone` is O(1): both binders share one payload until either is
/// structurally mutated, at which point the mutator deep-copies its private
/// payload first. The non-mutated copy is never observed to change. A
/// mutation that fails (precondition error, or a panic in `K::clone`/
/// `V::clone` while copying a shared payload) leaves the binder exactly as
/// it was, including its sharing relationships.
///
/// Handing out `&mut V` via [`read_mut`](Binder::read_mut) counts as a
/// structural mutation: the write through the reference happens later,
/// outside the binder's sight, so exclusivity must be forced up front.
///
/// Single-threaded: payloads are `Rc`-shared, so `Binder` is `!Send` and
/// `!Sync`.
pub struct Binder<K, V, S = RandomState> {
    payload: Rc<SeqMap<K, V, S>>,
}

impl<K, V> Binder<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for Binder<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// O(1): the copy shares the source's payload.
impl<K, V, S> Clone for Binder<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            payload: Rc::clone(&self.payload),
        }
    }
}

impl<K, V, S> Binder<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            payload: Rc::new(SeqMap::with_hasher(hasher)),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.payload.contains_key(key)
    }

    /// Borrow the value bound to `key`. Never clones the payload.
    pub fn read<Q>(&self, key: &Q) -> Result<&V, BinderError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.payload.get(key).ok_or(BinderError::KeyNotFound)
    }

    /// Values in sequence order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.payload.iter(),
        }
    }

    /// `(key, value)` pairs in sequence order.
    pub fn entries(&self) -> Entries<'_, K, V> {
        Entries {
            inner: self.payload.iter(),
        }
    }

    /// Whether `self` and `other` currently share one payload.
    pub fn shares_storage(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.payload, &other.payload)
    }

    /// Whether any other binder currently shares this payload.
    pub fn is_shared(&self) -> bool {
        Rc::strong_count(&self.payload) > 1
    }

    /// Remove every entry. A no-op on an empty binder. When the payload is
    /// shared there is nothing worth copying: the other holders keep it and
    /// this binder starts over with a fresh empty payload.
    pub fn clear(&mut self) {
        if self.payload.is_empty() {
            return;
        }
        match Rc::get_mut(&mut self.payload) {
            Some(map) => map.clear(),
            None => {
                let hasher = self.payload.hasher().clone();
                self.payload = Rc::new(SeqMap::with_hasher(hasher));
            }
        }
    }
}

impl<K, V, S> Binder<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    // Clone-if-shared. `SeqMap::clone` preserves locators, so lookups done
    // before this call stay valid against the returned payload. A panic
    // while cloning drops the partial copy and leaves `self.payload`
    // untouched.
    fn make_exclusive(&mut self) -> &mut SeqMap<K, V, S> {
        Rc::make_mut(&mut self.payload)
    }

    /// Insert `(key, value)` as the new first entry.
    ///
    /// The duplicate check runs against the shared payload, so a rejected
    /// insert never triggers copying.
    pub fn insert_front(&mut self, key: K, value: V) -> Result<(), BinderError> {
        if self.payload.contains_key(&key) {
            return Err(BinderError::DuplicateKey);
        }
        match self.make_exclusive().push_front(key, value) {
            Ok(_) => Ok(()),
            Err(_) => Err(BinderError::DuplicateKey),
        }
    }

    /// Insert `(key, value)` immediately after the entry bound to `prev`.
    pub fn insert_after<Q>(&mut self, prev: &Q, key: K, value: V) -> Result<(), BinderError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let prev_loc = self.payload.find(prev).ok_or(BinderError::InvalidKey)?;
        if self.payload.contains_key::<K>(&key) {
            return Err(BinderError::InvalidKey);
        }
        match self.make_exclusive().insert_after(prev_loc, key, value) {
            Ok(_) => Ok(()),
            Err(_) => Err(BinderError::InvalidKey),
        }
    }

    /// Remove and return the first entry.
    pub fn remove_front(&mut self) -> Result<(K, V), BinderError> {
        if self.payload.is_empty() {
            return Err(BinderError::Empty);
        }
        Ok(self
            .make_exclusive()
            .pop_front()
            .expect("payload is non-empty"))
    }

    /// Remove and return the entry bound to `key`.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<(K, V), BinderError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let loc = self.payload.find(key).ok_or(BinderError::KeyNotFound)?;
        Ok(self
            .make_exclusive()
            .remove(loc)
            .expect("locator stays valid across the payload clone"))
    }

    /// Mutably borrow the value bound to `key`, forcing exclusivity first.
    ///
    /// The missing-key check runs against the shared payload, so a failed
    /// lookup never triggers copying. Exclusivity is forced even if the
    /// caller never writes through the returned reference.
    pub fn read_mut<Q>(&mut self, key: &Q) -> Result<&mut V, BinderError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let loc = self.payload.find(key).ok_or(BinderError::KeyNotFound)?;
        Ok(self
            .make_exclusive()
            .value_mut(loc)
            .expect("locator stays valid across the payload clone"))
    }
}

/// Value-wise equality in sequence order; keys are not compared.
impl<K, V, S> PartialEq for Binder<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher + Clone + Default,
{
    fn eq(&self, other: &Self) -> bool {
        if self.shares_storage(other) {
            return true;
        }
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<K, V, S> Eq for Binder<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher + Clone + Default,
{
}

impl<K, V, S> fmt::Debug for Binder<K, V, S>
where
    K: Eq + Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher + Clone + Default,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

/// Iterator over a binder's values in sequence order.
pub struct Iter<'a, K, V> {
    inner: SeqIter<'a, K, V>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = &'a V;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, _, v)| v)
    }
}

/// Iterator over a binder's `(key, value)` pairs in sequence order.
pub struct Entries<'a, K, V> {
    inner: SeqIter<'a, K, V>,
}

impl<'a, K, V> Iterator for Entries<'a, K, V> {
    type Item = (&'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, k, v)| (k, v))
    }
}

impl<'a, K, V, S> IntoIterator for &'a Binder<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    type Item = &'a V;
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
