//! SeqMap: structural layer. An insertion-ordered sequence with stable
//! locators and a hashed key index.
//!
//! Entries live in a `SlotMap` arena and are threaded into a doubly-linked
//! list through their slot keys, so the sequence order is explicit and a
//! [`Locator`] stays valid across unrelated edits. A `HashTable` maps each
//! key's precomputed hash to its slot for O(1) average lookup. `K: Hash` is
//! never invoked after insertion; indexing always uses the stored hash.
//!
//! Cloning a `SeqMap` deep-copies every entry. `SlotMap` cloning preserves
//! slot keys, so locators (and the head/tail/link structure) taken from the
//! original resolve identically in the copy.

use crate::reentry::ReentryCheck;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;
use thiserror::Error;

/// Stable position in a [`SeqMap`] sequence. Generational: a locator for a
/// removed entry never resolves again, even if the slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Locator(DefaultKey);

impl Locator {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Locator(k)
    }
    pub(crate) fn raw(&self) -> DefaultKey {
        self.0
    }
}

#[derive(Clone, Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    hash: u64,
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

pub struct SeqMap<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Node<K, V>>,
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
    reentry: ReentryCheck,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum InsertError {
    #[error("key already present")]
    DuplicateKey,
    #[error("locator does not refer to a live entry")]
    InvalidLocator,
}

impl<K, V> SeqMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for SeqMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a `SeqMap` in sequence order (front to back).
pub struct Iter<'a, K, V> {
    slots: &'a SlotMap<DefaultKey, Node<K, V>>,
    cursor: Option<DefaultKey>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Locator, &'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cursor?;
        let slots: &'a SlotMap<DefaultKey, Node<K, V>> = self.slots;
        let node = &slots[k];
        self.cursor = node.next;
        Some((Locator::new(k), &node.key, &node.value))
    }
}

impl<K, V, S> SeqMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
            head: None,
            tail: None,
            reentry: ReentryCheck::new(),
        }
    }

    pub(crate) fn hasher(&self) -> &S {
        &self.hasher
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Locator of the first entry in sequence order, if any.
    pub fn front(&self) -> Option<Locator> {
        self.head.map(Locator::new)
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Locator>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _lock = self.reentry.lock();
        let hash = self.make_hash(q);
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|n| n.key.borrow() == q)
                    .unwrap_or(false)
            })
            .map(|&k| Locator::new(k))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    /// Borrow the value for `q` directly, without going through a locator.
    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let loc = self.find(q)?;
        self.value(loc)
    }

    /// Insert a new entry at the front of the sequence.
    ///
    /// All user code (hashing, equality probing) runs before the first
    /// structural edit; the edit phase itself cannot unwind.
    pub fn push_front(&mut self, key: K, value: V) -> Result<Locator, InsertError> {
        let _lock = self.reentry.lock();
        let hash = self.make_hash(&key);
        match self.index.entry(
            hash,
            |&kk| self.slots.get(kk).map(|n| n.key == key).unwrap_or(false),
            |&kk| self.slots.get(kk).map(|n| n.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(_) => Err(InsertError::DuplicateKey),
            hashbrown::hash_table::Entry::Vacant(v) => {
                let node = Node {
                    key,
                    value,
                    hash,
                    prev: None,
                    next: self.head,
                };
                let k = self.slots.insert(node);
                if let Some(old_head) = self.head {
                    self.slots[old_head].prev = Some(k);
                } else {
                    self.tail = Some(k);
                }
                self.head = Some(k);
                let _ = v.insert(k);
                Ok(Locator::new(k))
            }
        }
    }

    /// Insert a new entry immediately after the entry at `prev`.
    pub fn insert_after(&mut self, prev: Locator, key: K, value: V) -> Result<Locator, InsertError> {
        let _lock = self.reentry.lock();
        let prev_k = prev.raw();
        if !self.slots.contains_key(prev_k) {
            return Err(InsertError::InvalidLocator);
        }
        let hash = self.make_hash(&key);
        match self.index.entry(
            hash,
            |&kk| self.slots.get(kk).map(|n| n.key == key).unwrap_or(false),
            |&kk| self.slots.get(kk).map(|n| n.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(_) => Err(InsertError::DuplicateKey),
            hashbrown::hash_table::Entry::Vacant(v) => {
                let next = self.slots[prev_k].next;
                let node = Node {
                    key,
                    value,
                    hash,
                    prev: Some(prev_k),
                    next,
                };
                let k = self.slots.insert(node);
                self.slots[prev_k].next = Some(k);
                match next {
                    Some(n) => self.slots[n].prev = Some(k),
                    None => self.tail = Some(k),
                }
                let _ = v.insert(k);
                Ok(Locator::new(k))
            }
        }
    }

    /// Remove and return the first entry in sequence order.
    pub fn pop_front(&mut self) -> Option<(K, V)> {
        let head = self.head?;
        self.remove_at(head)
    }

    /// Remove and return the entry at `loc`. Returns `None` for a stale
    /// locator.
    pub fn remove(&mut self, loc: Locator) -> Option<(K, V)> {
        self.remove_at(loc.raw())
    }

    // Unlink + unindex a live slot. Runs no user code past the probe.
    fn remove_at(&mut self, k: DefaultKey) -> Option<(K, V)> {
        let _lock = self.reentry.lock();
        let node = self.slots.remove(k)?;
        match node.prev {
            Some(p) => self.slots[p].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(n) => self.slots[n].prev = node.prev,
            None => self.tail = node.prev,
        }
        self.index
            .find_entry(node.hash, |&kk| kk == k)
            .expect("indexed entry must exist for a live slot")
            .remove();
        Some((node.key, node.value))
    }

    pub fn key(&self, loc: Locator) -> Option<&K> {
        self.slots.get(loc.raw()).map(|n| &n.key)
    }

    pub fn value(&self, loc: Locator) -> Option<&V> {
        self.slots.get(loc.raw()).map(|n| &n.value)
    }

    pub fn value_mut(&mut self, loc: Locator) -> Option<&mut V> {
        self.slots.get_mut(loc.raw()).map(|n| &mut n.value)
    }

    pub fn clear(&mut self) {
        let _lock = self.reentry.lock();
        self.slots.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: &self.slots,
            cursor: self.head,
        }
    }
}

impl<K, V, S> Clone for SeqMap<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        // Slot keys survive the clone, so locators taken against `self`
        // resolve to the corresponding entries in the copy. A panic in
        // `K::clone`/`V::clone` drops the partial copy; `self` is untouched.
        Self {
            hasher: self.hasher.clone(),
            index: self.index.clone(),
            slots: self.slots.clone(),
            head: self.head,
            tail: self.tail,
            reentry: ReentryCheck::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::Hasher;

    fn keys_in_order<K: Clone, V, S>(m: &SeqMap<K, V, S>) -> Vec<K>
    where
        K: Eq + Hash,
        S: BuildHasher + Clone + Default,
    {
        m.iter().map(|(_, k, _)| k.clone()).collect()
    }

    /// Invariant: push_front prepends; iteration follows sequence order,
    /// not slot order or key order.
    #[test]
    fn push_front_prepends() {
        let mut m: SeqMap<i32, &str> = SeqMap::new();
        m.push_front(1, "a").unwrap();
        m.push_front(2, "b").unwrap();
        m.push_front(3, "c").unwrap();
        assert_eq!(keys_in_order(&m), vec![3, 2, 1]);
        assert_eq!(m.len(), 3);
    }

    /// Invariant: insert_after places the entry directly behind its
    /// predecessor, anywhere in the sequence including the tail.
    #[test]
    fn insert_after_places_behind_predecessor() {
        let mut m: SeqMap<i32, &str> = SeqMap::new();
        let first = m.push_front(1, "a").unwrap();
        m.insert_after(first, 2, "b").unwrap();
        m.insert_after(first, 3, "c").unwrap();
        assert_eq!(keys_in_order(&m), vec![1, 3, 2]);

        // Appending after the current tail updates the tail link; a
        // subsequent tail insert must land at the very end.
        let tail = m.find(&2).unwrap();
        m.insert_after(tail, 4, "d").unwrap();
        assert_eq!(keys_in_order(&m), vec![1, 3, 2, 4]);
    }

    /// Invariant: duplicate keys are rejected by both insert paths and the
    /// map remains unchanged.
    #[test]
    fn duplicate_keys_rejected() {
        let mut m: SeqMap<String, i32> = SeqMap::new();
        let loc = m.push_front("dup".to_string(), 1).unwrap();
        assert_eq!(
            m.push_front("dup".to_string(), 2),
            Err(InsertError::DuplicateKey)
        );
        assert_eq!(
            m.insert_after(loc, "dup".to_string(), 3),
            Err(InsertError::DuplicateKey)
        );
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("dup"), Some(&1));
    }

    /// Invariant: insert_after with a stale locator fails without touching
    /// the sequence.
    #[test]
    fn insert_after_stale_locator_rejected() {
        let mut m: SeqMap<i32, &str> = SeqMap::new();
        let loc = m.push_front(1, "a").unwrap();
        m.remove(loc).unwrap();
        assert_eq!(
            m.insert_after(loc, 2, "b"),
            Err(InsertError::InvalidLocator)
        );
        assert!(m.is_empty());
    }

    /// Invariant: locators stay valid across unrelated edits; removal by
    /// locator relinks neighbors.
    #[test]
    fn locator_stability_across_unrelated_edits() {
        let mut m: SeqMap<i32, &str> = SeqMap::new();
        let l1 = m.push_front(1, "a").unwrap();
        let l2 = m.insert_after(l1, 2, "b").unwrap();
        let l3 = m.insert_after(l2, 3, "c").unwrap();

        m.remove(l2).unwrap();
        assert_eq!(keys_in_order(&m), vec![1, 3]);
        // Untouched locators still resolve.
        assert_eq!(m.value(l1), Some(&"a"));
        assert_eq!(m.value(l3), Some(&"c"));
        // The removed one does not, even after the slot is reused.
        assert_eq!(m.value(l2), None);
        m.insert_after(l1, 4, "d").unwrap();
        assert_eq!(m.value(l2), None);
        assert_eq!(keys_in_order(&m), vec![1, 4, 3]);
    }

    /// Invariant: pop_front removes exactly the sequence head and returns
    /// its entry; head/tail links stay consistent down to empty.
    #[test]
    fn pop_front_follows_sequence_order() {
        let mut m: SeqMap<i32, &str> = SeqMap::new();
        m.push_front(1, "a").unwrap();
        m.push_front(2, "b").unwrap();
        assert_eq!(m.pop_front(), Some((2, "b")));
        assert_eq!(m.pop_front(), Some((1, "a")));
        assert_eq!(m.pop_front(), None);
        assert!(m.front().is_none());
    }

    /// Invariant: find/contains/get agree, and borrowed lookup works
    /// (store `String`, query with `&str`).
    #[test]
    fn borrowed_lookup_and_parity() {
        let mut m: SeqMap<String, i32> = SeqMap::new();
        m.push_front("hello".to_string(), 7).unwrap();
        assert!(m.find("hello").is_some());
        assert!(m.contains_key("hello"));
        assert_eq!(m.get("hello"), Some(&7));
        assert!(m.find("world").is_none());
        assert!(!m.contains_key("world"));
        assert_eq!(m.get("world"), None);
    }

    /// Invariant: value_mut mutates in place; key set and order unchanged.
    #[test]
    fn value_mut_edits_in_place() {
        let mut m: SeqMap<i32, i32> = SeqMap::new();
        let loc = m.push_front(1, 10).unwrap();
        *m.value_mut(loc).unwrap() += 5;
        assert_eq!(m.get(&1), Some(&15));
        assert_eq!(keys_in_order(&m), vec![1]);
    }

    /// Invariant: clear empties sequence and index; the map is reusable
    /// afterwards.
    #[test]
    fn clear_then_reuse() {
        let mut m: SeqMap<i32, &str> = SeqMap::new();
        m.push_front(1, "a").unwrap();
        m.push_front(2, "b").unwrap();
        m.clear();
        assert!(m.is_empty());
        assert!(!m.contains_key(&1));
        m.push_front(1, "again").unwrap();
        assert_eq!(m.get(&1), Some(&"again"));
    }

    /// Invariant: a clone preserves order and values, resolves the
    /// original's locators, and is fully independent afterwards.
    #[test]
    fn clone_preserves_order_and_locators() {
        let mut m: SeqMap<i32, String> = SeqMap::new();
        let l1 = m.push_front(1, "a".to_string()).unwrap();
        let l2 = m.insert_after(l1, 2, "b".to_string()).unwrap();

        let mut c = m.clone();
        assert_eq!(keys_in_order(&c), keys_in_order(&m));
        assert_eq!(c.value(l1), Some(&"a".to_string()));
        assert_eq!(c.value(l2), Some(&"b".to_string()));

        c.remove(l1).unwrap();
        *c.value_mut(l2).unwrap() = "changed".to_string();
        assert_eq!(m.get(&1), Some(&"a".to_string()));
        assert_eq!(m.get(&2), Some(&"b".to_string()));
        assert_eq!(keys_in_order(&m), vec![1, 2]);
    }

    /// Invariant: lookups resolve correctly when every key lands in the
    /// same bucket (probing falls back to `Eq`).
    #[test]
    fn collision_handling_with_const_hasher() {
        #[derive(Clone, Default)]
        struct ConstBuildHasher;
        struct ConstHasher;
        impl BuildHasher for ConstBuildHasher {
            type Hasher = ConstHasher;
            fn build_hasher(&self) -> Self::Hasher {
                ConstHasher
            }
        }
        impl Hasher for ConstHasher {
            fn write(&mut self, _bytes: &[u8]) {}
            fn finish(&self) -> u64 {
                0
            }
        }

        let mut m: SeqMap<String, i32, ConstBuildHasher> =
            SeqMap::with_hasher(ConstBuildHasher);
        m.push_front("a".to_string(), 1).unwrap();
        m.push_front("b".to_string(), 2).unwrap();

        let la = m.find(&"a".to_string()).expect("find a");
        let lb = m.find(&"b".to_string()).expect("find b");
        assert_ne!(la, lb);
        assert_eq!(m.key(la), Some(&"a".to_string()));
        assert_eq!(m.key(lb), Some(&"b".to_string()));
        assert_eq!(
            m.push_front("a".to_string(), 9),
            Err(InsertError::DuplicateKey)
        );
    }
}
