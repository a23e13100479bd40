//! cow-binder: an insertion-ordered, key-indexed map whose copies share
//! storage until one of them writes.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: make copying the container O(1) and mutation safe against both
//!   sharers and panics, in small layers that can be reasoned about
//!   independently.
//! - Layers:
//!   - SeqMap<K, V, S>: structural layer. An insertion-ordered sequence
//!     held in a slot arena (stable, generational locators) threaded as a
//!     doubly-linked list, plus a hash index from key to slot. Supports
//!     front insertion, insertion after a locator, and removal by front or
//!     locator, all O(1) average.
//!   - Binder<K, V, S>: public copy-on-write facade. Holds an
//!     `Rc<SeqMap>`; `Clone` shares the payload, and every structural
//!     mutation goes through a clone-if-shared step before editing.
//!
//! Constraints
//! - Single-threaded: `Rc`-based sharing, `!Send`/`!Sync`.
//! - Unique keys; duplicate inserts fail without side effects.
//! - Iteration order is sequence order (front/after-key insertion order),
//!   never key order.
//! - Strong panic safety: a mutation that fails (precondition error, or a
//!   panic out of user `Hash`/`Eq`/`Clone` code) leaves the binder
//!   logically unchanged and its sharing relationships intact.
//!
//! Why this split?
//! - The structural layer owns the sequence/index invariants and never
//!   decides about sharing; the facade owns the sharing protocol and never
//!   touches links or buckets.
//! - Panic safety falls out of ordering rather than rollback code: user
//!   code runs while probing (before any edit) or while deep-copying into
//!   a detached payload (dropped on unwind); the edit phase that follows
//!   runs no user code.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its precomputed `u64` hash and indexing always uses
//!   the stored hash; `K: Hash` is never invoked after insertion.
//!
//! Reentrancy policy
//! - The structural layer guards its entry points with a debug-only
//!   reentry check; only `K: Eq`/`K: Hash` may run while the lock is held.
//!
//! Notes and non-goals
//! - No thread-safe variant (an `Arc`-based one would need the same shape
//!   with atomic counts).
//! - Values are never compared or ordered; only keys are, for uniqueness
//!   and lookup. Binder equality compares values in sequence order.
//! - Keys are immutable post-insert; values are mutable via `read_mut`,
//!   which counts as a structural mutation for sharing purposes.

mod binder;
mod reentry;
pub mod seq_map;
mod seq_map_proptest;

// Public surface
pub use binder::{Binder, BinderError, Entries, Iter};
pub use seq_map::InsertError;
