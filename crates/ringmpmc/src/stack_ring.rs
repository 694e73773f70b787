//! Inline-storage ring with compile-time capacity.
//!
//! [`StackRing<T, N>`] runs the same slot protocol as [`Ring`](crate::Ring)
//! but embeds the slot array directly in the struct: no heap allocation, no
//! pointer indirection, and the mask is a compile-time constant the
//! optimizer folds into the indexing.
//!
//! Each slot is 16 bytes, so a `StackRing<u64, 4096>` is ~64 KiB plus two
//! aligned counters. Large capacities belong on the heap (`Box<StackRing>`
//! or plain [`Ring`](crate::Ring)) rather than a thread stack.

use crate::ring::{CacheAligned, RawRing};
use crate::slot::{Element, Slot};
use std::sync::atomic::AtomicU64;

/// Bounded lock-free MPMC ring queue with inline storage and a
/// compile-time capacity.
///
/// `N` must be a nonzero power of two; violations fail at compile time.
pub struct StackRing<T: Element, const N: usize> {
    write_seq: CacheAligned<AtomicU64>,
    read_seq: CacheAligned<AtomicU64>,
    lazy_push: bool,
    lazy_pop: bool,
    slots: [Slot<T>; N],
}

impl<T: Element, const N: usize> StackRing<T, N> {
    const CAPACITY_IS_POWER_OF_TWO: () =
        assert!(N > 0 && N.is_power_of_two(), "capacity must be a nonzero power of two");

    /// Creates an eager ring.
    pub fn new() -> Self {
        Self::with_modes(false, false)
    }

    /// Creates a ring with the given lazy-commit modes.
    pub fn with_modes(lazy_push: bool, lazy_pop: bool) -> Self {
        // forces the compile-time capacity check to be evaluated
        let _ = Self::CAPACITY_IS_POWER_OF_TWO;
        Self {
            write_seq: CacheAligned::new(AtomicU64::new(0)),
            read_seq: CacheAligned::new(AtomicU64::new(0)),
            lazy_push,
            lazy_pop,
            slots: std::array::from_fn(|p| Slot::empty_at(p as u64)),
        }
    }

    #[inline]
    fn raw(&self) -> RawRing<'_, T> {
        RawRing::new(
            &self.slots,
            &self.write_seq,
            &self.read_seq,
            self.lazy_push,
            self.lazy_pop,
        )
    }

    /// Attempts to enqueue `value`. Returns `false` on a full ring.
    #[inline]
    pub fn try_push(&self, value: T) -> bool {
        self.raw().try_push_indexed(value).is_some()
    }

    #[inline]
    pub fn try_push_indexed(&self, value: T) -> Option<u64> {
        self.raw().try_push_indexed(value)
    }

    /// Attempts to dequeue the oldest value. Returns `None` on empty.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        self.raw().try_pop_indexed().map(|(value, _)| value)
    }

    #[inline]
    pub fn try_pop_indexed(&self) -> Option<(T, u64)> {
        self.raw().try_pop_indexed()
    }

    #[inline]
    pub fn peek(&self) -> Option<T> {
        self.raw().peek()
    }

    /// Always-succeeding push; displaces the oldest unread entry when full.
    #[inline]
    pub fn push_keep_n(&self, value: T) -> u64 {
        self.raw().push_keep_n(value).0
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.raw().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw().is_empty()
    }
}

impl<T: Element, const N: usize> Default for StackRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
