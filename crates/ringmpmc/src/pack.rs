//! Striped set of independent rings with sticky per-handle affinity.
//!
//! A [`RingPack`] trades ordering for contention: each producer handle binds
//! permanently to one ring of the pack, so under uniform load the slot-CAS
//! hotspot shrinks to one ring per producing thread. Consumers are sticky
//! too but rotate every `rotate_after` successful pops and fall through to a
//! linear scan when their ring runs dry.
//!
//! FIFO holds per ring only. Across rings of a pack there is no ordering
//! guarantee at all.

use crate::slot::Element;
use crate::{PackConfig, QueueError, Ring, RingConfig};
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// An ordered set of `groups` independent [`Ring`]s plus two assignment
/// rotors that deal out sticky indices to new handles.
pub struct RingPack<T: Element> {
    rings: Vec<Ring<T>>,
    writers_assigned: CachePadded<AtomicU64>,
    readers_assigned: CachePadded<AtomicU64>,
    config: PackConfig,
}

impl<T: Element> RingPack<T> {
    /// Builds `pack.groups` rings, each from `ring` (capacity, lazy modes).
    pub fn new(pack: PackConfig, ring: RingConfig) -> Result<Self, QueueError> {
        pack.validate()?;
        let rings = (0..pack.groups)
            .map(|_| Ring::with_config(ring))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rings,
            writers_assigned: CachePadded::new(AtomicU64::new(0)),
            readers_assigned: CachePadded::new(AtomicU64::new(0)),
            config: pack,
        })
    }

    /// Number of rings in the pack.
    #[inline]
    pub fn groups(&self) -> usize {
        self.config.groups
    }

    /// Capacity of each member ring.
    #[inline]
    pub fn ring_capacity(&self) -> usize {
        self.rings[0].capacity()
    }

    /// Approximate total occupancy across all rings.
    pub fn len(&self) -> usize {
        self.rings.iter().map(Ring::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.iter().all(Ring::is_empty)
    }

    /// Creates a producer handle bound to the next ring in rotor order.
    ///
    /// The binding is permanent: the handle pushes to its ring only, with
    /// no fall-through, so one producing thread contends on one ring.
    pub fn producer(&self) -> PackProducer<'_, T> {
        let assigned = self.writers_assigned.fetch_add(1, Ordering::Relaxed);
        let index = (assigned % self.config.groups as u64) as usize;
        PackProducer {
            ring: &self.rings[index],
            index,
        }
    }

    /// Creates a consumer handle starting at the next ring in rotor order.
    pub fn consumer(&self) -> PackConsumer<'_, T> {
        let assigned = self.readers_assigned.fetch_add(1, Ordering::Relaxed);
        let index = (assigned % self.config.groups as u64) as usize;
        PackConsumer {
            pack: self,
            index,
            pop_count: 0,
        }
    }
}

impl<T: Element> std::fmt::Debug for RingPack<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingPack")
            .field("groups", &self.config.groups)
            .field("rotate_after", &self.config.rotate_after)
            .field("len", &self.len())
            .finish()
    }
}

/// Producer handle with permanent ring affinity.
pub struct PackProducer<'a, T: Element> {
    ring: &'a Ring<T>,
    index: usize,
}

impl<T: Element> PackProducer<'_, T> {
    /// Index of the ring this handle is bound to.
    #[inline]
    pub fn ring_index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn try_push(&self, value: T) -> bool {
        self.ring.try_push(value)
    }

    #[inline]
    pub fn try_push_indexed(&self, value: T) -> Option<u64> {
        self.ring.try_push_indexed(value)
    }
}

/// Consumer handle with sticky affinity, periodic rotation, and
/// scan-on-empty fall-through.
pub struct PackConsumer<'a, T: Element> {
    pack: &'a RingPack<T>,
    index: usize,
    pop_count: u32,
}

impl<T: Element> PackConsumer<'_, T> {
    /// Index of the ring this handle currently reads from.
    #[inline]
    pub fn ring_index(&self) -> usize {
        self.index
    }

    /// Pops from the sticky ring; on success every `rotate_after`-th pop
    /// moves the handle to the next ring. On a dry ring the remaining
    /// `groups - 1` rings are scanned in rotation order and the handle
    /// stays on the first one that yields.
    pub fn try_pop(&mut self) -> Option<T> {
        self.try_pop_indexed().map(|(value, _)| value)
    }

    pub fn try_pop_indexed(&mut self) -> Option<(T, u64)> {
        if let Some(popped) = self.pack.rings[self.index].try_pop_indexed() {
            self.pop_count += 1;
            if self.pop_count >= self.pack.config.rotate_after {
                self.pop_count = 0;
                self.index = (self.index + 1) % self.pack.config.groups;
            }
            return Some(popped);
        }
        self.pop_count = 0;
        for _ in 1..self.pack.config.groups {
            self.index = (self.index + 1) % self.pack.config.groups;
            if let Some(popped) = self.pack.rings[self.index].try_pop_indexed() {
                return Some(popped);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_pack(groups: usize, rotate_after: u32) -> RingPack<u64> {
        RingPack::new(PackConfig::new(groups, rotate_after), RingConfig::new(64)).unwrap()
    }

    #[test]
    fn handles_round_robin_over_rings() {
        let pack = small_pack(3, 10);
        assert_eq!(pack.producer().ring_index(), 0);
        assert_eq!(pack.producer().ring_index(), 1);
        assert_eq!(pack.producer().ring_index(), 2);
        assert_eq!(pack.producer().ring_index(), 0);

        assert_eq!(pack.consumer().ring_index(), 0);
        assert_eq!(pack.consumer().ring_index(), 1);
    }

    #[test]
    fn consumer_scans_other_rings_when_dry() {
        let pack = small_pack(3, 10);
        // producer 0 -> ring 0, producer 1 -> ring 1
        let p0 = pack.producer();
        let p1 = pack.producer();
        p1.try_push(42);
        drop(p0);

        // consumer starts on ring 0, which is empty; scan finds ring 1
        let mut c = pack.consumer();
        assert_eq!(c.try_pop(), Some(42));
        assert_eq!(c.ring_index(), 1);
        assert_eq!(c.try_pop(), None);
    }

    #[test]
    fn consumer_rotates_after_k_pops() {
        let pack = small_pack(2, 3);
        let p0 = pack.producer();
        for i in 0..6 {
            p0.try_push(i);
        }

        let mut c = pack.consumer();
        assert_eq!(c.ring_index(), 0);
        assert_eq!(c.try_pop(), Some(0));
        assert_eq!(c.try_pop(), Some(1));
        assert_eq!(c.try_pop(), Some(2));
        // third success rotated the handle to ring 1
        assert_eq!(c.ring_index(), 1);
        // ring 1 is dry; scan returns to ring 0
        assert_eq!(c.try_pop(), Some(3));
        assert_eq!(c.ring_index(), 0);
    }

    #[test]
    fn pack_len_sums_rings() {
        let pack = small_pack(2, 8);
        let p0 = pack.producer();
        let p1 = pack.producer();
        assert!(pack.is_empty());
        p0.try_push(1);
        p1.try_push(2);
        p1.try_push(3);
        assert_eq!(pack.len(), 3);
        assert!(!pack.is_empty());
    }

    #[test]
    fn producer_has_no_fall_through() {
        let pack = RingPack::new(PackConfig::new(2, 8), RingConfig::new(1)).unwrap();
        let p0 = pack.producer();
        assert!(p0.try_push(1));
        // ring 0 is full; the bound producer refuses even though ring 1 is empty
        assert!(!p0.try_push(2));
    }
}
