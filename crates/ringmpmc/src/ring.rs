use crate::invariants::{
    debug_assert_len_bounded, debug_assert_seq_monotonic, debug_assert_slot_in_position,
};
use crate::slot::{Element, Slot, SlotState};
use crate::{Backoff, Metrics, MetricsSnapshot, QueueError, RingConfig};
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// PROGRESSION PROTOCOL
// =============================================================================
//
// Every slot carries a sequence index whose parity is the slot state. For a
// ring of capacity N, the slot at array position p cycles through:
//
//   empty lap 0:  2p          full lap 0:  2p + 1
//   empty lap 1:  2(p + N)    full lap 1:  2(p + N) + 1
//   ...
//
// A producer that loaded write_seq = ws owns sequence ws if it wins the
// double-word exchange  (2ws, _) -> (2ws + 1, value)  on the slot at
// position ws & mask. A consumer that loaded read_seq = rs owns sequence rs
// if it wins  (2rs + 1, v) -> (2(rs + N), 0).  The slot index grows by 2N
// per lap, so no exchange expectation can ever recur: the index doubles as
// the ABA generation counter.
//
// The sequence counters trail the slots, never lead them. A thread that
// observes a slot index ahead of the counter it loaded pushes the counter
// forward one step and retries; that keeps the protocol live even when the
// lazy modes skip a counter update. A slot index a full lap behind the
// write counter is a conclusive "full"; a slot index at or below twice the
// read counter is a conclusive "empty". Both terminate the call.
//
// Slot exchanges publish with release and load with acquire, so a consumer
// that sees a full slot also sees everything its producer wrote first, and
// a producer reusing an emptied slot sees the consumer's release.
//
// =============================================================================

/// Wrapper forcing 128-byte alignment so each sequence counter owns its
/// cache-line pair; adjacent-line prefetchers on x86 otherwise induce false
/// sharing between the producer and consumer hot words.
#[repr(C)]
#[repr(align(128))]
pub(crate) struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// Borrowed view of a ring's storage: the protocol itself.
///
/// The heap [`Ring`], the inline [`StackRing`](crate::StackRing), and the
/// memory-mapped [`SharedRing`](crate::SharedRing) all drive their
/// operations through this view, so the slot protocol exists exactly once.
pub(crate) struct RawRing<'a, T: Element> {
    slots: &'a [Slot<T>],
    write_seq: &'a AtomicU64,
    read_seq: &'a AtomicU64,
    lazy_push: bool,
    lazy_pop: bool,
}

impl<'a, T: Element> RawRing<'a, T> {
    pub(crate) fn new(
        slots: &'a [Slot<T>],
        write_seq: &'a AtomicU64,
        read_seq: &'a AtomicU64,
        lazy_push: bool,
        lazy_pop: bool,
    ) -> Self {
        debug_assert!(slots.len().is_power_of_two());
        Self {
            slots,
            write_seq,
            read_seq,
            lazy_push,
            lazy_pop,
        }
    }

    #[inline]
    fn mask(&self) -> u64 {
        self.slots.len() as u64 - 1
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Moves a sequence counter from `from` to `from + 1`.
    ///
    /// Eager mode insists the counter is past `from` before returning; lazy
    /// mode makes one weak attempt and leaves a collision for later helpers.
    fn advance(&self, seq: &AtomicU64, from: u64, lazy: bool) {
        if lazy {
            let _ = seq.compare_exchange_weak(from, from + 1, Ordering::Release, Ordering::Relaxed);
            return;
        }
        let mut expected = from;
        while let Err(seen) =
            seq.compare_exchange_weak(expected, from + 1, Ordering::Release, Ordering::Relaxed)
        {
            debug_assert_seq_monotonic!("advanced", from, seen);
            if seen > from {
                break;
            }
            expected = seen;
        }
    }

    /// One helping step for a counter proven stale by a slot index.
    #[inline]
    fn help_advance(&self, seq: &AtomicU64, observed: u64) {
        let _ = seq.compare_exchange(observed, observed + 1, Ordering::Release, Ordering::Relaxed);
    }

    pub(crate) fn try_push_indexed(&self, value: T) -> Option<u64> {
        let bits = value.to_bits();
        let mut ws = self.write_seq.load(Ordering::Acquire);
        loop {
            let position = ws & self.mask();
            let slot = &self.slots[position as usize];
            let seen = slot.load(Ordering::Acquire);
            debug_assert_slot_in_position!(seen.index(), position, self.capacity());

            if seen.index() == 2 * ws {
                if slot.compare_exchange(seen, SlotState::new(2 * ws + 1, bits)) {
                    self.advance(self.write_seq, ws, self.lazy_push);
                    return Some(ws);
                }
                // lost the slot to another producer; refresh and retry
            } else if seen.index() < 2 * ws {
                // the slot still holds the entry from one lap behind
                return None;
            } else {
                // slot ahead of the counter: help it forward
                self.help_advance(self.write_seq, ws);
            }
            ws = self.write_seq.load(Ordering::Acquire);
        }
    }

    pub(crate) fn try_pop_indexed(&self) -> Option<(T, u64)> {
        let capacity = self.capacity() as u64;
        let mut rs = self.read_seq.load(Ordering::Acquire);
        loop {
            let position = rs & self.mask();
            let slot = &self.slots[position as usize];
            let seen = slot.load(Ordering::Acquire);
            debug_assert_slot_in_position!(seen.index(), position, self.capacity());

            if seen.index() == 2 * rs + 1 {
                // empty at the next lap; the value travels in the snapshot
                if slot.compare_exchange(seen, SlotState::new(2 * (rs + capacity), 0)) {
                    self.advance(self.read_seq, rs, self.lazy_pop);
                    return Some((T::from_bits(seen.value_bits()), rs));
                }
            } else if seen.index() <= 2 * rs {
                // nothing committed at this sequence yet
                return None;
            } else {
                self.help_advance(self.read_seq, rs);
            }
            rs = self.read_seq.load(Ordering::Acquire);
        }
    }

    /// Copies the head value without mutating anything.
    ///
    /// The returned value *was* at the head; a concurrent pop may already
    /// have claimed it by the time the caller looks.
    pub(crate) fn peek(&self) -> Option<T> {
        let rs = self.read_seq.load(Ordering::Acquire);
        let seen = self.slots[(rs & self.mask()) as usize].load(Ordering::Acquire);
        if seen.index() == 2 * rs + 1 {
            Some(T::from_bits(seen.value_bits()))
        } else {
            None
        }
    }

    /// Always-succeeding push: on a full ring the oldest unread entry is
    /// consumed and replaced in a single exchange. Returns the committed
    /// sequence and whether an entry was displaced.
    pub(crate) fn push_keep_n(&self, value: T) -> (u64, bool) {
        let bits = value.to_bits();
        let capacity = self.capacity() as u64;
        let mut ws = self.write_seq.load(Ordering::Acquire);
        loop {
            let position = ws & self.mask();
            let slot = &self.slots[position as usize];
            let seen = slot.load(Ordering::Acquire);
            let index = seen.index();

            if index == 2 * ws {
                if slot.compare_exchange(seen, SlotState::new(2 * ws + 1, bits)) {
                    self.advance(self.write_seq, ws, self.lazy_push);
                    return (ws, false);
                }
            } else if index + 2 * capacity == 2 * ws + 1 {
                // full exactly one lap behind: overwrite the stale head,
                // advancing the slot a whole lap while staying full
                if slot.compare_exchange(seen, SlotState::new(2 * ws + 1, bits)) {
                    self.advance(self.write_seq, ws, self.lazy_push);
                    return (ws, true);
                }
            } else if index > 2 * ws {
                self.help_advance(self.write_seq, ws);
            }
            ws = self.write_seq.load(Ordering::Acquire);
        }
    }

    pub(crate) fn len(&self) -> usize {
        let ws = self.write_seq.load(Ordering::Acquire);
        let rs = self.read_seq.load(Ordering::Acquire);
        // keep-n bursts can run write_seq ahead of a lagging read_seq by
        // more than a lap; clamp so occupancy stays within the bound
        let len = (ws.saturating_sub(rs) as usize).min(self.capacity());
        debug_assert_len_bounded!(len, self.capacity());
        len
    }

    pub(crate) fn is_empty(&self) -> bool {
        let rs = self.read_seq.load(Ordering::Acquire);
        let seen = self.slots[(rs & self.mask()) as usize].load(Ordering::Acquire);
        seen.index() <= 2 * rs
    }
}

/// Bounded lock-free MPMC ring queue with heap-allocated, run-time-sized
/// storage.
///
/// Any number of threads may push and pop concurrently through `&Ring<T>`.
/// Per ring, pops observe values in the order their pushes won the slot
/// exchange; `try_push` / `try_pop` never block and never spin against a
/// stable full/empty state.
pub struct Ring<T: Element> {
    // === HOT: producer / consumer cursors, each on its own line pair ===
    write_seq: CacheAligned<AtomicU64>,
    read_seq: CacheAligned<AtomicU64>,

    // === COLD ===
    config: RingConfig,
    metrics: Metrics,

    /// Slot storage. `Box<[_]>` rather than `Vec<_>`: the length is fixed
    /// at construction and the spare capacity word would be dead weight.
    slots: Box<[Slot<T>]>,
}

impl<T: Element> Ring<T> {
    /// Creates an eager ring with the given capacity.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        Self::with_config(RingConfig::new(capacity))
    }

    pub fn with_config(config: RingConfig) -> Result<Self, QueueError> {
        config.validate()?;
        let slots = (0..config.capacity as u64)
            .map(Slot::empty_at)
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Self {
            write_seq: CacheAligned::new(AtomicU64::new(0)),
            read_seq: CacheAligned::new(AtomicU64::new(0)),
            config,
            metrics: Metrics::new(),
            slots,
        })
    }

    #[inline]
    fn raw(&self) -> RawRing<'_, T> {
        RawRing::new(
            &self.slots,
            &self.write_seq,
            &self.read_seq,
            self.config.lazy_push,
            self.config.lazy_pop,
        )
    }

    /// Attempts to enqueue `value`. Returns `false` on a full ring.
    #[inline]
    pub fn try_push(&self, value: T) -> bool {
        self.try_push_indexed(value).is_some()
    }

    /// Like [`try_push`](Self::try_push), additionally returning the
    /// sequence number the value was committed at.
    pub fn try_push_indexed(&self, value: T) -> Option<u64> {
        let committed = self.raw().try_push_indexed(value);
        if self.config.enable_metrics {
            match committed {
                Some(_) => self.metrics.record_push(),
                None => self.metrics.record_full_miss(),
            }
        }
        committed
    }

    /// Attempts to dequeue the oldest value. Returns `None` on empty.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        self.try_pop_indexed().map(|(value, _)| value)
    }

    /// Like [`try_pop`](Self::try_pop), additionally returning the sequence
    /// number the value was pushed at.
    pub fn try_pop_indexed(&self) -> Option<(T, u64)> {
        let popped = self.raw().try_pop_indexed();
        if self.config.enable_metrics {
            match popped {
                Some(_) => self.metrics.record_pop(),
                None => self.metrics.record_empty_miss(),
            }
        }
        popped
    }

    /// Copies the value at the head without consuming it.
    ///
    /// Not linearizable against concurrent pops: the value *was* the head
    /// when read, nothing more.
    #[inline]
    pub fn peek(&self) -> Option<T> {
        self.raw().peek()
    }

    /// Enqueues `value`, displacing the oldest unread entry if the ring is
    /// full. Always succeeds; returns the committed sequence number.
    ///
    /// The last `capacity()` values pushed are always the ones observable,
    /// which makes this the producer side of a keep-last-N stream.
    pub fn push_keep_n(&self, value: T) -> u64 {
        let (sequence, displaced) = self.raw().push_keep_n(value);
        if self.config.enable_metrics {
            self.metrics.record_push();
            if displaced {
                self.metrics.record_overwrite();
            }
        }
        sequence
    }

    /// [`try_push`](Self::try_push) with bounded spin/yield retries on a
    /// full ring. Still gives up (returns `false`) once backoff completes.
    pub fn try_push_with_backoff(&self, value: T) -> bool {
        let mut backoff = Backoff::new();
        loop {
            if self.try_push(value) {
                return true;
            }
            if backoff.is_completed() {
                return false;
            }
            backoff.snooze();
        }
    }

    /// [`try_pop`](Self::try_pop) with bounded spin/yield retries on an
    /// empty ring.
    pub fn try_pop_with_backoff(&self) -> Option<T> {
        let mut backoff = Backoff::new();
        loop {
            if let Some(value) = self.try_pop() {
                return Some(value);
            }
            if backoff.is_completed() {
                return None;
            }
            backoff.snooze();
        }
    }

    /// Number of slots; constant for the ring's lifetime.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Approximate occupancy, clamped to `0..=capacity()`. Exact when the
    /// ring is quiescent and both lazy modes are off.
    #[inline]
    pub fn len(&self) -> usize {
        self.raw().len()
    }

    /// True when no committed entry is observable at the read cursor.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw().is_empty()
    }

    #[inline]
    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    /// Snapshot of the operation counters; zeros unless
    /// `RingConfig::enable_metrics` was set.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl<T: Element> std::fmt::Debug for Ring<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ring")
            .field("capacity", &self.config.capacity)
            .field("len", &self.len())
            .field("lazy_push", &self.config.lazy_push)
            .field("lazy_pop", &self.config.lazy_pop)
            .finish()
    }
}
