use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters, collected when `RingConfig::enable_metrics` is set.
///
/// Counters use relaxed atomics; they are monitoring data, not
/// synchronization.
#[derive(Debug, Default)]
pub struct Metrics {
    pushes: AtomicU64,
    pops: AtomicU64,
    overwrites: AtomicU64,
    full_misses: AtomicU64,
    empty_misses: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_push(&self) {
        self.pushes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_pop(&self) {
        self.pops.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_overwrite(&self) {
        self.overwrites.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_full_miss(&self) {
        self.full_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_empty_miss(&self) {
        self.empty_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pushes: self.pushes.load(Ordering::Relaxed),
            pops: self.pops.load(Ordering::Relaxed),
            overwrites: self.overwrites.load(Ordering::Relaxed),
            full_misses: self.full_misses.load(Ordering::Relaxed),
            empty_misses: self.empty_misses.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a [`Metrics`] block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Successful pushes, including keep-n pushes.
    pub pushes: u64,
    /// Successful pops.
    pub pops: u64,
    /// Keep-n pushes that displaced an unread entry.
    pub overwrites: u64,
    /// `try_push` calls that observed a conclusively full ring.
    pub full_misses: u64,
    /// `try_pop` calls that observed a conclusively empty ring.
    pub empty_misses: u64,
}
