use crate::QueueError;

/// Configuration for a single ring.
///
/// Capacity must be a nonzero power of two; constructors validate it and
/// return [`QueueError::InvalidCapacity`] otherwise.
#[derive(Debug, Clone, Copy)]
pub struct RingConfig {
    /// Number of slots. Power of two, fixed for the ring's lifetime.
    pub capacity: usize,
    /// Skip the write-sequence advance when it would collide; consumers key
    /// on slot indices, so only `len()` accuracy is affected.
    pub lazy_push: bool,
    /// Symmetric relaxation of the read-sequence advance.
    pub lazy_pop: bool,
    /// Count operations in a [`Metrics`](crate::Metrics) block (slight overhead).
    pub enable_metrics: bool,
}

impl RingConfig {
    /// Eager configuration with the given capacity.
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lazy_push: false,
            lazy_pop: false,
            enable_metrics: false,
        }
    }

    pub const fn lazy_push(mut self, lazy: bool) -> Self {
        self.lazy_push = lazy;
        self
    }

    pub const fn lazy_pop(mut self, lazy: bool) -> Self {
        self.lazy_pop = lazy;
        self
    }

    pub const fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), QueueError> {
        if self.capacity == 0 || !self.capacity.is_power_of_two() {
            return Err(QueueError::InvalidCapacity(self.capacity));
        }
        Ok(())
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}

/// Policy constants for a [`RingPack`](crate::RingPack).
///
/// Both values are design-time tunables, frozen at construction.
#[derive(Debug, Clone, Copy)]
pub struct PackConfig {
    /// Number of independent rings in the pack.
    pub groups: usize,
    /// A consumer rotates to the next ring after this many successful pops.
    pub rotate_after: u32,
}

impl PackConfig {
    pub const fn new(groups: usize, rotate_after: u32) -> Self {
        Self {
            groups,
            rotate_after,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), QueueError> {
        if self.groups == 0 {
            return Err(QueueError::InvalidPack("pack needs at least one ring"));
        }
        if self.rotate_after == 0 {
            return Err(QueueError::InvalidPack("rotation period must be nonzero"));
        }
        Ok(())
    }
}

impl Default for PackConfig {
    fn default() -> Self {
        Self::new(4, 64)
    }
}
