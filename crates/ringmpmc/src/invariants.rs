//! Debug assertion macros for queue invariants.
//!
//! Active in debug builds only; release builds pay nothing. Shared by the
//! heap ring, the stack ring, and the shared-memory ring.

/// A sequence counter never moves backwards.
macro_rules! debug_assert_seq_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "{} sequence decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

/// The observable occupancy never exceeds capacity.
macro_rules! debug_assert_len_bounded {
    ($len:expr, $capacity:expr) => {
        debug_assert!(
            $len <= $capacity,
            "len {} exceeds capacity {}",
            $len,
            $capacity
        )
    };
}

/// A slot's index always belongs to its array position: `index / 2` is
/// congruent to the position modulo capacity.
macro_rules! debug_assert_slot_in_position {
    ($index:expr, $position:expr, $capacity:expr) => {
        debug_assert!(
            ($index / 2) % ($capacity as u64) == $position % ($capacity as u64),
            "slot index {} does not belong to position {} (capacity {})",
            $index,
            $position,
            $capacity
        )
    };
}

pub(crate) use debug_assert_len_bounded;
pub(crate) use debug_assert_seq_monotonic;
pub(crate) use debug_assert_slot_in_position;
