use thiserror::Error;

/// Construction-time failures.
///
/// Steady-state operations never error: a full queue is a `false`/`None`
/// return from the `try_*` calls and contention is retried internally.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Ring capacity was zero or not a power of two.
    #[error("capacity must be a nonzero power of two, got {0}")]
    InvalidCapacity(usize),

    /// Pack policy constants were out of range.
    #[error("invalid pack configuration: {0}")]
    InvalidPack(&'static str),

    /// A shared ring file exists but its header does not match this
    /// queue's layout.
    #[error("shared ring file is not compatible: {0}")]
    Incompatible(&'static str),

    /// Opening, sizing, or mapping the shared ring file failed.
    #[error("shared ring I/O: {0}")]
    Io(#[from] std::io::Error),
}
