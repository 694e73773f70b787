//! ringmpmc - Bounded Lock-Free Multi-Producer Multi-Consumer Ring Queue
//!
//! A fixed-capacity MPMC queue built on one primitive: a 16-byte slot
//! holding `{index, value}` that is read and compare-exchanged as a single
//! double-word. The index encodes both the slot state (parity) and the lap
//! (magnitude), which makes every exchange unique over the queue's lifetime
//! and removes the ABA problem without tag words.
//!
//! # Key Features
//!
//! - Non-blocking `try_push` / `try_pop` with per-ring FIFO
//! - `push_keep_n`: always-succeeding overwrite push for keep-last-N streams
//! - Lazy commit modes that relax the sequence-counter advance under contention
//! - [`StackRing`]: inline storage with compile-time capacity
//! - [`RingPack`]: striped rings with sticky handles for contention relief
//! - [`SharedRing`]: the same ring in a memory-mapped file, attachable
//!   across processes
//!
//! # Example
//!
//! ```
//! use ringmpmc::Ring;
//!
//! let ring = Ring::<u64>::new(8).unwrap();
//!
//! assert!(ring.try_push(42));
//! assert_eq!(ring.peek(), Some(42));
//! assert_eq!(ring.try_pop(), Some(42));
//! assert_eq!(ring.try_pop(), None);
//!
//! // telemetry-style stream: the newest values win
//! for v in 0..100 {
//!     ring.push_keep_n(v);
//! }
//! assert_eq!(ring.try_pop(), Some(92));
//! ```

mod backoff;
mod config;
mod error;
mod invariants;
mod metrics;
mod pack;
mod ring;
mod shared;
mod slot;
mod stack_ring;

pub use backoff::Backoff;
pub use config::{PackConfig, RingConfig};
pub use error::QueueError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use pack::{PackConsumer, PackProducer, RingPack};
pub use ring::Ring;
pub use shared::{SharedConsumer, SharedProducer, SharedRing, RING_START, SHARED_SIGNATURE};
pub use slot::Element;
pub use stack_ring::StackRing;
