//! Inter-process ring in a memory-mapped file.
//!
//! The ring image is placed after a fixed header page so unrelated
//! processes can attach as producers or consumers. The slot and counter
//! atomics operate on the mapped region unchanged, so two processes
//! sharing the file behave exactly like two threads sharing memory,
//! provided both agree on the element type and capacity.
//!
//! # File layout
//!
//! ```text
//! 0x0000  signature        u32  = 0x0BadBadB
//!         header_size      u32  = size_of::<SharedHeader>()
//!         ring_start       u64  = 4096
//!         elements         u64  = capacity
//!         ring_bytes       u64  = 256 + 16 * capacity
//!         producer_count   atomic i32
//!         consumer_count   atomic i32
//!         producer_pids    [u32; 16]   reserved, zero
//!         consumer_pids    [u32; 16]   reserved, zero
//! 0x1000  write_seq        (128-byte aligned block)
//! 0x1080  read_seq         (128-byte aligned block)
//! 0x1100  slots            capacity × 16 bytes
//! ```
//!
//! All header integers are little-endian with fixed widths. A header that
//! disagrees on any field aborts attachment with
//! [`QueueError::Incompatible`]. Attachment performs no repair: there is no
//! durability or crash recovery, only layout discovery.

use crate::ring::{CacheAligned, RawRing};
use crate::slot::{Element, Slot};
use crate::{QueueError, RingConfig};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::mem::size_of;
use std::path::Path;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

// The live mapping is accessed through native-endian atomics while the
// header contract is little-endian; big-endian hosts would silently write
// an incompatible file.
#[cfg(target_endian = "big")]
compile_error!("the shared ring layout is little-endian only");

/// Signature stamped into every shared ring file.
pub const SHARED_SIGNATURE: u32 = 0x0Bad_BadB;

/// Byte offset of the ring image within the file.
pub const RING_START: u64 = 4096;

/// Bytes occupied by the two sequence counter blocks ahead of the slots.
const SEQ_AREA: usize = 2 * size_of::<CacheAligned<AtomicU64>>();

/// Header page contents at offset zero of the mapping.
#[repr(C)]
pub struct SharedHeader {
    signature: u32,
    header_size: u32,
    ring_start: u64,
    elements: u64,
    ring_bytes: u64,
    producer_count: AtomicI32,
    consumer_count: AtomicI32,
    /// Reserved for attacher PIDs; zero-initialized, never populated.
    producer_pids: [u32; 16],
    consumer_pids: [u32; 16],
}

const _: () = assert!(size_of::<SharedHeader>() <= RING_START as usize);

/// Header fields decoded from the on-disk prefix during attachment.
struct HeaderProbe {
    signature: u32,
    header_size: u32,
    ring_start: u64,
    elements: u64,
    ring_bytes: u64,
}

impl HeaderProbe {
    fn decode(buf: &[u8]) -> Self {
        let u32_at = |o: usize| u32::from_le_bytes(buf[o..o + 4].try_into().unwrap());
        let u64_at = |o: usize| u64::from_le_bytes(buf[o..o + 8].try_into().unwrap());
        Self {
            signature: u32_at(0),
            header_size: u32_at(4),
            ring_start: u64_at(8),
            elements: u64_at(16),
            ring_bytes: u64_at(24),
        }
    }

    fn validate(&self, capacity: usize, ring_bytes: usize) -> Result<(), QueueError> {
        if self.signature != SHARED_SIGNATURE {
            return Err(QueueError::Incompatible("signature mismatch"));
        }
        if self.header_size as usize != size_of::<SharedHeader>() {
            return Err(QueueError::Incompatible("header size mismatch"));
        }
        if self.ring_start != RING_START {
            return Err(QueueError::Incompatible("ring start offset mismatch"));
        }
        if self.elements != capacity as u64 {
            return Err(QueueError::Incompatible("element count mismatch"));
        }
        if self.ring_bytes != ring_bytes as u64 {
            return Err(QueueError::Incompatible("ring byte size mismatch"));
        }
        Ok(())
    }
}

/// A [`Ring`](crate::Ring)-protocol queue living in a shared file mapping.
///
/// Opening either creates the file (when no complete header is present) or
/// attaches to an existing one after validating its header. Producer and
/// consumer handles maintain advisory reference counts in the header; a
/// crashed attacher leaks its increment, which is observable but harmless.
pub struct SharedRing<T: Element> {
    map: MmapMut,
    _file: File,
    config: RingConfig,
    created: bool,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Element> SharedRing<T> {
    /// Opens `path`, creating and initializing the ring file if it does not
    /// yet hold a complete header, or attaching after validation if it does.
    pub fn open<P: AsRef<Path>>(path: P, config: RingConfig) -> Result<Self, QueueError> {
        config.validate()?;
        let path = path.as_ref();
        let ring_bytes = SEQ_AREA + config.capacity * size_of::<Slot<T>>();
        let total_bytes = RING_START + ring_bytes as u64;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        let file_len = file.metadata()?.len();

        if file_len < size_of::<SharedHeader>() as u64 {
            // no complete header: initialize in place. set_len zero-fills,
            // which already encodes counters 0 and slot 0 empty-at-lap-0.
            file.set_len(total_bytes)?;
            let map = unsafe { MmapMut::map_mut(&file)? };
            let mut shared = Self {
                map,
                _file: file,
                config,
                created: true,
                _marker: std::marker::PhantomData,
            };
            shared.initialize(ring_bytes);
            tracing::debug!(
                path = %path.display(),
                capacity = config.capacity,
                "created shared ring"
            );
            return Ok(shared);
        }

        let mut buf = [0u8; size_of::<SharedHeader>()];
        file.read_exact(&mut buf)?;
        HeaderProbe::decode(&buf).validate(config.capacity, ring_bytes)?;
        if file_len < total_bytes {
            return Err(QueueError::Incompatible("file shorter than ring image"));
        }

        let map = unsafe { MmapMut::map_mut(&file)? };
        tracing::debug!(
            path = %path.display(),
            capacity = config.capacity,
            "attached to shared ring"
        );
        Ok(Self {
            map,
            _file: file,
            config,
            created: false,
            _marker: std::marker::PhantomData,
        })
    }

    /// Stamps the header and places every slot in its first-lap empty state.
    fn initialize(&mut self, ring_bytes: usize) {
        // SAFETY: we own the freshly created mapping exclusively until
        // open() returns; nothing concurrent can observe it mid-write.
        unsafe {
            let header = &mut *self.map.as_mut_ptr().cast::<SharedHeader>();
            header.signature = SHARED_SIGNATURE;
            header.header_size = size_of::<SharedHeader>() as u32;
            header.ring_start = RING_START;
            header.elements = self.config.capacity as u64;
            header.ring_bytes = ring_bytes as u64;
        }
        for (position, slot) in self.slots().iter().enumerate() {
            slot.reset(position as u64);
        }
    }

    fn header(&self) -> &SharedHeader {
        // SAFETY: the mapping is at least RING_START bytes, page-aligned,
        // and the header layout was validated (or just written) by open().
        unsafe { &*self.map.as_ptr().cast::<SharedHeader>() }
    }

    fn slots(&self) -> &[Slot<T>] {
        // SAFETY: open() guarantees the mapping holds `capacity` slots at
        // RING_START + SEQ_AREA, 16-byte aligned from the page boundary.
        unsafe {
            let base = self.map.as_ptr().add(RING_START as usize + SEQ_AREA);
            std::slice::from_raw_parts(base.cast::<Slot<T>>(), self.config.capacity)
        }
    }

    fn raw(&self) -> RawRing<'_, T> {
        // SAFETY: same bounds as slots(); the counter blocks sit at
        // RING_START and RING_START + 128, both 128-byte aligned.
        let (write_seq, read_seq) = unsafe {
            let base = self.map.as_ptr().add(RING_START as usize);
            (
                &*base.cast::<CacheAligned<AtomicU64>>(),
                &*base
                    .add(size_of::<CacheAligned<AtomicU64>>())
                    .cast::<CacheAligned<AtomicU64>>(),
            )
        };
        RawRing::new(
            self.slots(),
            write_seq,
            read_seq,
            self.config.lazy_push,
            self.config.lazy_pop,
        )
    }

    /// True when this handle created and initialized the file.
    #[inline]
    pub fn created(&self) -> bool {
        self.created
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.raw().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw().is_empty()
    }

    /// Current producer attachments (advisory; see type docs).
    pub fn producer_count(&self) -> i32 {
        self.header().producer_count.load(Ordering::SeqCst)
    }

    /// Current consumer attachments (advisory).
    pub fn consumer_count(&self) -> i32 {
        self.header().consumer_count.load(Ordering::SeqCst)
    }

    /// Registers a producer, bumping the shared producer count until the
    /// handle is dropped.
    pub fn producer(&self) -> SharedProducer<'_, T> {
        self.header().producer_count.fetch_add(1, Ordering::SeqCst);
        SharedProducer { shared: self }
    }

    /// Registers a consumer, bumping the shared consumer count until the
    /// handle is dropped.
    pub fn consumer(&self) -> SharedConsumer<'_, T> {
        self.header().consumer_count.fetch_add(1, Ordering::SeqCst);
        SharedConsumer { shared: self }
    }
}

impl<T: Element> std::fmt::Debug for SharedRing<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRing")
            .field("capacity", &self.config.capacity)
            .field("len", &self.len())
            .field("created", &self.created)
            .field("producers", &self.producer_count())
            .field("consumers", &self.consumer_count())
            .finish()
    }
}

/// Producing attachment to a [`SharedRing`].
pub struct SharedProducer<'a, T: Element> {
    shared: &'a SharedRing<T>,
}

impl<T: Element> SharedProducer<'_, T> {
    #[inline]
    pub fn try_push(&self, value: T) -> bool {
        self.shared.raw().try_push_indexed(value).is_some()
    }

    #[inline]
    pub fn try_push_indexed(&self, value: T) -> Option<u64> {
        self.shared.raw().try_push_indexed(value)
    }

    /// Always-succeeding push; displaces the oldest unread entry when full.
    #[inline]
    pub fn push_keep_n(&self, value: T) -> u64 {
        self.shared.raw().push_keep_n(value).0
    }
}

impl<T: Element> Drop for SharedProducer<'_, T> {
    fn drop(&mut self) {
        self.shared
            .header()
            .producer_count
            .fetch_sub(1, Ordering::SeqCst);
    }
}

/// Consuming attachment to a [`SharedRing`].
pub struct SharedConsumer<'a, T: Element> {
    shared: &'a SharedRing<T>,
}

impl<T: Element> SharedConsumer<'_, T> {
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        self.shared.raw().try_pop_indexed().map(|(value, _)| value)
    }

    #[inline]
    pub fn try_pop_indexed(&self) -> Option<(T, u64)> {
        self.shared.raw().try_pop_indexed()
    }

    #[inline]
    pub fn peek(&self) -> Option<T> {
        self.shared.raw().peek()
    }
}

impl<T: Element> Drop for SharedConsumer<'_, T> {
    fn drop(&mut self) {
        self.shared
            .header()
            .consumer_count
            .fetch_sub(1, Ordering::SeqCst);
    }
}
