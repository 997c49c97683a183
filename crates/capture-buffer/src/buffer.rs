//! Lock-Free Capture Buffer Implementation

use crate::error::BufferError;
use can_bus::CanFrame;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Default buffer capacity (256 slots, 255 frames)
pub const DEFAULT_CAPACITY: usize = 256;

/// Smallest capacity that can hold a frame
pub const MIN_CAPACITY: usize = 2;

/// Snapshot of buffer occupancy and lifetime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Frames currently waiting
    pub len: usize,
    /// Slot count; one fewer frame can be held at once
    pub capacity: usize,
    /// Frames accepted since creation
    pub total_written: usize,
    /// Frames dropped on a full buffer since creation
    pub total_dropped: usize,
}

/// Lock-free SPSC ring buffer for captured frames.
///
/// `head` is stored only by [`push`](Self::push) (the receive interrupt) and
/// `tail` only by [`pop`](Self::pop) and [`reset`](Self::reset) (the
/// foreground). Both are free-running counters masked into the slot array.
/// One slot always stays empty: the buffer is full when advancing head by one
/// would land on tail, so at most `capacity - 1` frames are held. A full
/// buffer drops the incoming frame; unread data is never overwritten.
pub struct CaptureBuffer {
    /// Pre-allocated storage
    slots: Box<[UnsafeCell<CanFrame>]>,
    /// capacity - 1
    mask: usize,
    /// Write counter
    head: AtomicUsize,
    /// Read counter
    tail: AtomicUsize,
    /// Peripheral queue lost messages
    hardware_overflow: AtomicBool,
    /// This buffer dropped a frame
    software_overflow: AtomicBool,
    total_written: AtomicUsize,
    total_dropped: AtomicUsize,
}

impl CaptureBuffer {
    /// Create a buffer of `capacity` slots, holding up to `capacity - 1` frames.
    ///
    /// `capacity` must be a power of two of at least 2.
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        if !capacity.is_power_of_two() {
            return Err(BufferError::CapacityNotPowerOfTwo(capacity));
        }
        if capacity < MIN_CAPACITY {
            return Err(BufferError::CapacityTooSmall(capacity));
        }
        Ok(Self::allocate(capacity))
    }

    /// Create a buffer with default capacity (256 frames)
    pub fn with_default_capacity() -> Self {
        Self::allocate(DEFAULT_CAPACITY)
    }

    fn allocate(capacity: usize) -> Self {
        let slots: Vec<UnsafeCell<CanFrame>> = (0..capacity)
            .map(|_| UnsafeCell::new(CanFrame::default()))
            .collect();
        Self {
            slots: slots.into_boxed_slice(),
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            hardware_overflow: AtomicBool::new(false),
            software_overflow: AtomicBool::new(false),
            total_written: AtomicUsize::new(0),
            total_dropped: AtomicUsize::new(0),
        }
    }

    /// Enqueue a frame. Producer side only.
    ///
    /// Returns false and latches the software-overflow flag if the buffer is full.
    pub fn push(&self, frame: CanFrame) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        // Acquire pairs with pop's Release so the slot is no longer being read
        let tail = self.tail.load(Ordering::Acquire);

        let next = head.wrapping_add(1);
        if next & self.mask == tail & self.mask {
            self.software_overflow.store(true, Ordering::Release);
            self.total_dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // SAFETY: only the producer writes slots, and the slot at `head` is
        // outside the consumer's readable range until head is published below
        unsafe {
            *self.slots[head & self.mask].get() = frame;
        }

        self.head.store(next, Ordering::Release);
        self.total_written.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Dequeue the oldest frame. Consumer side only.
    pub fn pop(&self) -> Option<CanFrame> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        // SAFETY: the Acquire load of head makes the producer's slot write
        // visible, and the producer will not reuse this slot until tail moves
        let frame = unsafe { *self.slots[tail & self.mask].get() };

        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(frame)
    }

    /// Copy out the oldest frame without consuming it. Consumer side only.
    pub fn peek(&self) -> Option<CanFrame> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        // SAFETY: same argument as pop; tail is not moved, so the slot stays
        // reserved for the consumer
        Some(unsafe { *self.slots[tail & self.mask].get() })
    }

    /// Discard everything buffered. Consumer side only.
    ///
    /// Moves tail up to head instead of zeroing both counters, so the
    /// producer's counter is never written from the foreground.
    pub fn reset(&self) {
        let head = self.head.load(Ordering::Acquire);
        self.tail.store(head, Ordering::Release);
    }

    /// Latch the hardware-overflow flag. Producer side only.
    pub fn flag_hardware_overflow(&self) {
        self.hardware_overflow.store(true, Ordering::Release);
    }

    /// Clear and return the hardware-overflow flag
    pub fn take_hardware_overflow(&self) -> bool {
        self.hardware_overflow.swap(false, Ordering::AcqRel)
    }

    /// Clear and return the software-overflow flag
    pub fn take_software_overflow(&self) -> bool {
        self.software_overflow.swap(false, Ordering::AcqRel)
    }

    pub fn has_hardware_overflow(&self) -> bool {
        self.hardware_overflow.load(Ordering::Acquire)
    }

    pub fn has_software_overflow(&self) -> bool {
        self.software_overflow.load(Ordering::Acquire)
    }

    /// Get the number of frames currently in the buffer
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        head.wrapping_sub(tail).min(self.max_len())
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len() == self.max_len()
    }

    /// Get the buffer capacity in slots
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Most frames the buffer can hold at once
    pub fn max_len(&self) -> usize {
        self.mask
    }

    /// Occupancy and lifetime counters
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            len: self.len(),
            capacity: self.capacity(),
            total_written: self.total_written.load(Ordering::Relaxed),
            total_dropped: self.total_dropped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for CaptureBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureBuffer")
            .field("stats", &self.stats())
            .field("hardware_overflow", &self.has_hardware_overflow())
            .field("software_overflow", &self.has_software_overflow())
            .finish()
    }
}

// SAFETY: slots are only accessed under the single-producer/single-consumer
// protocol above; head/tail publication orders every slot access.
unsafe impl Sync for CaptureBuffer {}
