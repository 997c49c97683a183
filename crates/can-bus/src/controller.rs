//! Controller Capability Traits
//!
//! The sniffer never touches peripheral registers directly. A board support
//! layer implements these traits for its CAN peripheral; tests and the
//! simulator use [`crate::MockBus`].

use crate::error::CanError;
use crate::frame::CanFrame;
use crate::id::STANDARD_ID_MASK;
use crate::timing::BitTiming;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Receive-queue notification flags delivered with each interrupt
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RxEvents: u32 {
        /// A new message was written to the receive queue
        const NEW_MESSAGE = 1 << 0;
        /// The receive queue is full
        const QUEUE_FULL = 1 << 1;
        /// A message was discarded because the receive queue was full
        const MESSAGE_LOST = 1 << 2;
    }
}

/// Handling of standard data frames that match no configured ID filter.
/// Remote frames are always rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalFilter {
    /// Route non-matching frames to the receive queue instead of dropping them
    pub accept_non_matching: bool,
}

impl GlobalFilter {
    /// Everything on the bus reaches the receive queue
    pub const ACCEPT_ALL: Self = Self {
        accept_non_matching: true,
    };
    /// Only frames passing an ID filter reach the receive queue
    pub const REJECT_NON_MATCHING: Self = Self {
        accept_non_matching: false,
    };
}

/// Standard-ID mask filter routed to receive queue 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdFilter {
    pub id: u16,
    pub mask: u16,
}

impl IdFilter {
    /// Zero mask: every identifier matches
    pub const ACCEPT_ALL: Self = Self { id: 0, mask: 0 };

    /// Create a filter, truncating both values to 11 bits
    pub fn new(id: u32, mask: u32) -> Self {
        Self {
            id: (id & STANDARD_ID_MASK) as u16,
            mask: (mask & STANDARD_ID_MASK) as u16,
        }
    }

    /// Hardware acceptance rule: bits selected by the mask must equal the filter
    pub fn matches(&self, identifier: u32) -> bool {
        let mask = self.mask as u32;
        (identifier & mask) == (self.id as u32 & mask)
    }
}

/// Receive side of the controller, the only part used from interrupt context
pub trait RxQueue {
    /// Pop the oldest message from the receive queue, `None` when empty
    fn read_frame(&mut self) -> Option<CanFrame>;

    /// Acknowledge the "message lost" hardware condition
    fn clear_message_lost(&mut self);
}

/// Foreground control of a CAN peripheral
pub trait BusController: RxQueue {
    /// Program nominal bit timing; implies a peripheral re-initialisation
    fn apply_timing(&mut self, timing: &BitTiming) -> Result<(), CanError>;

    /// Configure handling of frames matching no ID filter
    fn configure_global_filter(&mut self, filter: GlobalFilter) -> Result<(), CanError>;

    /// Configure the single standard-ID mask filter
    fn configure_id_filter(&mut self, filter: IdFilter) -> Result<(), CanError>;

    /// Join the bus
    fn start(&mut self) -> Result<(), CanError>;

    /// Leave the bus
    fn stop(&mut self) -> Result<(), CanError>;

    /// Messages currently waiting in the receive queue
    fn rx_fill_level(&self) -> usize;

    /// Enable the received-message interrupt
    fn enable_rx_notification(&mut self) -> Result<(), CanError>;

    /// Disable the received-message interrupt
    fn disable_rx_notification(&mut self) -> Result<(), CanError>;
}

/// Blocking wait provided by the platform
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

/// Thread sleep, for hosted builds
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }
}
