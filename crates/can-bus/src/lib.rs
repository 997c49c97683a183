//! CAN Bus Primitives
//!
//! Frame representation, the bit-timing table, and the controller capability
//! traits the sniffer core drives. Hardware access stays behind
//! [`BusController`] so the capture logic can run against a real peripheral
//! or against [`MockBus`].

mod controller;
mod error;
mod frame;
mod mock;
mod timing;

pub use controller::{
    BusController, Delay, GlobalFilter, IdFilter, RxEvents, RxQueue, ThreadDelay,
};
pub use error::CanError;
pub use frame::CanFrame;
pub use mock::{BusCall, MockBus};
pub use timing::{BitTiming, BitTimingTable, FDCAN_40MHZ_TIMINGS};

/// Standard (11-bit) identifier constants
pub mod id {
    /// Mask covering the standard identifier range
    pub const STANDARD_ID_MASK: u32 = 0x7FF;
    /// Highest valid standard identifier
    pub const MAX_STANDARD_ID: u32 = STANDARD_ID_MASK;
}

/// Maximum payload of a classic CAN frame
pub const MAX_DATA_LENGTH: usize = 8;
