//! Capture Buffer
//!
//! Fixed-capacity SPSC ring buffer that decouples the receive interrupt
//! (producer) from the frame reporter (consumer).

mod buffer;
mod error;

pub use buffer::{BufferStats, CaptureBuffer, DEFAULT_CAPACITY, MIN_CAPACITY};
pub use error::BufferError;
