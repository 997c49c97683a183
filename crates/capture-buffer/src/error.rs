//! Buffer Error Types

use thiserror::Error;

/// Errors creating a capture buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Capacity must be non-zero
    #[error("Capture buffer capacity must be non-zero")]
    ZeroCapacity,

    /// Index masking needs a power-of-two capacity
    #[error("Capture buffer capacity {0} is not a power of two")]
    CapacityNotPowerOfTwo(usize),

    /// One slot stays empty, so a single slot holds nothing
    #[error("Capture buffer capacity {0} is too small, need at least 2")]
    CapacityTooSmall(usize),
}
