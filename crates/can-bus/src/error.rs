//! CAN Bus Error Types

use thiserror::Error;

/// Errors reported by a CAN controller or by frame construction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanError {
    /// Operation requires the controller to be started
    #[error("CAN controller is not started")]
    NotStarted,

    /// Peripheral rejected the request
    #[error("CAN hardware error: {0}")]
    Hardware(String),

    /// Identifier outside the standard 11-bit range
    #[error("Identifier 0x{0:X} exceeds the standard 11-bit range")]
    InvalidIdentifier(u32),

    /// Payload longer than a classic CAN frame allows
    #[error("Data length {0} exceeds 8 bytes")]
    InvalidDataLength(usize),
}
