//! Sniffer Error Types

use can_bus::CanError;
use capture_buffer::BufferError;
use thiserror::Error;

/// Errors surfaced by sniffer setup and I/O.
///
/// Capture-time conditions (unknown bit rate, no traffic found, overflows)
/// are reported through status values and latched flags, not through this type.
#[derive(Debug, Error)]
pub enum SnifferError {
    /// Configuration source could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration values are inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Capture buffer could not be created
    #[error("Capture buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Controller failure outside the capture path
    #[error("CAN bus error: {0}")]
    Bus(#[from] CanError),

    /// Operator transport failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
