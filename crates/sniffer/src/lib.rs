//! CAN Bus Sniffer
//!
//! Detects or accepts a bus bit rate, captures received frames from the
//! controller's interrupt into a lock-free buffer, and reports them as text.
//!
//! Data flow: [`AutoBaudProbe`] or manual configuration sets the
//! [`CaptureStatus`]; [`CaptureController::start`] programs the controller;
//! the receive interrupt runs [`FrameIngest`]; the foreground drains the
//! buffer through [`FrameReporter`].

mod capture;
mod config;
mod error;
mod ingest;
mod menu;
mod probe;
mod report;
mod status;

pub use capture::CaptureController;
pub use config::{SnifferConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE};
pub use error::SnifferError;
pub use ingest::FrameIngest;
pub use menu::{SettingsMenu, SystemState};
pub use probe::AutoBaudProbe;
pub use report::{
    FrameReporter, FRAME_TERMINATOR, HARDWARE_OVERFLOW_NOTICE, SOFTWARE_OVERFLOW_NOTICE,
};
pub use status::CaptureStatus;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging.
///
/// Log output goes to stderr so stdout carries only the operator dialogue
/// and frame reports.
pub fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}
