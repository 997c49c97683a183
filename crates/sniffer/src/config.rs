//! Sniffer configuration

use crate::error::SnifferError;
use capture_buffer::MIN_CAPACITY;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::Level;

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "SNIFFER_CONFIG";

/// Default configuration file stem (`sniffer.toml`, `sniffer.json`, ...)
pub const DEFAULT_CONFIG_FILE: &str = "sniffer";

/// Sniffer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnifferConfig {
    /// Capture buffer slots, a power of two of at least 2; one slot stays empty
    pub buffer_capacity: usize,

    /// Frames drained from the hardware queue per receive interrupt
    pub max_frames_per_event: usize,

    /// Time to listen at each candidate bit rate while auto-probing (ms)
    pub probe_settle_ms: u32,

    /// CAN peripheral kernel clock the timing table was computed for
    pub peripheral_clock_hz: u32,

    /// tracing level filter (error, warn, info, debug, trace)
    pub log_level: String,

    /// Simulator: run-mode duration before returning to the menu (ms)
    pub run_duration_ms: u64,

    /// Simulator: bit rate of the simulated bus
    pub simulated_bit_rate: u32,

    /// Simulator: gap between simulated frames (ms)
    pub simulated_frame_interval_ms: u64,
}

impl Default for SnifferConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 256,
            max_frames_per_event: 32,
            probe_settle_ms: 1500,
            peripheral_clock_hz: 40_000_000,
            log_level: "info".to_string(),
            run_duration_ms: 10_000,
            simulated_bit_rate: 500_000,
            simulated_frame_interval_ms: 5,
        }
    }
}

impl SnifferConfig {
    /// Load defaults, then `sniffer.*` (or `$SNIFFER_CONFIG`) if present,
    /// then `SNIFFER_*` environment variables
    pub fn load() -> Result<Self, SnifferError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let settings = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix("SNIFFER").try_parsing(true))
            .build()?;

        let config: SnifferConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, SnifferError> {
        let config: SnifferConfig = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the capture path cannot work with
    pub fn validate(&self) -> Result<(), SnifferError> {
        if self.buffer_capacity < MIN_CAPACITY || !self.buffer_capacity.is_power_of_two() {
            return Err(SnifferError::InvalidConfig(format!(
                "buffer_capacity {} must be a power of two of at least 2",
                self.buffer_capacity
            )));
        }
        if self.max_frames_per_event == 0 {
            return Err(SnifferError::InvalidConfig(
                "max_frames_per_event must be at least 1".to_string(),
            ));
        }
        if self.peripheral_clock_hz == 0 {
            return Err(SnifferError::InvalidConfig(
                "peripheral_clock_hz must be non-zero".to_string(),
            ));
        }
        self.level()?;
        Ok(())
    }

    /// Parsed log level
    pub fn level(&self) -> Result<Level, SnifferError> {
        Level::from_str(&self.log_level).map_err(|_| {
            SnifferError::InvalidConfig(format!("unknown log_level '{}'", self.log_level))
        })
    }
}
