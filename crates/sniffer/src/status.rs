//! Capture configuration status

use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Current bit-rate and acceptance filter settings.
///
/// Filter and mask survive failed configuration attempts, so they can be set
/// before or after the bit rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStatus {
    /// A supported bit rate has been selected
    pub is_configured: bool,
    /// Selected bit rate, 0 when unconfigured
    pub bit_rate: u32,
    /// 11-bit acceptance filter
    pub filter_id: u32,
    /// 11-bit acceptance mask
    pub mask_id: u32,
}

impl CaptureStatus {
    /// Same filter and mask, bit rate set
    pub(crate) fn configured(self, bit_rate: u32) -> Self {
        Self {
            is_configured: true,
            bit_rate,
            ..self
        }
    }

    /// Same filter and mask, bit rate cleared
    pub(crate) fn unconfigured(self) -> Self {
        Self {
            is_configured: false,
            bit_rate: 0,
            ..self
        }
    }

    /// Operator-facing status lines
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        if self.is_configured {
            write!(out, "CAN configured.\r\n")?;
            write!(out, "Baud Rate: {}\r\n", self.bit_rate)?;
        } else {
            write!(out, "CAN not configured.\r\n")?;
            write!(out, "Baud Rate not set.\r\n")?;
        }
        write!(out, "Filter ID: 0x{:03x}\r\n", self.filter_id)?;
        write!(out, "Mask ID: 0x{:03x}\r\n", self.mask_id)
    }
}
