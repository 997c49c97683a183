//! Operator settings menu
//!
//! Blocking, line-oriented configuration dialogue. Returns once capture has
//! been started, or when the input ends.

use crate::capture::CaptureController;
use crate::error::SnifferError;
use can_bus::{BusController, Delay};
use std::io::{BufRead, Write};
use tracing::debug;

const BANNER: &str = "\
*************************************\r
* CAN Sniffer - Settings menu       *\r
*                                   *\r
* a: Auto Configure CAN Baud Rate   *\r
* m: Manual Configure CAN Baud Rate *\r
* s: Set CAN Filter-Mask            *\r
* g: Get CAN Sniffer status         *\r
* q: Quit and Start CAN Sniffer     *\r
*************************************\r
\n";

/// Which loop the application is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    /// Configuring through the settings menu
    Menu,
    /// Capturing and reporting frames
    Run,
}

/// Settings menu over an operator transport
pub struct SettingsMenu<R, W> {
    input: R,
    output: W,
    /// Unconsumed tokens of the current input line
    pending: Vec<String>,
}

impl<R: BufRead, W: Write> SettingsMenu<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            pending: Vec::new(),
        }
    }

    /// Run the menu until capture starts (`Run`) or input ends (`Menu`).
    ///
    /// Capture is stopped on entry so no traffic is reported while configuring.
    pub fn run<B, D>(
        &mut self,
        controller: &mut CaptureController<B, D>,
    ) -> Result<SystemState, SnifferError>
    where
        B: BusController,
        D: Delay,
    {
        controller.stop();
        self.output.write_all(BANNER.as_bytes())?;
        self.output.flush()?;

        while let Some(option) = self.next_token()? {
            debug!("Menu option '{}'", option);
            match option.as_str() {
                "a" => self.auto_configure(controller)?,
                "m" => self.manual_configure(controller)?,
                "s" => self.set_filter_mask(controller)?,
                "g" => {
                    controller.print_status(&mut self.output)?;
                    write!(self.output, "\n")?;
                }
                "q" => {
                    if controller.start() {
                        self.output.flush()?;
                        return Ok(SystemState::Run);
                    }
                    write!(self.output, "CAN not configured.\r\n\n\n")?;
                }
                _ => write!(self.output, "Option not found. Try again...\r\n\n\n")?,
            }
            self.output.write_all(BANNER.as_bytes())?;
            self.output.flush()?;
        }

        Ok(SystemState::Menu)
    }

    /// Give back the transport halves
    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }

    fn auto_configure<B: BusController, D: Delay>(
        &mut self,
        controller: &mut CaptureController<B, D>,
    ) -> Result<(), SnifferError> {
        let status = controller.auto_configure(Some(&mut self.output as &mut dyn Write));
        if status.is_configured {
            write!(self.output, "\nCAN Detected!\r\n\n")?;
            controller.print_status(&mut self.output)?;
            write!(self.output, "\n")?;
        } else {
            write!(self.output, "\nNo CAN Detected!\r\n\n")?;
        }
        write!(self.output, "\n")?;
        Ok(())
    }

    fn manual_configure<B: BusController, D: Delay>(
        &mut self,
        controller: &mut CaptureController<B, D>,
    ) -> Result<(), SnifferError> {
        write!(self.output, "Provide one of the supported Baud Rates:\r\n")?;
        for rate in controller.table().rates() {
            write!(self.output, "{}\r\n", rate)?;
        }
        write!(self.output, "\n")?;
        self.output.flush()?;

        let bit_rate = self.next_token()?.map_or(0, |t| parse_decimal(&t));
        if controller.manual_configure(bit_rate).is_configured {
            controller.print_status(&mut self.output)?;
            write!(self.output, "\n")?;
        } else {
            write!(self.output, "Configuration failed.\r\n\n")?;
        }
        write!(self.output, "\n")?;
        Ok(())
    }

    fn set_filter_mask<B: BusController, D: Delay>(
        &mut self,
        controller: &mut CaptureController<B, D>,
    ) -> Result<(), SnifferError> {
        write!(self.output, "Provide filter in 0x<filter_id> format\r\n")?;
        self.output.flush()?;
        let filter_id = self.next_token()?.map_or(0, |t| parse_hex(&t));
        write!(self.output, "\n")?;

        write!(self.output, "Provide mask in 0x<mask_id> format\r\n")?;
        self.output.flush()?;
        let mask_id = self.next_token()?.map_or(0, |t| parse_hex(&t));
        write!(self.output, "\n\n")?;

        controller.set_filter_mask(filter_id, mask_id);
        controller.print_status(&mut self.output)?;
        write!(self.output, "\n\n")?;
        Ok(())
    }

    /// Next whitespace-separated token, reading more lines as needed
    fn next_token(&mut self) -> Result<Option<String>, SnifferError> {
        while self.pending.is_empty() {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.pending = line.split_whitespace().rev().map(str::to_string).collect();
        }
        Ok(self.pending.pop())
    }
}

/// Decimal bit rate; anything unparsable is treated as 0
fn parse_decimal(token: &str) -> u32 {
    token.parse().unwrap_or(0)
}

/// Hex value with optional `0x` prefix; anything unparsable is treated as 0
fn parse_hex(token: &str) -> u32 {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u32::from_str_radix(digits, 16).unwrap_or(0)
}
