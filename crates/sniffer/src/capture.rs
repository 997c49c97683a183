//! Capture controller
//!
//! Owns the configuration state, the controller handle and the capture
//! buffer, and drives the configure / start / stop lifecycle.

use crate::config::SnifferConfig;
use crate::error::SnifferError;
use crate::ingest::FrameIngest;
use crate::probe::AutoBaudProbe;
use crate::report::FrameReporter;
use crate::status::CaptureStatus;
use can_bus::{
    id::STANDARD_ID_MASK, BitTiming, BitTimingTable, BusController, CanError, Delay, GlobalFilter,
    IdFilter, RxEvents,
};
use capture_buffer::{BufferStats, CaptureBuffer};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Foreground owner of all sniffer state.
///
/// Configuration methods, [`start`](Self::start), [`stop`](Self::stop) and
/// reporting run in the single foreground context. The receive interrupt only
/// ever touches the [`FrameIngest`] handed out by
/// [`take_ingest`](Self::take_ingest).
pub struct CaptureController<B, D> {
    bus: B,
    delay: D,
    table: BitTimingTable,
    config: SnifferConfig,
    status: CaptureStatus,
    /// Timing behind `status.bit_rate` while configured
    timing: Option<BitTiming>,
    buffer: Arc<CaptureBuffer>,
    ingest: Option<FrameIngest>,
    reporter: FrameReporter,
    running: bool,
}

impl<B: BusController, D: Delay> CaptureController<B, D> {
    /// Create a controller over the default 40 MHz timing table
    pub fn new(bus: B, delay: D, config: SnifferConfig) -> Result<Self, SnifferError> {
        Self::with_table(bus, delay, config, BitTimingTable::default())
    }

    /// Create a controller over a custom timing table
    pub fn with_table(
        bus: B,
        delay: D,
        config: SnifferConfig,
        table: BitTimingTable,
    ) -> Result<Self, SnifferError> {
        config.validate()?;

        for timing in table.iter() {
            let actual = timing.bit_rate_for(config.peripheral_clock_hz);
            if actual != timing.bit_rate {
                warn!(
                    "Timing for {} bit/s yields {} bit/s at {} Hz",
                    timing.bit_rate, actual, config.peripheral_clock_hz
                );
            }
        }

        let buffer = Arc::new(CaptureBuffer::new(config.buffer_capacity)?);
        info!(
            "Capture controller ready: {} rates, buffer {} frames, drain bound {}",
            table.len(),
            buffer.max_len(),
            config.max_frames_per_event
        );

        Ok(Self {
            bus,
            delay,
            table,
            status: CaptureStatus::default(),
            timing: None,
            ingest: Some(FrameIngest::new(
                Arc::clone(&buffer),
                config.max_frames_per_event,
            )),
            reporter: FrameReporter::new(Arc::clone(&buffer)),
            buffer,
            config,
            running: false,
        })
    }

    /// Select a bit rate from the table.
    ///
    /// An unsupported rate, or one the controller refuses, leaves the sniffer
    /// unconfigured. Filter and mask are kept either way.
    pub fn manual_configure(&mut self, bit_rate: u32) -> CaptureStatus {
        self.stop_if_running();

        let Some(timing) = self.table.find(bit_rate) else {
            warn!("Bit rate {} is not supported", bit_rate);
            return self.clear_configuration();
        };

        match self.bus.apply_timing(&timing) {
            Ok(()) => self.set_configuration(timing),
            Err(e) => {
                error!("Failed to apply timing for {} bit/s: {}", bit_rate, e);
                self.clear_configuration()
            }
        }
    }

    /// Detect the bus bit rate by probing every table entry.
    ///
    /// With `progress`, each attempted rate is written to it. The stored
    /// filter and mask are not used or changed by probing.
    pub fn auto_configure(&mut self, progress: Option<&mut dyn Write>) -> CaptureStatus {
        self.stop_if_running();

        let probe = AutoBaudProbe::new(self.table, self.config.probe_settle_ms);
        match probe.run(&mut self.bus, &mut self.delay, progress) {
            Some(timing) => self.set_configuration(timing),
            None => self.clear_configuration(),
        }
    }

    /// Store the acceptance filter, truncated to 11 bits.
    ///
    /// Takes effect on the next [`start`](Self::start).
    pub fn set_filter_mask(&mut self, filter_id: u32, mask_id: u32) -> CaptureStatus {
        self.status.filter_id = filter_id & STANDARD_ID_MASK;
        self.status.mask_id = mask_id & STANDARD_ID_MASK;
        info!(
            "Filter set to 0x{:03X}, mask 0x{:03X}",
            self.status.filter_id, self.status.mask_id
        );
        self.status
    }

    /// Current status
    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    /// Current status, also written to `out` for the operator
    pub fn print_status<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<CaptureStatus> {
        self.status.write_to(out)?;
        Ok(self.status)
    }

    /// Program filters and join the bus with receive interrupts enabled.
    ///
    /// Returns false without touching the controller when no bit rate is
    /// configured, and false after a best-effort stop if the controller
    /// rejects any step.
    pub fn start(&mut self) -> bool {
        let timing = match (self.status.is_configured, self.timing) {
            (true, Some(timing)) => timing,
            _ => {
                warn!("Start refused: CAN not configured");
                return false;
            }
        };
        if self.running {
            debug!("Capture already running");
            return true;
        }

        match self.program_and_start(&timing) {
            Ok(()) => {
                self.running = true;
                info!(
                    "Capture started at {} bit/s, filter 0x{:03X} mask 0x{:03X}",
                    timing.bit_rate, self.status.filter_id, self.status.mask_id
                );
                true
            }
            Err(e) => {
                error!("Failed to start capture: {}", e);
                if let Err(e) = self.bus.stop() {
                    warn!("Stop after failed start also failed: {}", e);
                }
                false
            }
        }
    }

    /// Leave the bus, disable receive interrupts and discard buffered frames.
    ///
    /// Always succeeds and may be called repeatedly.
    pub fn stop(&mut self) {
        if let Err(e) = self.bus.stop() {
            warn!("Controller stop failed: {}", e);
        }
        if let Err(e) = self.bus.disable_rx_notification() {
            warn!("Disabling receive notification failed: {}", e);
        }
        let discarded = self.buffer.len();
        self.buffer.reset();
        if self.running {
            info!("Capture stopped, {} buffered frames discarded", discarded);
        }
        self.running = false;
    }

    /// True between a successful start and the next stop
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Hand the receive handler to the interrupt context; `None` once taken
    pub fn take_ingest(&mut self) -> Option<FrameIngest> {
        self.ingest.take()
    }

    /// Run the receive handler against this controller's own bus handle.
    ///
    /// For platforms that dispatch the interrupt through the foreground
    /// owner. Returns false if the handler was already taken.
    pub fn service_rx_interrupt(&mut self, events: RxEvents) -> bool {
        match &self.ingest {
            Some(ingest) => {
                ingest.on_receive(&mut self.bus, events);
                true
            }
            None => false,
        }
    }

    pub fn reporter(&self) -> &FrameReporter {
        &self.reporter
    }

    /// Report pending overflows and buffered frames to `out`
    pub fn drain_and_report<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<usize> {
        self.reporter.drain_and_report(out)
    }

    /// Buffer occupancy and lifetime counters
    pub fn stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    pub fn table(&self) -> &BitTimingTable {
        &self.table
    }

    pub fn config(&self) -> &SnifferConfig {
        &self.config
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    fn program_and_start(&mut self, timing: &BitTiming) -> Result<(), CanError> {
        self.bus.apply_timing(timing)?;
        self.bus.configure_global_filter(GlobalFilter::REJECT_NON_MATCHING)?;
        let filter = IdFilter::new(self.status.filter_id, self.status.mask_id);
        self.bus.configure_id_filter(filter)?;
        self.bus.start()?;
        self.bus.enable_rx_notification()
    }

    fn stop_if_running(&mut self) {
        if self.running {
            info!("Stopping capture for reconfiguration");
            self.stop();
        }
    }

    fn set_configuration(&mut self, timing: BitTiming) -> CaptureStatus {
        self.timing = Some(timing);
        self.status = self.status.configured(timing.bit_rate);
        info!("CAN configured at {} bit/s", timing.bit_rate);
        self.status
    }

    fn clear_configuration(&mut self) -> CaptureStatus {
        self.timing = None;
        self.status = self.status.unconfigured();
        self.status
    }
}
