//! Auto-baud probing
//!
//! Listens at each supported bit rate in turn and picks the first one at
//! which the controller receives anything. Frames only arrive when the rate
//! matches the bus, so any queued frame is proof of a match.

use can_bus::{BitTiming, BitTimingTable, BusController, CanError, Delay, GlobalFilter, IdFilter};
use std::io::Write;
use tracing::{debug, info, warn};

/// Trial-and-check sweep over a bit-timing table
#[derive(Debug, Clone, Copy)]
pub struct AutoBaudProbe {
    table: BitTimingTable,
    settle_ms: u32,
}

impl AutoBaudProbe {
    pub fn new(table: BitTimingTable, settle_ms: u32) -> Self {
        Self { table, settle_ms }
    }

    /// Try every entry in table order and return the first with traffic.
    ///
    /// The controller is left stopped whatever the outcome. Sparse traffic can
    /// be missed if nothing arrives within the settle interval.
    pub fn run<B, D>(
        &self,
        bus: &mut B,
        delay: &mut D,
        mut progress: Option<&mut dyn Write>,
    ) -> Option<BitTiming>
    where
        B: BusController + ?Sized,
        D: Delay + ?Sized,
    {
        info!(
            "Auto-baud probe over {} rates, {} ms each",
            self.table.len(),
            self.settle_ms
        );

        for timing in self.table.iter() {
            if let Some(out) = progress.as_mut() {
                if let Err(e) = write!(out, "Trying Baud Rate: {}\r\n", timing.bit_rate) {
                    warn!("Failed to write probe progress: {}", e);
                }
            }

            match self.listen(bus, delay, timing) {
                Ok(true) => {
                    info!("Traffic detected at {} bit/s", timing.bit_rate);
                    return Some(*timing);
                }
                Ok(false) => debug!("No traffic at {} bit/s", timing.bit_rate),
                Err(e) => warn!("Probe at {} bit/s failed: {}", timing.bit_rate, e),
            }
        }

        info!("Auto-baud probe found no traffic");
        None
    }

    /// One attempt: accept everything, listen, stop
    fn listen<B, D>(&self, bus: &mut B, delay: &mut D, timing: &BitTiming) -> Result<bool, CanError>
    where
        B: BusController + ?Sized,
        D: Delay + ?Sized,
    {
        bus.apply_timing(timing)?;
        bus.configure_global_filter(GlobalFilter::ACCEPT_ALL)?;
        bus.configure_id_filter(IdFilter::ACCEPT_ALL)?;
        bus.start()?;

        delay.delay_ms(self.settle_ms);
        let seen = bus.rx_fill_level() > 0;

        bus.stop()?;
        Ok(seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_bus::{BusCall, CanFrame, MockBus};

    #[derive(Default)]
    struct RecordingDelay(Vec<u32>);

    impl Delay for RecordingDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.0.push(ms);
        }
    }

    fn table_rates() -> Vec<u32> {
        BitTimingTable::default().rates().collect()
    }

    #[test]
    fn test_silent_bus_tries_every_rate_once() {
        let probe = AutoBaudProbe::new(BitTimingTable::default(), 1500);
        let mut bus = MockBus::new();
        let mut delay = RecordingDelay::default();

        assert!(probe.run(&mut bus, &mut delay, None).is_none());
        assert_eq!(bus.applied_rates(), table_rates());
        assert_eq!(delay.0, vec![1500; 12]);
        assert_eq!(bus.count(BusCall::Start), 12);
        assert_eq!(bus.count(BusCall::Stop), 12);
        assert!(!bus.is_started());
    }

    #[test]
    fn test_stops_at_first_rate_with_traffic() {
        let frame = CanFrame::new(0x7DF, &[0x02, 0x01, 0x0C]).unwrap();
        let probe = AutoBaudProbe::new(BitTimingTable::default(), 10);
        let mut bus = MockBus::with_traffic(250_000, frame);
        let mut delay = RecordingDelay::default();

        let found = probe.run(&mut bus, &mut delay, None).unwrap();
        assert_eq!(found.bit_rate, 250_000);

        let rates = table_rates();
        let k = rates.iter().position(|r| *r == 250_000).unwrap();
        assert_eq!(bus.applied_rates(), rates[..=k].to_vec());
        assert!(!bus.is_started());
    }

    #[test]
    fn test_probe_accepts_all_identifiers() {
        let probe = AutoBaudProbe::new(BitTimingTable::default(), 0);
        let mut bus = MockBus::new();
        probe.run(&mut bus, &mut RecordingDelay::default(), None);

        let calls = bus.calls();
        assert_eq!(
            &calls[..5],
            &[
                BusCall::ApplyTiming(BitTimingTable::default().find(5_000).unwrap()),
                BusCall::GlobalFilter(GlobalFilter::ACCEPT_ALL),
                BusCall::IdFilter(IdFilter::ACCEPT_ALL),
                BusCall::Start,
                BusCall::Stop,
            ]
        );
    }

    #[test]
    fn test_failed_start_moves_on() {
        let probe = AutoBaudProbe::new(BitTimingTable::default(), 0);
        let mut bus = MockBus::with_traffic(5_000, CanFrame::default());
        bus.set_fail_start(true);

        assert!(probe.run(&mut bus, &mut RecordingDelay::default(), None).is_none());
        assert_eq!(bus.applied_rates().len(), 12);
    }

    #[test]
    fn test_verbose_progress() {
        let probe = AutoBaudProbe::new(BitTimingTable::default(), 0);
        let mut bus = MockBus::with_traffic(10_000, CanFrame::default());
        let mut out = Vec::new();

        probe.run(
            &mut bus,
            &mut RecordingDelay::default(),
            Some(&mut out as &mut dyn Write),
        );
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Trying Baud Rate: 5000\r\nTrying Baud Rate: 10000\r\n"
        );
    }
}
