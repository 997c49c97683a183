//! CAN Sniffer - Simulated Bus Entry Point
//!
//! Runs the settings menu on stdin/stdout against a simulated controller. A
//! background thread plays the bus and the receive interrupt.

use can_bus::{CanFrame, MockBus, RxEvents, ThreadDelay};
use sniffer::{
    init_logging, CaptureController, FrameIngest, SettingsMenu, SnifferConfig, SystemState,
};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Identifiers cycled through by the simulated bus
const SIMULATED_IDS: [u32; 4] = [0x0C0, 0x1A0, 0x244, 0x7DF];

/// Every this many frames the bus sends a burst larger than the hardware queue
const BURST_EVERY: u64 = 200;
const BURST_LEN: u64 = 6;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = SnifferConfig::load()?;
    init_logging(config.level()?);

    info!("=== CAN Sniffer v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Simulated bus at {} bit/s, one frame every {} ms",
        config.simulated_bit_rate, config.simulated_frame_interval_ms
    );

    let bus = MockBus::with_traffic(config.simulated_bit_rate, simulated_frame(0));
    let mut controller = CaptureController::new(bus.clone(), ThreadDelay, config.clone())?;
    let ingest = controller
        .take_ingest()
        .ok_or("receive handler already taken")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let interrupt = {
        let shutdown = Arc::clone(&shutdown);
        let interval = Duration::from_millis(config.simulated_frame_interval_ms.max(1));
        thread::spawn(move || simulate_bus(bus, ingest, interval, &shutdown))
    };

    let run_duration = Duration::from_millis(config.run_duration_ms);
    loop {
        let stdin = io::stdin();
        let mut menu = SettingsMenu::new(stdin.lock(), io::stdout());
        if menu.run(&mut controller)? == SystemState::Menu {
            break;
        }

        info!("Capture running for {} ms", config.run_duration_ms);
        let deadline = Instant::now() + run_duration;
        let mut stdout = io::stdout().lock();
        while Instant::now() < deadline {
            controller.drain_and_report(&mut stdout)?;
            stdout.flush()?;
            thread::sleep(Duration::from_millis(10));
        }

        let stats = controller.stats();
        info!(
            "Run period over: {} frames captured, {} dropped",
            stats.total_written, stats.total_dropped
        );
    }

    controller.stop();
    shutdown.store(true, Ordering::Release);
    if interrupt.join().is_err() {
        warn!("Bus simulation thread panicked");
    }
    info!("CAN sniffer exiting");
    Ok(())
}

/// Bus traffic plus the interrupt dispatch the peripheral would perform
fn simulate_bus(mut bus: MockBus, ingest: FrameIngest, interval: Duration, shutdown: &AtomicBool) {
    let mut sequence: u64 = 0;
    while !shutdown.load(Ordering::Acquire) {
        thread::sleep(interval);
        if !bus.notifications_enabled() {
            continue;
        }

        let count = if sequence % BURST_EVERY == BURST_EVERY - 1 {
            BURST_LEN
        } else {
            1
        };
        let mut pending: Option<RxEvents> = None;
        for _ in 0..count {
            sequence += 1;
            if let Some(events) = bus.deliver(simulated_frame(sequence)) {
                pending = Some(pending.map_or(events, |p| p | events));
            }
        }

        if let Some(events) = pending {
            ingest.on_receive(&mut bus, events);
        }
    }
}

fn simulated_frame(sequence: u64) -> CanFrame {
    let id = SIMULATED_IDS[(sequence % SIMULATED_IDS.len() as u64) as usize];
    let bytes = sequence.to_be_bytes();
    let dlc = (sequence % 9) as u8;
    CanFrame::from_raw(id, dlc, &bytes)
}
