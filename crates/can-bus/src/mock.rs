//! Simulated CAN Controller
//!
//! Records every control call and models a small hardware receive queue with
//! acceptance filtering, so capture logic can be exercised without hardware.
//! Clones share state: one handle can serve as the foreground controller while
//! another plays the interrupt side.

use crate::controller::{BusController, GlobalFilter, IdFilter, RxEvents, RxQueue};
use crate::error::CanError;
use crate::frame::CanFrame;
use crate::timing::BitTiming;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

/// Receive queue depth of the modelled peripheral (FDCAN RX FIFO0)
pub const DEFAULT_RX_QUEUE_DEPTH: usize = 3;

/// A control operation issued to the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusCall {
    ApplyTiming(BitTiming),
    GlobalFilter(GlobalFilter),
    IdFilter(IdFilter),
    Start,
    Stop,
    EnableNotification,
    DisableNotification,
    ClearMessageLost,
}

#[derive(Debug)]
struct MockState {
    calls: Vec<BusCall>,
    timing: Option<BitTiming>,
    global_filter: GlobalFilter,
    id_filter: Option<IdFilter>,
    started: bool,
    notifications: bool,
    rx_queue: VecDeque<CanFrame>,
    rx_queue_depth: usize,
    message_lost: bool,
    /// Bit rate the simulated bus runs at, with the frame seen on start
    traffic: Option<(u32, CanFrame)>,
    fail_start: bool,
}

/// Recording, scriptable [`BusController`]
#[derive(Debug, Clone)]
pub struct MockBus {
    state: Arc<Mutex<MockState>>,
}

impl MockBus {
    /// Silent bus: nothing is ever received during probing
    pub fn new() -> Self {
        debug!("Creating mock CAN bus");
        Self {
            state: Arc::new(Mutex::new(MockState {
                calls: Vec::new(),
                timing: None,
                global_filter: GlobalFilter::REJECT_NON_MATCHING,
                id_filter: None,
                started: false,
                notifications: false,
                rx_queue: VecDeque::new(),
                rx_queue_depth: DEFAULT_RX_QUEUE_DEPTH,
                message_lost: false,
                traffic: None,
                fail_start: false,
            })),
        }
    }

    /// Bus with traffic at `bit_rate`: starting the controller at that rate
    /// queues `frame` as if it had just been received
    pub fn with_traffic(bit_rate: u32, frame: CanFrame) -> Self {
        let bus = Self::new();
        bus.lock().traffic = Some((bit_rate, frame));
        bus
    }

    /// Change the modelled receive queue depth
    pub fn set_rx_queue_depth(&self, depth: usize) {
        self.lock().rx_queue_depth = depth.max(1);
    }

    /// Make subsequent `start` calls fail
    pub fn set_fail_start(&self, fail: bool) {
        self.lock().fail_start = fail;
    }

    /// Deliver a frame from the bus.
    ///
    /// Returns the interrupt flags the peripheral would raise, or `None` when
    /// the frame never reaches the receive queue (stopped, wrong bit rate,
    /// filtered out). Flags are returned even with notifications disabled;
    /// the caller decides whether the interrupt fires.
    pub fn deliver(&self, frame: CanFrame) -> Option<RxEvents> {
        let mut state = self.lock();
        if !state.started {
            return None;
        }
        if let (Some((rate, _)), Some(timing)) = (state.traffic, state.timing) {
            if rate != timing.bit_rate {
                return None;
            }
        }
        let matched = state
            .id_filter
            .map_or(false, |f| f.matches(frame.identifier()));
        if !matched && !state.global_filter.accept_non_matching {
            trace!("Frame 0x{:03X} rejected by filter", frame.identifier());
            return None;
        }
        if state.rx_queue.len() >= state.rx_queue_depth {
            state.message_lost = true;
            return Some(RxEvents::MESSAGE_LOST | RxEvents::QUEUE_FULL);
        }
        state.rx_queue.push_back(frame);
        let mut events = RxEvents::NEW_MESSAGE;
        if state.rx_queue.len() == state.rx_queue_depth {
            events |= RxEvents::QUEUE_FULL;
        }
        if state.message_lost {
            events |= RxEvents::MESSAGE_LOST;
        }
        Some(events)
    }

    /// Every control call so far, in order
    pub fn calls(&self) -> Vec<BusCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls equal to `call`
    pub fn count(&self, call: BusCall) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }

    /// Bit rates programmed so far, in order
    pub fn applied_rates(&self) -> Vec<u32> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                BusCall::ApplyTiming(t) => Some(t.bit_rate),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    pub fn notifications_enabled(&self) -> bool {
        self.lock().notifications
    }

    pub fn current_timing(&self) -> Option<BitTiming> {
        self.lock().timing
    }

    pub fn id_filter(&self) -> Option<IdFilter> {
        self.lock().id_filter
    }

    pub fn global_filter(&self) -> GlobalFilter {
        self.lock().global_filter
    }

    /// True while the "message lost" condition is unacknowledged
    pub fn message_lost(&self) -> bool {
        self.lock().message_lost
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // a poisoned lock only means another test thread panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RxQueue for MockBus {
    fn read_frame(&mut self) -> Option<CanFrame> {
        self.lock().rx_queue.pop_front()
    }

    fn clear_message_lost(&mut self) {
        let mut state = self.lock();
        state.message_lost = false;
        state.calls.push(BusCall::ClearMessageLost);
    }
}

impl BusController for MockBus {
    fn apply_timing(&mut self, timing: &BitTiming) -> Result<(), CanError> {
        let mut state = self.lock();
        state.calls.push(BusCall::ApplyTiming(*timing));
        // re-initialisation drops filters and anything queued
        state.timing = Some(*timing);
        state.id_filter = None;
        state.global_filter = GlobalFilter::REJECT_NON_MATCHING;
        state.rx_queue.clear();
        state.message_lost = false;
        Ok(())
    }

    fn configure_global_filter(&mut self, filter: GlobalFilter) -> Result<(), CanError> {
        let mut state = self.lock();
        state.calls.push(BusCall::GlobalFilter(filter));
        state.global_filter = filter;
        Ok(())
    }

    fn configure_id_filter(&mut self, filter: IdFilter) -> Result<(), CanError> {
        let mut state = self.lock();
        state.calls.push(BusCall::IdFilter(filter));
        state.id_filter = Some(filter);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CanError> {
        let mut state = self.lock();
        state.calls.push(BusCall::Start);
        if state.fail_start {
            return Err(CanError::Hardware("start refused".to_string()));
        }
        state.started = true;
        if let (Some((rate, frame)), Some(timing)) = (state.traffic, state.timing) {
            if rate == timing.bit_rate && state.rx_queue.len() < state.rx_queue_depth {
                state.rx_queue.push_back(frame);
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CanError> {
        let mut state = self.lock();
        state.calls.push(BusCall::Stop);
        state.started = false;
        Ok(())
    }

    fn rx_fill_level(&self) -> usize {
        self.lock().rx_queue.len()
    }

    fn enable_rx_notification(&mut self) -> Result<(), CanError> {
        let mut state = self.lock();
        state.calls.push(BusCall::EnableNotification);
        if !state.started {
            return Err(CanError::NotStarted);
        }
        state.notifications = true;
        Ok(())
    }

    fn disable_rx_notification(&mut self) -> Result<(), CanError> {
        let mut state = self.lock();
        state.calls.push(BusCall::DisableNotification);
        state.notifications = false;
        Ok(())
    }
}
