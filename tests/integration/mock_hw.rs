//! Mock collaborators for the integration tests.
//!
//! The simulation adapters shipped with the crate cover the happy paths;
//! these mocks add the failure sites and observation points the tests need.

use core::time::Duration;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use battnode::app::events::NodeEvent;
use battnode::app::ports::{
    AdcPort, ButtonEventBus, ButtonListener, ButtonNotification, EventSink, SubscribeError,
    WatchdogChannel, WatchdogPort,
};
use battnode::error::{ConversionError, SampleError, WatchdogError};
use battnode::sensors::battery::{AdcSequence, LinearCalibration};

// ── Watchdog ──────────────────────────────────────────────────

/// Counts feeds through a shared handle so they stay observable after the
/// watchdog has been moved into the node.
#[derive(Clone, Default)]
pub struct CountingWdt {
    feeds: Arc<AtomicU64>,
    fail_allocate: bool,
}

#[allow(dead_code)]
impl CountingWdt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_channels() -> Self {
        Self {
            fail_allocate: true,
            ..Self::default()
        }
    }

    pub fn feeds(&self) -> u64 {
        self.feeds.load(Ordering::SeqCst)
    }
}

impl WatchdogPort for CountingWdt {
    fn allocate_channel(&mut self, _timeout: Duration) -> Result<WatchdogChannel, WatchdogError> {
        if self.fail_allocate {
            return Err(WatchdogError::NoChannel(-12));
        }
        Ok(WatchdogChannel(3))
    }

    fn start(&mut self) -> Result<(), WatchdogError> {
        Ok(())
    }

    fn feed(&mut self, channel: WatchdogChannel) {
        assert_eq!(channel, WatchdogChannel(3));
        self.feeds.fetch_add(1, Ordering::SeqCst);
    }
}

/// Tracks the longest interval between consecutive feeds, counted from
/// `start`.
#[derive(Clone, Default)]
pub struct GapWdt {
    state: Arc<Mutex<(Option<Instant>, Duration)>>,
}

#[allow(dead_code)]
impl GapWdt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_gap(&self) -> Duration {
        self.state.lock().unwrap().1
    }
}

impl WatchdogPort for GapWdt {
    fn allocate_channel(&mut self, _timeout: Duration) -> Result<WatchdogChannel, WatchdogError> {
        Ok(WatchdogChannel(0))
    }

    fn start(&mut self) -> Result<(), WatchdogError> {
        self.state.lock().unwrap().0 = Some(Instant::now());
        Ok(())
    }

    fn feed(&mut self, _channel: WatchdogChannel) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        if let Some(last) = state.0 {
            state.1 = state.1.max(now - last);
        }
        state.0 = Some(now);
    }
}

// ── ADC ───────────────────────────────────────────────────────

/// A controller that never finished its own initialisation.
pub struct DeadAdc;

impl AdcPort for DeadAdc {
    fn name(&self) -> &str {
        "adc(dead)"
    }

    fn channel_id(&self) -> u8 {
        0
    }

    fn is_ready(&self) -> bool {
        false
    }

    fn configure_channel(&mut self) -> Result<(), SampleError> {
        panic!("configure_channel on a dead controller");
    }

    fn read(&mut self, _sequence: &mut AdcSequence) -> Result<(), SampleError> {
        Err(SampleError::NotReady)
    }

    fn raw_to_millivolts(&self, value: i32) -> Result<i32, ConversionError> {
        LinearCalibration::default_12bit().raw_to_millivolts(value)
    }
}

// ── Button bus ────────────────────────────────────────────────

/// Keeps subscribed listeners so tests can fire notifications by hand.
#[derive(Default)]
pub struct ManualBus {
    listeners: Vec<Arc<dyn ButtonListener>>,
    refuse: bool,
}

#[allow(dead_code)]
impl ManualBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uninitialised() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn fire(&self, pressed: bool) {
        for l in &self.listeners {
            l.on_button(ButtonNotification { pressed });
        }
    }
}

impl ButtonEventBus for ManualBus {
    fn subscribe(&mut self, listener: Arc<dyn ButtonListener>) -> Result<(), SubscribeError> {
        if self.refuse {
            return Err(SubscribeError::NotInitialised);
        }
        self.listeners.push(listener);
        Ok(())
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct Recorder {
    pub events: Vec<NodeEvent>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&NodeEvent> {
        self.events.last()
    }
}

impl EventSink for Recorder {
    fn emit(&mut self, event: &NodeEvent) {
        self.events.push(event.clone());
    }
}
