//! ISR-debounced button driver and button event bus.
//!
//! ## Hardware
//!
//! Active-low momentary switch with external pull-up. The GPIO interrupt
//! fires on both edges; the ISR only stamps an [`EdgeLatch`] (two atomic
//! stores, no locks). The producer thread calls [`ButtonDriver::tick`],
//! which picks up new edges, waits for the line to settle, samples the pin
//! level and dispatches a [`ButtonNotification`] to every subscribed
//! listener when the debounced state changes.
//!
//! ```text
//!   GPIO edge ─▶ ISR ─▶ EdgeLatch ─▶ tick() ─▶ debounce ─▶ listeners
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;

use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use embedded_hal::digital::InputPin;
use log::{debug, info, warn};

use crate::app::ports::{ButtonEventBus, ButtonListener, ButtonNotification, SubscribeError};

const DEBOUNCE_MS: u32 = 50;
const MAX_LISTENERS: usize = 4;

/// Latest GPIO edge, written by the ISR and read by the debouncer.
pub struct EdgeLatch {
    last_ms: AtomicU32,
    count: AtomicU32,
}

impl Default for EdgeLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeLatch {
    pub const fn new() -> Self {
        Self {
            last_ms: AtomicU32::new(0),
            count: AtomicU32::new(0),
        }
    }

    /// Record an edge. Lock-free; safe to call from interrupt context.
    pub fn record(&self, now_ms: u32) {
        self.last_ms.store(now_ms, Ordering::Release);
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Timestamp of the newest edge if any arrived since `seen` was last
    /// updated. Intermediate edges collapse into the newest one.
    fn newest_since(&self, seen: &mut u32) -> Option<u32> {
        let count = self.count.load(Ordering::Acquire);
        if count == *seen {
            return None;
        }
        *seen = count;
        Some(self.last_ms.load(Ordering::Acquire))
    }
}

/// Milliseconds on the same clock the ISR uses, truncated to u32.
#[cfg(target_os = "espidf")]
pub fn monotonic_ms() -> u32 {
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1000) as u32
}

#[cfg(not(target_os = "espidf"))]
pub fn monotonic_ms() -> u32 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_millis() as u32
}

/// Input pin whose edge interrupt may need re-enabling after each edge.
pub trait ButtonPin: InputPin {
    fn rearm_interrupt(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub struct ButtonDriver<P> {
    pin: P,
    edges: &'static EdgeLatch,
    seen_edges: u32,
    listeners: heapless::Vec<Arc<dyn ButtonListener>, MAX_LISTENERS>,
    pressed: bool,
    settling_since: Option<u32>,
}

impl<P: ButtonPin> ButtonDriver<P> {
    pub fn new(pin: P, edges: &'static EdgeLatch) -> Self {
        Self {
            pin,
            edges,
            seen_edges: edges.count.load(Ordering::Acquire),
            listeners: heapless::Vec::new(),
            pressed: false,
            settling_since: None,
        }
    }

    /// Debounced state as last dispatched.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Pick up new edges and dispatch a notification once the line has
    /// been quiet for the debounce window and its level changed.
    pub fn tick(&mut self, now_ms: u32) -> Option<ButtonNotification> {
        if let Some(at_ms) = self.edges.newest_since(&mut self.seen_edges) {
            // Any edge restarts the settle window.
            self.settling_since = Some(at_ms);
        }

        let since = self.settling_since?;
        if now_ms.wrapping_sub(since) < DEBOUNCE_MS {
            return None;
        }
        self.settling_since = None;

        if self.pin.rearm_interrupt().is_err() {
            warn!("button: could not re-enable edge interrupt");
        }

        let pressed = match self.pin.is_low() {
            Ok(level) => level,
            Err(_) => {
                warn!("button: pin read failed");
                return None;
            }
        };
        if pressed == self.pressed {
            // bounce that settled back to the same level
            return None;
        }
        self.pressed = pressed;

        let notification = ButtonNotification { pressed };
        debug!("button: {}", if pressed { "pressed" } else { "released" });
        for listener in &self.listeners {
            listener.on_button(notification);
        }
        Some(notification)
    }
}

impl<P: ButtonPin> ButtonEventBus for ButtonDriver<P> {
    fn subscribe(&mut self, listener: Arc<dyn ButtonListener>) -> Result<(), SubscribeError> {
        self.listeners
            .push(listener)
            .map_err(|_| SubscribeError::Full)
    }
}

impl<P: ButtonPin + Send + 'static> ButtonDriver<P> {
    /// Move the driver onto its own producer thread, ticking every `poll`.
    pub fn spawn(mut self, poll: Duration) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("button".into())
            .stack_size(4096)
            .spawn(move || {
                info!("button: producer running ({:?} poll)", poll);
                loop {
                    self.tick(monotonic_ms());
                    std::thread::sleep(poll);
                }
            })
    }
}
