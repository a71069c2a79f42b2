//! Port traits: the hexagonal boundary between the sampling loop and the
//! device collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SamplingLoop / startup (domain)
//! ```
//!
//! Driven adapters (watchdog, ADC, network stack, console, event sinks,
//! storage) implement these traits. The domain consumes them via generics,
//! so the loop never touches hardware directly and every path can be
//! exercised on the host with mocks.

use core::net::SocketAddr;
use core::time::Duration;
use std::sync::Arc;

use crate::config::NodeConfig;
use crate::error::{ConsoleError, ConversionError, NetworkError, SampleError, WatchdogError};
use crate::events::EventFlags;
use crate::net::transport::Transport;
use crate::sensors::battery::AdcSequence;

// ───────────────────────────────────────────────────────────────
// Watchdog port (liveness)
// ───────────────────────────────────────────────────────────────

/// Opaque handle to one watchdog channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogChannel(pub u32);

/// Hardware watchdog. Allocation and start happen once at boot.
pub trait WatchdogPort {
    /// Reserve a channel that must be fed at least every `timeout`.
    fn allocate_channel(&mut self, timeout: Duration) -> Result<WatchdogChannel, WatchdogError>;

    /// Arm the watchdog. From here on, a missed feed resets the device.
    fn start(&mut self) -> Result<(), WatchdogError>;

    /// Prove liveness for `channel`.
    fn feed(&mut self, channel: WatchdogChannel);
}

// ───────────────────────────────────────────────────────────────
// ADC port (battery channel)
// ───────────────────────────────────────────────────────────────

/// One pre-configured analog channel plus its calibration.
pub trait AdcPort {
    /// Controller name for log lines.
    fn name(&self) -> &str;

    /// Channel index for log lines.
    fn channel_id(&self) -> u8;

    /// Whether the controller finished its own initialisation.
    fn is_ready(&self) -> bool;

    /// Apply the channel configuration (gain, reference, acquisition time).
    fn configure_channel(&mut self) -> Result<(), SampleError>;

    /// Run one acquisition into `sequence.buffer`.
    fn read(&mut self, sequence: &mut AdcSequence) -> Result<(), SampleError>;

    /// Calibrated raw → millivolt transform for this channel.
    fn raw_to_millivolts(&self, value: i32) -> Result<i32, ConversionError>;
}

// ───────────────────────────────────────────────────────────────
// Button event bus (event-delivery collaborator)
// ───────────────────────────────────────────────────────────────

/// The only payload the bus delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonNotification {
    pub pressed: bool,
}

/// Called synchronously on the producer context for each notification.
pub trait ButtonListener: Send + Sync {
    fn on_button(&self, notification: ButtonNotification);
}

/// Registration side of the button event bus.
pub trait ButtonEventBus {
    fn subscribe(&mut self, listener: Arc<dyn ButtonListener>) -> Result<(), SubscribeError>;
}

// ───────────────────────────────────────────────────────────────
// Network port (stack bring-up + connection)
// ───────────────────────────────────────────────────────────────

/// Network stack collaborator.
///
/// `start` hands the adapter a readiness flag set
/// (see [`crate::net::readiness`]) that it keeps up to date from its own
/// state-change callbacks.
pub trait NetworkPort {
    type Link: Transport;

    fn start(&mut self, status: Arc<EventFlags>) -> Result<(), NetworkError>;

    /// Open the long-lived stream connection to `remote`.
    fn connect(&mut self, remote: SocketAddr, timeout: Duration) -> Result<Self::Link, NetworkError>;
}

// ───────────────────────────────────────────────────────────────
// Console port
// ───────────────────────────────────────────────────────────────

pub trait ConsolePort {
    /// Power down the console device.
    fn suspend(&mut self) -> Result<(), ConsoleError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The loop emits structured [`NodeEvent`](super::events::NodeEvent)s
/// through this port. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::NodeEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration.
///
/// Implementations MUST call [`NodeConfig::validate`] before persisting and
/// reject invalid values rather than clamping them.
pub trait ConfigPort {
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeError {
    /// The bus has no room for another listener.
    Full,
    /// The bus was never initialised.
    NotInitialised,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for SubscribeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "listener table full"),
            Self::NotInitialised => write!(f, "event bus not initialised"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
