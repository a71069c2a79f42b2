//! Outbound loop events.
//!
//! The [`SamplingLoop`](super::service::SamplingLoop) emits these through
//! the [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them: log to serial, count them in tests.

use crate::error::{ConversionError, SampleError, SendError};
use crate::events::EventBits;
use crate::sensors::battery::Millivolts;

/// Structured events emitted by the sampling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// The loop is about to run its first iteration.
    Started {
        network_enabled: bool,
        period_secs: u32,
    },

    /// The wait returned, by event (`bits != 0`) or by timeout.
    Woke { bits: EventBits },

    /// A raw sample was acquired.
    Sampled { raw: i16 },

    /// The sample converted to a calibrated value.
    Measured { millivolts: Millivolts },

    /// The value was handed to the transport.
    Reported { millivolts: Millivolts },

    SampleFailed(SampleError),

    ConversionFailed(ConversionError),

    SendFailed(SendError),

    /// The watchdog was fed at the end of an iteration.
    Fed { iteration: u64 },
}
