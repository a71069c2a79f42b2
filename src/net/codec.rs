//! Measurement wire codec.
//!
//! Wire format, one measurement per iteration:
//! ```text
//! ┌──────────────────────────┐
//! │ millivolts (4B, BE i32)  │
//! └──────────────────────────┘
//! ```
//!
//! No header, no length prefix, no acknowledgement. The collector reads the
//! stream in 4-byte chunks.

use crate::sensors::battery::Millivolts;

/// Encoded size of one measurement.
pub const MEASUREMENT_LEN: usize = 4;

/// A calibrated value ready to go on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement(pub Millivolts);

impl Measurement {
    /// Network byte order encoding.
    pub const fn encode(self) -> [u8; MEASUREMENT_LEN] {
        self.0.to_be_bytes()
    }

    pub const fn decode(bytes: [u8; MEASUREMENT_LEN]) -> Self {
        Self(i32::from_be_bytes(bytes))
    }
}

/// Streaming decoder for the collector side: accumulates partial reads and
/// yields complete measurements.
#[derive(Debug, Default)]
pub struct MeasurementDecoder {
    pending: [u8; MEASUREMENT_LEN],
    collected: usize,
}

impl MeasurementDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, calling `on_measurement` for every complete value.
    pub fn feed(&mut self, mut data: &[u8], mut on_measurement: impl FnMut(Measurement)) {
        while !data.is_empty() {
            let take = (MEASUREMENT_LEN - self.collected).min(data.len());
            self.pending[self.collected..self.collected + take].copy_from_slice(&data[..take]);
            self.collected += take;
            data = &data[take..];

            if self.collected == MEASUREMENT_LEN {
                on_measurement(Measurement::decode(self.pending));
                self.collected = 0;
            }
        }
    }

    /// Bytes held back waiting for the rest of a measurement.
    pub fn pending_len(&self) -> usize {
        self.collected
    }
}
