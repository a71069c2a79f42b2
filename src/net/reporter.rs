//! Measurement reporter.
//!
//! One best-effort send per successful conversion. Delivery is at-most-once:
//! a failed send is returned to the caller to log, and the value is dropped.
//! No retry, no reconnect, no backoff.

use crate::error::SendError;
use crate::sensors::battery::Millivolts;

use super::codec::{MEASUREMENT_LEN, Measurement};
use super::transport::Transport;

pub struct Reporter<T> {
    link: T,
    sent: u64,
}

impl<T: Transport> Reporter<T> {
    /// Take ownership of an established connection.
    pub fn new(link: T) -> Self {
        Self { link, sent: 0 }
    }

    /// Encode `value` and write it with a single send.
    pub fn send(&mut self, value: Millivolts) -> Result<(), SendError> {
        let frame = Measurement(value).encode();
        let written = self.link.write(&frame)?;
        if written != MEASUREMENT_LEN {
            return Err(SendError::ShortWrite { written });
        }
        self.sent += 1;
        Ok(())
    }

    /// Measurements accepted by the transport since startup.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn link(&self) -> &T {
        &self.link
    }
}
