//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by rendering each [`NodeEvent`] as a one-line
//! log record (UART / USB-CDC in production).

use log::{debug, info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::EventSink;

#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &NodeEvent) {
        match event {
            NodeEvent::Started {
                network_enabled,
                period_secs,
            } => {
                info!(
                    "START | network={} | period={}s",
                    if *network_enabled { "on" } else { "off" },
                    period_secs
                );
            }
            NodeEvent::Woke { bits } => {
                if *bits == 0 {
                    info!("WAKE | timeout");
                } else {
                    info!("WAKE | events=0x{:08x}", bits);
                }
            }
            NodeEvent::Sampled { raw } => debug!("ADC | raw={}", raw),
            NodeEvent::Measured { millivolts } => info!("ADC | {} mV", millivolts),
            NodeEvent::Reported { millivolts } => info!("SEND | {} mV", millivolts),
            NodeEvent::SampleFailed(e) => warn!("ADC | {}", e),
            NodeEvent::ConversionFailed(e) => warn!("ADC | {}", e),
            NodeEvent::SendFailed(e) => warn!("SEND | {}", e),
            NodeEvent::Fed { iteration } => debug!("FEED | iteration={}", iteration),
        }
    }
}
