//! Battery-voltage sampler.
//!
//! Reads the battery channel through an [`AdcPort`] and converts the raw
//! sample to millivolts in two stages:
//!
//! 1. multiply by the divider pre-scale (the board feeds the ADC a fraction
//!    of the supply, e.g. VDDH / 5),
//! 2. apply the channel's calibrated transform supplied by the adapter.
//!
//! The sampler owns a single [`AdcSequence`] and reuses its buffer on every
//! acquisition. Nothing is retained between iterations.

use log::debug;

use crate::app::ports::AdcPort;
use crate::error::{ConversionError, SampleError};

/// Calibrated battery voltage.
pub type Millivolts = i32;

/// Acquisition descriptor handed to the ADC on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcSequence {
    pub channel: u8,
    pub resolution_bits: u8,
    /// log2 of the number of hardware-averaged samples.
    pub oversampling: u8,
    /// Destination of the acquisition, one device-native sample.
    pub buffer: i16,
}

impl AdcSequence {
    pub const fn new(channel: u8, resolution_bits: u8) -> Self {
        Self {
            channel,
            resolution_bits,
            oversampling: 0,
            buffer: 0,
        }
    }

    /// Reset the descriptor before an acquisition.
    fn reset(&mut self) {
        self.buffer = 0;
    }
}

/// One raw acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReading {
    pub raw: i16,
}

pub struct BatterySampler<A> {
    adc: A,
    sequence: AdcSequence,
    prescale: i32,
}

impl<A: AdcPort> BatterySampler<A> {
    pub fn new(adc: A, prescale: i32, resolution_bits: u8) -> Self {
        let sequence = AdcSequence::new(adc.channel_id(), resolution_bits);
        Self {
            adc,
            sequence,
            prescale,
        }
    }

    pub fn adc(&self) -> &A {
        &self.adc
    }

    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }

    pub fn prescale(&self) -> i32 {
        self.prescale
    }

    /// Trigger one acquisition.
    pub fn sample(&mut self) -> Result<RawReading, SampleError> {
        self.sequence.reset();
        self.adc.read(&mut self.sequence)?;
        let raw = self.sequence.buffer;
        debug!(
            "{}, channel {}: {}",
            self.adc.name(),
            self.adc.channel_id(),
            raw
        );
        Ok(RawReading { raw })
    }

    /// Pre-scale then calibrate. Pure for a fixed calibration.
    pub fn convert(&self, reading: RawReading) -> Result<Millivolts, ConversionError> {
        let scaled = i32::from(reading.raw)
            .checked_mul(self.prescale)
            .ok_or(ConversionError::Overflow)?;
        self.adc.raw_to_millivolts(scaled)
    }
}

// ---------------------------------------------------------------------------
// Linear calibration
// ---------------------------------------------------------------------------

/// Reference-voltage / resolution transform used when the controller has no
/// factory curve: `mv = value * ref_mv * gain_den / gain_num >> resolution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearCalibration {
    pub reference_mv: i32,
    pub resolution_bits: u8,
    pub gain_num: i32,
    pub gain_den: i32,
}

impl LinearCalibration {
    /// 12-bit converter, 3.3 V full scale, unity gain.
    pub const fn default_12bit() -> Self {
        Self {
            reference_mv: 3300,
            resolution_bits: 12,
            gain_num: 1,
            gain_den: 1,
        }
    }

    pub fn raw_to_millivolts(&self, value: i32) -> Result<Millivolts, ConversionError> {
        if self.reference_mv <= 0 || self.gain_num <= 0 || self.gain_den <= 0 {
            return Err(ConversionError::CalibrationUnavailable);
        }
        let effective_ref = i64::from(self.reference_mv) * i64::from(self.gain_den)
            / i64::from(self.gain_num);
        let mv = (i64::from(value) * effective_ref) >> self.resolution_bits;
        i32::try_from(mv).map_err(|_| ConversionError::Overflow)
    }
}
